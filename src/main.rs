// 生物状态检查工具入口
// 开发心理：围绕JSON文档做最常用的几件事：新建、查看、校验、应用变更、撤销
// 历史不持久化，撤销靠apply时导出的逆变更文件

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use creature_core::{CreatureState, FormChange, StateConfig};
use log::{error, info};
use std::{fs, path::Path, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "creature_core")]
#[command(about = "Inspect, validate and mutate creature state documents")]
struct Args {
    /// TOML file with limits and cross-state rules
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty creature document
    New {
        id: String,
        output: PathBuf,
    },

    /// Print a summary of a creature document
    Inspect {
        creature: PathBuf,
    },

    /// Run full validation and print errors and warnings
    Validate {
        creature: PathBuf,
    },

    /// Apply a change document to a creature
    Apply {
        creature: PathBuf,
        change: PathBuf,

        /// Write the result here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the inverse change so it can be undone later
        #[arg(long)]
        undo_file: Option<PathBuf>,
    },

    /// Apply an inverse change previously saved with --undo-file
    Undo {
        creature: PathBuf,
        undo_file: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // 初始化日志系统
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("生物状态工具 v{}", creature_core::VERSION);

    if let Err(e) = run(Args::parse()) {
        error!("执行失败: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::New { id, output } => {
            let state = CreatureState::with_config(id, config)?;
            state.save_to_file(&output)?;
        }
        Command::Inspect { creature } => {
            let state = load_creature(&creature, config)?;
            print!("{}", summarize(&state));
        }
        Command::Validate { creature } => {
            let state = load_creature(&creature, config)?;
            let report = state.validation_report();
            for issue in &report.errors {
                println!("error   [{}] {}", issue.subsystem, issue.message);
            }
            for issue in &report.warnings {
                println!("warning [{}] {}", issue.subsystem, issue.message);
            }
            println!("{:?}", report.overall_result);
            if !report.is_valid() {
                bail!("{} validation error(s)", report.errors.len());
            }
        }
        Command::Apply {
            creature,
            change,
            output,
            undo_file,
        } => {
            let mut state = load_creature(&creature, config)?;
            let change = load_change(&change)?;
            let result = state.apply_change(change);
            if !result.is_success() {
                bail!("change rejected: {}", result.reasons.join("; "));
            }
            println!("events: {:?}", result.events);
            if let (Some(path), Some(undo)) = (undo_file, result.undo) {
                fs::write(&path, serde_json::to_string_pretty(&undo)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("逆变更已保存到 {}", path.display());
            }
            state.save_to_file(output.as_ref().unwrap_or(&creature))?;
        }
        Command::Undo {
            creature,
            undo_file,
            output,
        } => {
            let mut state = load_creature(&creature, config)?;
            let undo = load_change(&undo_file)?;
            let result = state.apply_change(undo);
            if !result.is_success() {
                bail!("undo rejected: {}", result.reasons.join("; "));
            }
            state.save_to_file(output.as_ref().unwrap_or(&creature))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StateConfig> {
    match path {
        Some(path) => StateConfig::load(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(StateConfig::default()),
    }
}

fn load_creature(path: &Path, config: StateConfig) -> Result<CreatureState> {
    CreatureState::load_from_file(path, config).with_context(|| format!("failed to load creature {}", path.display()))
}

fn load_change(path: &Path) -> Result<FormChange> {
    let source = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("invalid change document {}", path.display()))
}

fn summarize(state: &CreatureState) -> String {
    let physical = state.physical();
    let behavior = state.behavior();
    let mut lines = vec![
        format!("id:           {}", state.id()),
        format!("form:         {} {}", physical.size(), physical.shape()),
        format!(
            "locomotion:   {} (+{})",
            physical.primary_locomotion(),
            physical.secondary_locomotion().len()
        ),
        format!(
            "behavior:     {} / {} / {}",
            behavior.intelligence(),
            behavior.aggression(),
            behavior.social_structure()
        ),
        format!(
            "abilities:    {} ({} active)",
            state.abilities().len(),
            state.abilities().active_count()
        ),
    ];
    for ability in state.abilities().abilities() {
        let unmet = state.unmet_requirements(&ability.name);
        let marker = if unmet.is_empty() { "" } else { " [unmet]" };
        lines.push(format!("  - {} {} {:.1}{}", ability.name, ability.ability_type, ability.base_power, marker));
    }
    lines.push(format!("traits:       {}", state.traits().len()));
    for name in state.traits().trait_names() {
        let strength = state.traits().base_strength(name).unwrap_or_default();
        lines.push(format!("  - {} {:.2}", name, strength));
    }
    lines.push(format!("valid:        {}", state.is_valid()));
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply_args() {
        let args = Args::parse_from([
            "creature_core",
            "--config",
            "rules.toml",
            "apply",
            "wyrm.json",
            "grow.json",
            "--undo-file",
            "grow.undo.json",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("rules.toml")));
        match args.command {
            Command::Apply { creature, undo_file, output, .. } => {
                assert_eq!(creature, PathBuf::from("wyrm.json"));
                assert_eq!(undo_file, Some(PathBuf::from("grow.undo.json")));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_apply_and_undo_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let creature = dir.path().join("c.json");
        let change = dir.path().join("change.json");
        let undo = dir.path().join("undo.json");

        run(Args::parse_from(["creature_core", "new", "c-7", creature.to_str().unwrap()])).unwrap();
        fs::write(
            &change,
            r#"{"changes":[{"target":"physical","change":{"op":"add_feature","feature":"Tail"}}]}"#,
        )
        .unwrap();

        run(Args::parse_from([
            "creature_core",
            "apply",
            creature.to_str().unwrap(),
            change.to_str().unwrap(),
            "--undo-file",
            undo.to_str().unwrap(),
        ]))
        .unwrap();
        let state = load_creature(&creature, StateConfig::default()).unwrap();
        assert!(state.physical().has_base_feature("Tail"));
        assert!(summarize(&state).contains("c-7"));

        run(Args::parse_from([
            "creature_core",
            "undo",
            creature.to_str().unwrap(),
            undo.to_str().unwrap(),
        ]))
        .unwrap();
        let state = load_creature(&creature, StateConfig::default()).unwrap();
        assert!(!state.physical().has_base_feature("Tail"));
    }

    #[test]
    fn test_rejected_change_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let creature = dir.path().join("c.json");
        let change = dir.path().join("change.json");
        CreatureState::new("c-8").save_to_file(&creature).unwrap();
        fs::write(
            &change,
            r#"{"changes":[{"target":"behavior","change":{"op":"remove_behavior","behavior":"Ghost"}}]}"#,
        )
        .unwrap();

        let outcome = run(Args::parse_from([
            "creature_core",
            "apply",
            creature.to_str().unwrap(),
            change.to_str().unwrap(),
        ]));
        assert!(outcome.is_err());
    }
}
