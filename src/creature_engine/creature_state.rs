/*
 * Creature Core - Creature State
 * 开发心理过程:
 * 1. 聚合根独占四个子状态，外部只能通过变更协议修改它们
 * 2. 组合变更按顺序逐个检查并应用，任何一步失败都整体回滚到快照
 * 3. 应用完成后做完整校验，包括跨子状态规则，不合法同样回滚
 * 4. 成功后记录历史和逆变更，并刷新唯一的快照
 * 5. 序列化只保存身份和四个子状态，历史和快照只存在于运行时
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};

use super::ability_state::AbilityState;
use super::behavior_state::BehaviorState;
use super::changes::{ChangeResult, FormChange, StateChange, StateComponent};
use super::enums::{CreatureEvent, ValidationSeverity};
use super::history::ChangeHistory;
use super::physical_state::PhysicalState;
use super::trait_state::TraitState;
use super::validator::{requirement_context, CrossStateValidator, ValidationIssue, ValidationReport};
use crate::core::config::StateConfig;
use crate::core::error::{Result, StateError};

// 四个子状态的深拷贝
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub physical: PhysicalState,
    pub abilities: AbilityState,
    pub traits: TraitState,
    pub behavior: BehaviorState,
}

#[derive(Serialize)]
struct CreatureDocumentRef<'a> {
    id: &'a str,
    physical: &'a PhysicalState,
    abilities: &'a AbilityState,
    traits: &'a TraitState,
    behavior: &'a BehaviorState,
}

#[derive(Deserialize)]
struct CreatureDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    physical: PhysicalState,
    #[serde(default)]
    abilities: AbilityState,
    #[serde(default)]
    traits: TraitState,
    #[serde(default)]
    behavior: BehaviorState,
}

type Applied = (Vec<StateChange>, Vec<CreatureEvent>);

#[derive(Debug, Clone)]
pub struct CreatureState {
    id: String,

    physical: PhysicalState,
    abilities: AbilityState,
    traits: TraitState,
    behavior: BehaviorState,

    history: ChangeHistory,
    snapshot: Option<StateSnapshot>,

    config: StateConfig,
    validator: CrossStateValidator,
}

impl Default for CreatureState {
    fn default() -> Self {
        Self::new("")
    }
}

// 状态相等只比较身份和子状态，不比较历史和快照
impl PartialEq for CreatureState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.physical == other.physical
            && self.abilities == other.abilities
            && self.traits == other.traits
            && self.behavior == other.behavior
    }
}

impl CreatureState {
    pub fn new(id: impl Into<String>) -> Self {
        Self::build(id.into(), StateConfig::default())
    }

    // 配置不合法时返回Config错误，和从文档加载的路径一致
    pub fn with_config(id: impl Into<String>, config: StateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(id.into(), config))
    }

    // 调用方保证配置已经校验过
    fn build(id: String, config: StateConfig) -> Self {
        let limits = &config.limits;
        let mut state = Self {
            id,
            physical: PhysicalState::new(),
            abilities: AbilityState::with_limits(limits, config.max_active_abilities),
            traits: TraitState::with_limits(limits, config.require_registered_mutation_targets),
            behavior: BehaviorState::with_limits(limits),
            history: ChangeHistory::with_capacity(config.history_capacity),
            snapshot: None,
            validator: CrossStateValidator::new(config.rules),
            config,
        };
        state.save_snapshot();
        debug!("创建生物状态: '{}'", state.id);
        state
    }

    // 访问器
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn physical(&self) -> &PhysicalState {
        &self.physical
    }

    pub fn abilities(&self) -> &AbilityState {
        &self.abilities
    }

    pub fn traits(&self) -> &TraitState {
        &self.traits
    }

    pub fn behavior(&self) -> &BehaviorState {
        &self.behavior
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn change_history(&self) -> &ChangeHistory {
        &self.history
    }

    pub fn clear_change_history(&mut self) {
        self.history.clear();
    }

    // 变更应用
    pub fn check_change(&self, change: &FormChange) -> Vec<String> {
        let mut reasons = change.validate();
        if !reasons.is_empty() {
            return reasons;
        }

        let mut scratch = self.scratch_copy();
        match scratch.apply_sequence(&change.changes) {
            Ok(_) => reasons.extend(scratch.validate()),
            Err(failures) => reasons.extend(failures),
        }
        reasons
    }

    // 在副本上试运行，不修改自身
    pub fn can_apply_change(&self, change: &FormChange) -> bool {
        self.check_change(change).is_empty()
    }

    pub fn apply_change(&mut self, change: FormChange) -> ChangeResult {
        let problems = change.validate();
        if !problems.is_empty() {
            warn!("生物 '{}' 拒绝格式错误的变更: {}", self.id, problems.join("; "));
            return ChangeResult::failed(problems);
        }

        self.ensure_snapshot();

        let (inverses, events) = match self.apply_sequence(&change.changes) {
            Ok(applied) => applied,
            Err(reasons) => {
                self.revert_to_last_valid_state();
                warn!("生物 '{}' 拒绝变更 '{}': {}", self.id, change.metadata.description, reasons.join("; "));
                return ChangeResult::failed(reasons);
            }
        };

        let violations = self.validate();
        if !violations.is_empty() {
            self.revert_to_last_valid_state();
            warn!(
                "生物 '{}' 的变更 '{}' 破坏了状态一致性，已回滚: {}",
                self.id,
                change.metadata.description,
                violations.join("; ")
            );
            let mut result = ChangeResult::failed(violations);
            result.events.push(CreatureEvent::ValidationFailed);
            return result;
        }

        let undo = FormChange::undo_of(&change.metadata, inverses);
        let count = change.len();
        if let Some(evicted) = self.history.push(change, undo.clone()) {
            debug!("历史已满，丢弃最旧的变更: '{}'", evicted.change.metadata.description);
        }
        self.save_snapshot();

        info!("生物 '{}' 应用了 {} 个子变更", self.id, count);
        ChangeResult::succeeded(undo, events)
    }

    pub fn undo_last_change(&mut self) -> ChangeResult {
        let Some(entry) = self.history.pop() else {
            return ChangeResult::failure("no change to undo");
        };

        self.ensure_snapshot();

        let outcome = self
            .apply_sequence(&entry.inverse.changes)
            .and_then(|applied| {
                let violations = self.validate();
                if violations.is_empty() {
                    Ok(applied)
                } else {
                    Err(violations)
                }
            });

        match outcome {
            Ok((_, mut events)) => {
                self.save_snapshot();
                events.push(CreatureEvent::ChangeReverted);
                info!("生物 '{}' 撤销了变更 '{}'", self.id, entry.change.metadata.description);
                ChangeResult::succeeded(entry.change, events)
            }
            Err(reasons) => {
                self.revert_to_last_valid_state();
                warn!("生物 '{}' 撤销失败: {}", self.id, reasons.join("; "));
                self.history.restore(entry);
                ChangeResult::failed(reasons)
            }
        }
    }

    // 校验
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        collect_errors(&self.physical, &mut errors);
        collect_errors(&self.abilities, &mut errors);
        collect_errors(&self.traits, &mut errors);
        collect_errors(&self.behavior, &mut errors);
        errors.extend(
            self.validator
                .enforced_violations(&self.abilities, &self.traits, &self.behavior),
        );
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    // 包含提示性警告的完整报告
    pub fn validation_report(&self) -> ValidationReport {
        let mut issues = Vec::new();
        collect_issues(&self.physical, &mut issues);
        collect_issues(&self.abilities, &mut issues);
        collect_issues(&self.traits, &mut issues);
        collect_issues(&self.behavior, &mut issues);
        issues.extend(self.validator.check(&self.abilities, &self.traits, &self.behavior));
        ValidationReport::from_issues(self.id.clone(), issues)
    }

    // 能力需求的跨状态检查
    pub fn requirement_context(&self) -> indexmap::IndexSet<String> {
        requirement_context(&self.traits, &self.behavior)
    }

    pub fn meets_requirements(&self, ability: &str) -> bool {
        self.abilities
            .meets_base_requirements(ability, &self.requirement_context())
    }

    pub fn unmet_requirements(&self, ability: &str) -> Vec<String> {
        self.abilities
            .unmet_requirements(ability, &self.requirement_context())
    }

    // 快照管理
    pub fn save_snapshot(&mut self) {
        self.snapshot = Some(StateSnapshot {
            physical: self.physical.clone(),
            abilities: self.abilities.clone(),
            traits: self.traits.clone(),
            behavior: self.behavior.clone(),
        });
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn restore_snapshot(&mut self) -> bool {
        let Some(snapshot) = self.snapshot.clone() else {
            return false;
        };
        self.physical = snapshot.physical;
        self.abilities = snapshot.abilities;
        self.traits = snapshot.traits;
        self.behavior = snapshot.behavior;
        true
    }

    pub fn revert_to_last_valid_state(&mut self) -> bool {
        let restored = self.restore_snapshot();
        if restored {
            debug!("生物 '{}' 已恢复到最近的合法快照", self.id);
        } else {
            warn!("生物 '{}' 没有可用的快照", self.id);
        }
        restored
    }

    // 序列化
    pub fn serialize_to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.document())?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    pub fn deserialize_from_json(value: &Value) -> Result<Self> {
        Self::deserialize_from_json_with_config(value, StateConfig::default())
    }

    pub fn deserialize_from_json_with_config(value: &Value, config: StateConfig) -> Result<Self> {
        config.validate()?;
        let document = CreatureDocument::deserialize(value)?;
        Self::from_document(document, config)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Self::parse_with_config(source, StateConfig::default())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string()?)?;
        info!("生物 '{}' 已保存到 {}", self.id, path.display());
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P, config: StateConfig) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let state = Self::parse_with_config(&source, config)?;
        info!("从 {} 加载生物 '{}'", path.display(), state.id);
        Ok(state)
    }

    // 内部辅助
    fn document(&self) -> CreatureDocumentRef<'_> {
        CreatureDocumentRef {
            id: &self.id,
            physical: &self.physical,
            abilities: &self.abilities,
            traits: &self.traits,
            behavior: &self.behavior,
        }
    }

    // 直接从文本解析，映射的键顺序不经过Value重排
    fn parse_with_config(source: &str, config: StateConfig) -> Result<Self> {
        config.validate()?;
        let document: CreatureDocument = serde_json::from_str(source)?;
        Self::from_document(document, config)
    }

    fn from_document(document: CreatureDocument, config: StateConfig) -> Result<Self> {
        let CreatureDocument {
            id,
            physical,
            mut abilities,
            mut traits,
            mut behavior,
        } = document;

        abilities.configure(&config.limits, config.max_active_abilities);
        traits.configure(&config.limits, config.require_registered_mutation_targets);
        behavior.configure(&config.limits);

        let mut state = Self::build(id, config);
        state.physical = physical;
        state.abilities = abilities;
        state.traits = traits;
        state.behavior = behavior;

        let violations = state.validate();
        if !violations.is_empty() {
            return Err(StateError::Validation { violations });
        }

        state.save_snapshot();
        Ok(state)
    }

    fn ensure_snapshot(&mut self) {
        if self.snapshot.is_none() {
            self.save_snapshot();
        }
    }

    // 试运行用的副本，不携带历史
    fn scratch_copy(&self) -> Self {
        Self {
            id: self.id.clone(),
            physical: self.physical.clone(),
            abilities: self.abilities.clone(),
            traits: self.traits.clone(),
            behavior: self.behavior.clone(),
            history: ChangeHistory::with_capacity(1),
            snapshot: None,
            config: self.config.clone(),
            validator: self.validator,
        }
    }

    // 依次应用子变更，返回按应用顺序收集的逆变更和事件
    fn apply_sequence(&mut self, changes: &[StateChange]) -> std::result::Result<Applied, Vec<String>> {
        let mut inverses = Vec::with_capacity(changes.len());
        let mut events = Vec::new();

        for change in changes {
            let inverse = match change {
                StateChange::Physical(c) => apply_to(&mut self.physical, c).map(StateChange::Physical),
                StateChange::Ability(c) => apply_to(&mut self.abilities, c).map(StateChange::Ability),
                StateChange::Trait(c) => apply_to(&mut self.traits, c).map(StateChange::Trait),
                StateChange::Behavior(c) => apply_to(&mut self.behavior, c).map(StateChange::Behavior),
            }?;
            inverses.push(inverse);
            if let Some(event) = change.event() {
                events.push(event);
            }
        }

        Ok((inverses, events))
    }
}

// 单个子变更：检查、先生成逆变更、再应用
fn apply_to<S: StateComponent>(state: &mut S, change: &S::Change) -> std::result::Result<S::Change, Vec<String>> {
    let reasons = state.check_change(change);
    if !reasons.is_empty() {
        return Err(reasons
            .into_iter()
            .map(|reason| format!("{}: {}", S::NAME, reason))
            .collect());
    }

    let inverse = state
        .generate_undo(change)
        .ok_or_else(|| vec![format!("{}: unable to compute inverse change", S::NAME)])?;

    if !state.apply_change(change) {
        return Err(vec![format!("{}: change was rejected", S::NAME)]);
    }
    Ok(inverse)
}

fn collect_errors<S: StateComponent>(state: &S, errors: &mut Vec<String>) {
    errors.extend(
        state
            .validate()
            .into_iter()
            .map(|error| format!("{}: {}", S::NAME, error)),
    );
}

fn collect_issues<S: StateComponent>(state: &S, issues: &mut Vec<ValidationIssue>) {
    issues.extend(
        state
            .validate()
            .into_iter()
            .map(|error| ValidationIssue::new(ValidationSeverity::Error, S::NAME, error)),
    );
}
