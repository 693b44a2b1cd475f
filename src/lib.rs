// 程序化生物模拟的状态核心库入口
// 开发心理：一个生物由四个子状态组成，所有修改都经过可撤销、可校验的变更协议
// 架构：core放错误和配置，creature_engine放子状态、变更协议和聚合根

pub mod core;
pub mod creature_engine;

// 重新导出核心类型
pub use crate::core::{Bounds, CrossStateRules, NumericLimits, Result, RuleMode, StateConfig, StateError};
pub use crate::creature_engine::{
    ChangeResult, CreatureEvent, CreatureState, FormChange, StateChange, StateComponent, ValidationReport,
};

// 版本信息
pub const VERSION: &str = "0.1.0";
pub const NAME: &str = "creature_core";

// 初始化日志系统，未设置RUST_LOG时默认输出本库的info日志
pub fn init() -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("creature_core=info");
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::info!("生物状态核心初始化完成 v{}", VERSION);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init().unwrap();
        init().unwrap();
    }

    #[test]
    fn test_version_info() {
        assert_eq!(VERSION, "0.1.0");
        assert_eq!(NAME, "creature_core");
    }

    #[test]
    fn test_reexports_cover_common_flow() {
        let mut state = CreatureState::new("root");
        let change = FormChange::single(creature_engine::BehaviorChange::AddBehavior {
            behavior: "Basking".to_string(),
        });
        let result: ChangeResult = state.apply_change(change);
        assert!(result.is_success());
        assert_eq!(state.config(), &StateConfig::default());
    }
}
