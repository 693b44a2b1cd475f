// 核心模块 - 状态引擎基础设施
// 开发心理：错误类型和配置是所有子状态共享的底层支持

pub mod error;
pub mod config;

// 重新导出核心类型
pub use error::{StateError, Result};
pub use config::{StateConfig, NumericLimits, Bounds, CrossStateRules, RuleMode};
