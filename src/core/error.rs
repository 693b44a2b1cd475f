// 错误处理系统
// 开发心理：普通的"不存在/已存在"通过bool和ChangeResult返回，这里只收纳边界上的真正故障
// 序列化、文件读写、配置解析、文档校验失败统一成StateError

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid creature document: {0}")]
    InvalidDocument(String),

    #[error("validation failed: {}", .violations.join("; "))]
    Validation { violations: Vec<String> },
}

pub type Result<T> = std::result::Result<T, StateError>;

impl From<toml::de::Error> for StateError {
    fn from(error: toml::de::Error) -> Self {
        StateError::Config(error.to_string())
    }
}

impl StateError {
    // 校验失败时附带的违规列表
    pub fn violations(&self) -> &[String] {
        match self {
            StateError::Validation { violations } => violations,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_violations() {
        let error = StateError::Validation {
            violations: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(error.violations().len(), 2);
        assert_eq!(error.to_string(), "validation failed: a; b");
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("= broken");
        let error: StateError = parsed.unwrap_err().into();
        assert!(matches!(error, StateError::Config(_)));
        assert!(error.violations().is_empty());
    }
}
