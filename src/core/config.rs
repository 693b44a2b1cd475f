/*
* 开发心理过程：
* 1. 把数值范围和跨状态规则做成可配置项，而不是写死在状态代码里
* 2. 支持从TOML字符串或文件加载，所有字段都有默认值
* 3. 加载后做一次自检，避免 min > max 之类的配置错误
*/

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use log::debug;

use crate::core::error::{Result, StateError};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_MAX_ACTIVE_ABILITIES: usize = 10;
pub const MAX_THEME_RESONANCE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub history_capacity: usize,
    pub max_active_abilities: Option<usize>,
    pub require_registered_mutation_targets: bool,
    pub limits: NumericLimits,
    pub rules: CrossStateRules,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_active_abilities: Some(DEFAULT_MAX_ACTIVE_ABILITIES),
            require_registered_mutation_targets: false,
            limits: NumericLimits::default(),
            rules: CrossStateRules::default(),
        }
    }
}

// 数值范围
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
}

impl Bounds {
    pub const fn unbounded() -> Self {
        Self { min: None, max: None }
    }

    pub const fn at_least(min: f32) -> Self {
        Self { min: Some(min), max: None }
    }

    pub const fn between(min: f32, max: f32) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    // NaN和无穷值永远不在范围内
    pub fn contains(&self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("[{}, {}]", min, max),
            (Some(min), None) => format!("[{}, +inf)", min),
            (None, Some(max)) => format!("(-inf, {}]", max),
            (None, None) => "(-inf, +inf)".to_string(),
        }
    }

    fn is_consistent(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min.is_finite() && max.is_finite() && min <= max,
            (Some(bound), None) | (None, Some(bound)) => bound.is_finite(),
            (None, None) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericLimits {
    pub ability_power: Bounds,
    pub trait_strength: Bounds,
    pub theme_resonance: Bounds,
    pub theme_influence: Bounds,
}

impl Default for NumericLimits {
    fn default() -> Self {
        Self {
            ability_power: Bounds::at_least(0.0),
            trait_strength: Bounds::at_least(0.0),
            theme_resonance: Bounds::between(0.0, MAX_THEME_RESONANCE),
            theme_influence: Bounds::unbounded(),
        }
    }
}

// 跨状态规则的执行级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    Off,
    Advisory,
    Enforced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossStateRules {
    pub ability_requirements: RuleMode,
    pub hive_intelligence: RuleMode,
    pub mutation_targets_known: RuleMode,
}

impl Default for CrossStateRules {
    fn default() -> Self {
        Self {
            ability_requirements: RuleMode::Advisory,
            hive_intelligence: RuleMode::Advisory,
            mutation_targets_known: RuleMode::Off,
        }
    }
}

impl StateConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StateConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("加载状态配置: {}", path.display());
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StateError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(StateError::Config("history_capacity must be greater than zero".to_string()));
        }

        let named = [
            ("ability_power", &self.limits.ability_power),
            ("trait_strength", &self.limits.trait_strength),
            ("theme_resonance", &self.limits.theme_resonance),
            ("theme_influence", &self.limits.theme_influence),
        ];
        for (name, bounds) in named {
            if !bounds.is_consistent() {
                return Err(StateError::Config(format!("invalid bounds for {}: {}", name, bounds.describe())));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StateConfig::default();
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.max_active_abilities, Some(10));
        assert!(!config.require_registered_mutation_targets);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::between(0.0, 1.0);
        assert!(bounds.contains(0.0));
        assert!(bounds.contains(1.0));
        assert!(!bounds.contains(1.01));
        assert!(!bounds.contains(-0.5));
        assert!(!bounds.contains(f32::NAN));
        assert!(Bounds::unbounded().contains(-1.0e9));
        assert!(!Bounds::unbounded().contains(f32::INFINITY));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StateConfig::from_toml_str(
            r#"
            history_capacity = 5

            [rules]
            ability_requirements = "enforced"

            [limits.ability_power]
            min = 1.0
            max = 50.0
            "#,
        )
        .unwrap();

        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.rules.ability_requirements, RuleMode::Enforced);
        assert_eq!(config.rules.hive_intelligence, RuleMode::Advisory);
        assert_eq!(config.limits.ability_power, Bounds::between(1.0, 50.0));
        assert_eq!(config.limits.theme_resonance, Bounds::between(0.0, 1.0));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let result = StateConfig::from_toml_str(
            r#"
            [limits.trait_strength]
            min = 5.0
            max = 1.0
            "#,
        );
        assert!(matches!(result, Err(StateError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = StateConfig::from_toml_str("history_capacity = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let config = StateConfig {
            history_capacity: 12,
            ..StateConfig::default()
        };
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = StateConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
