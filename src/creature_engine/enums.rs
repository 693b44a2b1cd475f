// 生物分类词汇表
// 开发心理：封闭的枚举集合，只承载数据，不承载行为

use serde::{Deserialize, Serialize};
use std::fmt;

// 体型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Size {
    Tiny,       // 昆虫大小
    Small,      // 猫大小
    #[default]
    Medium,     // 人类大小
    Large,      // 马大小
    Huge,       // 大象大小
    Colossal,   // 建筑大小
}

// 身体形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyShape {
    Avian,
    Draconic,
    Serpentine,
    Arachnid,
    Chitinous,
    Amorphous,
    #[default]
    Humanoid,
    Bestial,
    Aberrant,
}

// 移动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locomotion {
    #[default]
    Walker,     // 地面
    Flyer,      // 空中
    Swimmer,    // 水中
    Burrower,   // 地下
    Phaser,     // 相位
    Teleporter, // 传送
    Crawler,    // 攀附
    Floater,    // 悬浮
    Slitherer,  // 蛇行
}

// 能力类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AbilityType {
    #[default]
    Passive,    // 常驻
    Active,     // 需要主动触发
    Reactive,   // 响应式触发
    Sustained,  // 需要维持
    Permanent,  // 不可失去
}

// 特性类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TraitCategory {
    #[default]
    Physical,
    Magical,
    Behavioral,
    Adaptive,
    Synthetic,
}

// 特性来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TraitOrigin {
    #[default]
    Innate,
    Evolved,
    Synthesized,
}

// 智力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Intelligence {
    Mindless,
    #[default]
    Animal,
    Cunning,
    Sapient,
}

// 攻击性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Aggression {
    Passive,
    #[default]
    Defensive,
    Territorial,
    Aggressive,
}

// 社会结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SocialStructure {
    #[default]
    Solitary,
    Pair,
    Pack,
    Hive,
    Swarm,
}

// 生物事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatureEvent {
    TraitGained,
    TraitLost,
    AbilityUnlocked,
    AbilityLost,
    FormChanged,
    BehaviorShifted,
    ChangeReverted,
    ValidationFailed,
}

// 验证严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

// 变更来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChangeSource {
    Environment,
    Evolution,
    Synthesis,
    Stress,
    #[default]
    Manual,
    System,
}

// 变更优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ChangePriority {
    Low = 0,
    #[default]
    Normal = 50,
    High = 75,
    Critical = 100,
}

macro_rules! display_as_debug {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(self, f)
                }
            }
        )*
    };
}

display_as_debug!(
    Size,
    BodyShape,
    Locomotion,
    AbilityType,
    TraitCategory,
    TraitOrigin,
    Intelligence,
    Aggression,
    SocialStructure,
    CreatureEvent,
    ValidationSeverity,
    ChangeSource,
    ChangePriority,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fresh_creature() {
        assert_eq!(Size::default(), Size::Medium);
        assert_eq!(BodyShape::default(), BodyShape::Humanoid);
        assert_eq!(Locomotion::default(), Locomotion::Walker);
        assert_eq!(Intelligence::default(), Intelligence::Animal);
        assert_eq!(Aggression::default(), Aggression::Defensive);
        assert_eq!(SocialStructure::default(), SocialStructure::Solitary);
    }

    #[test]
    fn test_serialized_as_variant_names() {
        assert_eq!(serde_json::to_string(&Locomotion::Burrower).unwrap(), "\"Burrower\"");
        let parsed: SocialStructure = serde_json::from_str("\"Hive\"").unwrap();
        assert_eq!(parsed, SocialStructure::Hive);
        assert_eq!(Size::Colossal.to_string(), "Colossal");
    }

    #[test]
    fn test_event_vocabulary() {
        assert_eq!(serde_json::to_string(&CreatureEvent::ChangeReverted).unwrap(), "\"ChangeReverted\"");
        // 构造生物不产生事件
        assert!(serde_json::from_str::<CreatureEvent>("\"Created\"").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ChangePriority::Critical > ChangePriority::Normal);
        assert!(ValidationSeverity::Error > ValidationSeverity::Warning);
        assert!(Intelligence::Mindless < Intelligence::Sapient);
    }
}
