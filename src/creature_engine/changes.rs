/*
 * Creature Core - Change Protocol
 * 开发心理过程:
 * 1. 每个子状态都有自己的变更枚举，统一实现 check / apply / undo 三段协议
 * 2. FormChange 是组合信封，按顺序携带多个子状态变更，要么全部生效要么全部回滚
 * 3. 逆变更在应用前根据旧状态生成，恢复的是原值而不是反向增量
 * 4. ChangeResult 携带失败原因、逆变更和触发的生物事件
 */

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::hash::Hash;

use super::ability_state::Ability;
use super::enums::{
    Aggression, BodyShape, ChangePriority, ChangeSource, CreatureEvent, Intelligence, Locomotion, Size,
    SocialStructure,
};
use super::trait_state::TraitDefinition;

// 子状态的变更协议
pub trait StateComponent {
    type Change;

    // 子状态名称，用于日志和校验信息
    const NAME: &'static str;

    // 返回变更不合法的原因，空列表表示可以应用
    fn check_change(&self, change: &Self::Change) -> Vec<String>;

    fn can_apply_change(&self, change: &Self::Change) -> bool {
        self.check_change(change).is_empty()
    }

    // 应用变更；不合法时不做任何修改并返回false
    fn apply_change(&mut self, change: &Self::Change) -> bool;

    // 必须在apply之前调用，读取的是变更前的状态
    fn generate_undo(&self, change: &Self::Change) -> Option<Self::Change>;

    fn validate(&self) -> Vec<String>;

    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

// 物理形态变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PhysicalChange {
    SetSize { size: Size },
    SetShape { shape: BodyShape },
    SetPrimaryLocomotion { mode: Locomotion },
    AddSecondaryLocomotion { mode: Locomotion },
    RemoveSecondaryLocomotion { mode: Locomotion },
    RestoreSecondaryLocomotion { mode: Locomotion, index: usize },
    // 与指定的次要移动方式互换
    PromoteSecondaryLocomotion { mode: Locomotion },
    // 第一个次要移动方式成为主要方式，原主要方式被移除
    DropPrimaryLocomotion,
    // 当前主要方式退回次要列表首位，指定方式成为主要方式
    RestorePrimaryLocomotion { mode: Locomotion },
    AddFeature { feature: String },
    RemoveFeature { feature: String },
    RestoreFeature { feature: String, index: usize },
}

// 能力变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AbilityChange {
    AddAbility { ability: Ability },
    RestoreAbility { ability: Ability, index: usize },
    RemoveAbility { name: String },
    ModifyPower { name: String, delta: f32 },
    SetPower { name: String, power: f32 },
    SetActive { name: String, active: bool },
    AddRequirement { name: String, requirement: String },
    RemoveRequirement { name: String, requirement: String },
    RestoreRequirement { name: String, requirement: String, index: usize },
}

// 特性变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraitChange {
    AddTrait { definition: TraitDefinition },
    // 恢复被移除的特性，包括它在序列中的位置和指向它的变异路径
    RestoreTrait {
        definition: TraitDefinition,
        index: usize,
        #[serde(default)]
        mutation_sources: Vec<RelationLink>,
        #[serde(default)]
        incompatible_partners: Vec<RelationLink>,
    },
    RemoveTrait { name: String },
    AddManifestation { name: String, manifestation: String },
    RemoveManifestation { name: String, manifestation: String },
    RestoreManifestation { name: String, manifestation: String, index: usize },
    SetIncompatible { first: String, second: String },
    RemoveIncompatibility { first: String, second: String },
    // 两侧的位置分别记录，撤销后冲突集合的顺序不变
    RestoreIncompatibility { first: String, second: String, first_index: usize, second_index: usize },
    SetBaseStrength { name: String, strength: f32 },
    ModifyBaseStrength { name: String, delta: f32 },
    SetThemeResonance { name: String, theme: String, resonance: f32 },
    ClearThemeResonance { name: String, theme: String },
    RestoreThemeResonance { name: String, theme: String, resonance: f32, index: usize },
    AddMutationPath { name: String, target: String },
    RemoveMutationPath { name: String, target: String },
    RestoreMutationPath { name: String, target: String, index: usize },
}

// 另一个特性的关系集合中指向某特性的条目及其位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationLink {
    pub name: String,
    pub index: usize,
}

// 行为变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BehaviorChange {
    SetIntelligence { intelligence: Intelligence },
    SetAggression { aggression: Aggression },
    SetSocialStructure { social_structure: SocialStructure },
    AddBehavior { behavior: String },
    RemoveBehavior { behavior: String },
    RestoreBehavior { behavior: String, index: usize },
    SetThemeInfluence { theme: String, influence: f32 },
    ClearThemeInfluence { theme: String },
    RestoreThemeInfluence { theme: String, influence: f32, index: usize },
}

// 子状态变更的标签联合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", content = "change", rename_all = "snake_case")]
pub enum StateChange {
    Physical(PhysicalChange),
    Ability(AbilityChange),
    Trait(TraitChange),
    Behavior(BehaviorChange),
}

impl StateChange {
    pub fn target_name(&self) -> &'static str {
        match self {
            StateChange::Physical(_) => "physical",
            StateChange::Ability(_) => "ability",
            StateChange::Trait(_) => "trait",
            StateChange::Behavior(_) => "behavior",
        }
    }

    // 成功应用后触发的生物事件
    pub fn event(&self) -> Option<CreatureEvent> {
        match self {
            StateChange::Physical(_) => Some(CreatureEvent::FormChanged),
            StateChange::Ability(AbilityChange::AddAbility { .. })
            | StateChange::Ability(AbilityChange::RestoreAbility { .. })
            | StateChange::Ability(AbilityChange::SetActive { active: true, .. }) => {
                Some(CreatureEvent::AbilityUnlocked)
            }
            StateChange::Ability(AbilityChange::RemoveAbility { .. }) => Some(CreatureEvent::AbilityLost),
            StateChange::Ability(_) => None,
            StateChange::Trait(TraitChange::AddTrait { .. })
            | StateChange::Trait(TraitChange::RestoreTrait { .. }) => Some(CreatureEvent::TraitGained),
            StateChange::Trait(TraitChange::RemoveTrait { .. }) => Some(CreatureEvent::TraitLost),
            StateChange::Trait(_) => None,
            StateChange::Behavior(BehaviorChange::SetIntelligence { .. })
            | StateChange::Behavior(BehaviorChange::SetAggression { .. })
            | StateChange::Behavior(BehaviorChange::SetSocialStructure { .. }) => {
                Some(CreatureEvent::BehaviorShifted)
            }
            StateChange::Behavior(_) => None,
        }
    }
}

impl From<PhysicalChange> for StateChange {
    fn from(change: PhysicalChange) -> Self {
        StateChange::Physical(change)
    }
}

impl From<AbilityChange> for StateChange {
    fn from(change: AbilityChange) -> Self {
        StateChange::Ability(change)
    }
}

impl From<TraitChange> for StateChange {
    fn from(change: TraitChange) -> Self {
        StateChange::Trait(change)
    }
}

impl From<BehaviorChange> for StateChange {
    fn from(change: BehaviorChange) -> Self {
        StateChange::Behavior(change)
    }
}

// 变更元数据
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeMetadata {
    pub source: ChangeSource,
    pub priority: ChangePriority,
    pub description: String,
    pub tags: Vec<String>,
}

// 组合变更信封
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormChange {
    #[serde(default)]
    pub metadata: ChangeMetadata,
    pub changes: Vec<StateChange>,
}

impl FormChange {
    pub fn new(source: ChangeSource, description: impl Into<String>) -> Self {
        Self {
            metadata: ChangeMetadata {
                source,
                description: description.into(),
                ..ChangeMetadata::default()
            },
            changes: Vec::new(),
        }
    }

    // 单一变更的便捷构造
    pub fn single(change: impl Into<StateChange>) -> Self {
        Self {
            metadata: ChangeMetadata::default(),
            changes: vec![change.into()],
        }
    }

    pub fn with_change(mut self, change: impl Into<StateChange>) -> Self {
        self.changes.push(change.into());
        self
    }

    pub fn with_physical_change(self, change: PhysicalChange) -> Self {
        self.with_change(change)
    }

    pub fn with_ability_change(self, change: AbilityChange) -> Self {
        self.with_change(change)
    }

    pub fn with_trait_change(self, change: TraitChange) -> Self {
        self.with_change(change)
    }

    pub fn with_behavior_change(self, change: BehaviorChange) -> Self {
        self.with_change(change)
    }

    pub fn with_priority(mut self, priority: ChangePriority) -> Self {
        self.metadata.priority = priority;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn has_physical_changes(&self) -> bool {
        self.changes.iter().any(|c| matches!(c, StateChange::Physical(_)))
    }

    pub fn has_ability_changes(&self) -> bool {
        self.changes.iter().any(|c| matches!(c, StateChange::Ability(_)))
    }

    pub fn has_trait_changes(&self) -> bool {
        self.changes.iter().any(|c| matches!(c, StateChange::Trait(_)))
    }

    pub fn has_behavior_changes(&self) -> bool {
        self.changes.iter().any(|c| matches!(c, StateChange::Behavior(_)))
    }

    // 结构性检查，不依赖任何状态
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.changes.is_empty() {
            errors.push("form change carries no sub-changes".to_string());
        }
        if self.metadata.tags.iter().any(|t| t.is_empty()) {
            errors.push("form change has an empty tag".to_string());
        }
        errors
    }

    // 由按顺序收集的逆变更构造撤销信封，逆变更需要倒序执行
    pub(crate) fn undo_of(original: &ChangeMetadata, mut inverses: Vec<StateChange>) -> Self {
        inverses.reverse();
        let mut tags = original.tags.clone();
        tags.push("undo".to_string());
        Self {
            metadata: ChangeMetadata {
                source: original.source,
                priority: original.priority,
                description: format!("undo: {}", original.description),
                tags,
            },
            changes: inverses,
        }
    }
}

// 变更结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeResult {
    pub success: bool,
    pub reasons: Vec<String>,
    pub undo: Option<FormChange>,
    pub events: Vec<CreatureEvent>,
}

impl ChangeResult {
    pub fn succeeded(undo: FormChange, events: Vec<CreatureEvent>) -> Self {
        Self {
            success: true,
            reasons: Vec::new(),
            undo: Some(undo),
            events,
        }
    }

    pub fn failed(reasons: Vec<String>) -> Self {
        Self {
            success: false,
            reasons,
            undo: None,
            events: Vec::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::failed(vec![reason.into()])
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

// 撤销删除时把元素放回原位置；已存在的元素会被移动过去，越界时放到末尾
pub(crate) fn insert_at_position<T: Hash + Eq>(set: &mut IndexSet<T>, value: T, index: usize) {
    let last = if set.contains(&value) { set.len().saturating_sub(1) } else { set.len() };
    set.shift_insert(index.min(last), value);
}

pub(crate) fn insert_entry_at_position<K: Hash + Eq, V>(map: &mut IndexMap<K, V>, key: K, value: V, index: usize) {
    let last = if map.contains_key(&key) { map.len().saturating_sub(1) } else { map.len() };
    map.shift_insert(index.min(last), key, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature_engine::enums::AbilityType;

    #[test]
    fn test_builder_collects_changes() {
        let change = FormChange::new(ChangeSource::Evolution, "grow wings")
            .with_physical_change(PhysicalChange::SetSize { size: Size::Large })
            .with_behavior_change(BehaviorChange::AddBehavior { behavior: "Nesting".to_string() })
            .with_priority(ChangePriority::High)
            .with_tag("molt");

        assert_eq!(change.len(), 2);
        assert!(change.has_physical_changes());
        assert!(change.has_behavior_changes());
        assert!(!change.has_trait_changes());
        assert_eq!(change.metadata.priority, ChangePriority::High);
        assert!(change.validate().is_empty());
    }

    #[test]
    fn test_empty_change_is_structurally_invalid() {
        let change = FormChange::new(ChangeSource::Manual, "nothing");
        assert!(change.is_empty());
        assert_eq!(change.validate().len(), 1);
    }

    #[test]
    fn test_undo_envelope_reverses_order() {
        let metadata = ChangeMetadata {
            description: "pair".to_string(),
            ..ChangeMetadata::default()
        };
        let undo = FormChange::undo_of(
            &metadata,
            vec![
                PhysicalChange::SetSize { size: Size::Tiny }.into(),
                PhysicalChange::SetShape { shape: BodyShape::Avian }.into(),
            ],
        );

        assert_eq!(undo.metadata.description, "undo: pair");
        assert_eq!(undo.metadata.tags, vec!["undo".to_string()]);
        assert_eq!(undo.changes[0], StateChange::Physical(PhysicalChange::SetShape { shape: BodyShape::Avian }));
    }

    #[test]
    fn test_change_json_shape() {
        let change = FormChange::single(AbilityChange::ModifyPower {
            name: "Fireball".to_string(),
            delta: 5.0,
        });
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["changes"][0]["target"], "ability");
        assert_eq!(value["changes"][0]["change"]["op"], "modify_power");

        let parsed: FormChange = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, change);
    }

    #[test]
    fn test_events() {
        let add = StateChange::Ability(AbilityChange::AddAbility {
            ability: Ability::new("Bite", AbilityType::Active, 3.0),
        });
        assert_eq!(add.event(), Some(CreatureEvent::AbilityUnlocked));

        let remove = StateChange::Trait(TraitChange::RemoveTrait { name: "Scales".to_string() });
        assert_eq!(remove.event(), Some(CreatureEvent::TraitLost));

        let tag = StateChange::Behavior(BehaviorChange::AddBehavior { behavior: "Roost".to_string() });
        assert_eq!(tag.event(), None);
    }

    #[test]
    fn test_insert_at_position() {
        let mut set: IndexSet<&str> = ["Horns", "Tail"].into_iter().collect();
        insert_at_position(&mut set, "Claws", 1);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["Horns", "Claws", "Tail"]);

        // 已存在的元素被移动，越界位置退到末尾
        insert_at_position(&mut set, "Horns", 9);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["Claws", "Tail", "Horns"]);

        let mut map: IndexMap<&str, f32> = IndexMap::new();
        map.insert("fire", 0.5);
        insert_entry_at_position(&mut map, "ice", 0.2, 0);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec!["ice", "fire"]);
    }
}
