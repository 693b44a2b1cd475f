/*
 * Creature Core - Ability State
 * 开发心理过程:
 * 1. 能力按值存放在有序序列中，名字到下标的映射保证O(1)查找
 * 2. 下标映射必须始终与序列一致，删除后要压缩后续下标
 * 3. 每个能力声明自己的需求集合；需求是否满足由聚合根结合其他子状态判断
 * 4. 撤销记录旧值，连续增量也能精确还原
 */

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::changes::{insert_at_position, AbilityChange, StateComponent};
use super::enums::AbilityType;
use crate::core::config::{Bounds, NumericLimits};
use crate::core::error::StateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    #[serde(rename = "type")]
    pub ability_type: AbilityType,
    #[serde(default)]
    pub description: String,
    pub base_power: f32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub requirements: IndexSet<String>,
}

fn default_active() -> bool {
    true
}

impl Ability {
    pub fn new(name: impl Into<String>, ability_type: AbilityType, base_power: f32) -> Self {
        Self {
            name: name.into(),
            ability_type,
            description: String::new(),
            base_power,
            active: true,
            requirements: IndexSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.insert(requirement.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbilityState {
    abilities: Vec<Ability>,
    ability_indices: HashMap<String, usize>,
    requirements: HashMap<String, IndexSet<String>>,
    power_bounds: Bounds,
    max_active: Option<usize>,
}

// 持久化文档：只保存能力序列，索引和需求映射在加载时重建
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbilityDocument {
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl Default for AbilityState {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityState {
    pub fn new() -> Self {
        Self::with_limits(&NumericLimits::default(), None)
    }

    pub fn with_limits(limits: &NumericLimits, max_active: Option<usize>) -> Self {
        Self {
            abilities: Vec::new(),
            ability_indices: HashMap::new(),
            requirements: HashMap::new(),
            power_bounds: limits.ability_power,
            max_active,
        }
    }

    pub fn configure(&mut self, limits: &NumericLimits, max_active: Option<usize>) {
        self.power_bounds = limits.ability_power;
        self.max_active = max_active;
    }

    // 核心能力管理
    pub fn add_ability(&mut self, ability: Ability) -> bool {
        if !self.can_insert(&ability) {
            return false;
        }
        let index = self.abilities.len();
        self.insert_at(index, ability);
        true
    }

    pub fn remove_ability(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };

        self.abilities.remove(index);
        self.ability_indices.remove(name);
        self.requirements.remove(name);
        self.reindex_from(index);
        true
    }

    pub fn has_ability(&self, name: &str) -> bool {
        self.ability_indices.contains_key(name)
    }

    pub fn get_ability(&self, name: &str) -> Option<&Ability> {
        self.index_of(name).map(|index| &self.abilities[index])
    }

    pub fn abilities(&self) -> &[Ability] {
        &self.abilities
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.ability_indices.get(name).copied()
    }

    pub fn active_count(&self) -> usize {
        self.abilities.iter().filter(|a| a.active).count()
    }

    // 威力修改
    pub fn modify_base_power(&mut self, name: &str, delta: f32) -> bool {
        match self.get_ability(name) {
            Some(ability) => {
                let power = ability.base_power + delta;
                self.set_base_power(name, power)
            }
            None => false,
        }
    }

    pub fn set_base_power(&mut self, name: &str, power: f32) -> bool {
        if !self.power_bounds.contains(power) {
            return false;
        }
        match self.ability_mut(name) {
            Some(ability) => {
                ability.base_power = power;
                true
            }
            None => false,
        }
    }

    pub fn set_ability_active(&mut self, name: &str, active: bool) -> bool {
        let Some(current) = self.get_ability(name).map(|a| a.active) else {
            return false;
        };
        if active && !current && self.active_limit_reached() {
            return false;
        }
        if let Some(ability) = self.ability_mut(name) {
            ability.active = active;
        }
        true
    }

    // 需求管理
    pub fn requirements(&self, name: &str) -> Option<&IndexSet<String>> {
        self.requirements.get(name)
    }

    // 重复添加不是错误，只是返回false
    pub fn add_requirement(&mut self, name: &str, requirement: &str) -> bool {
        if requirement.is_empty() || !self.has_ability(name) {
            return false;
        }
        let inserted = self
            .requirements
            .entry(name.to_string())
            .or_default()
            .insert(requirement.to_string());
        if inserted {
            if let Some(ability) = self.ability_mut(name) {
                ability.requirements.insert(requirement.to_string());
            }
        }
        inserted
    }

    pub fn remove_requirement(&mut self, name: &str, requirement: &str) -> bool {
        let removed = self
            .requirements
            .get_mut(name)
            .map_or(false, |set| set.shift_remove(requirement));
        if removed {
            if let Some(ability) = self.ability_mut(name) {
                ability.requirements.shift_remove(requirement);
            }
        }
        removed
    }

    // 把需求放回指定位置，能力自身的需求列表同步调整
    fn restore_requirement(&mut self, name: &str, requirement: &str, index: usize) {
        insert_at_position(self.requirements.entry(name.to_string()).or_default(), requirement.to_string(), index);
        if let Some(ability) = self.ability_mut(name) {
            insert_at_position(&mut ability.requirements, requirement.to_string(), index);
        }
    }

    fn requirement_position(&self, name: &str, requirement: &str) -> Option<usize> {
        self.requirements.get(name)?.get_index_of(requirement)
    }

    // 只回答"声明的需求是否都在给定集合中"，集合由聚合根提供
    pub fn meets_base_requirements(&self, name: &str, satisfied: &IndexSet<String>) -> bool {
        match self.requirements.get(name) {
            Some(required) => required.iter().all(|r| satisfied.contains(r)),
            None => false,
        }
    }

    pub fn unmet_requirements(&self, name: &str, satisfied: &IndexSet<String>) -> Vec<String> {
        self.requirements
            .get(name)
            .map(|required| required.iter().filter(|r| !satisfied.contains(*r)).cloned().collect())
            .unwrap_or_default()
    }

    // 内部辅助
    fn ability_mut(&mut self, name: &str) -> Option<&mut Ability> {
        let index = self.index_of(name)?;
        self.abilities.get_mut(index)
    }

    fn can_insert(&self, ability: &Ability) -> bool {
        !ability.name.is_empty()
            && !self.has_ability(&ability.name)
            && self.power_bounds.contains(ability.base_power)
            && !(ability.active && self.active_limit_reached())
    }

    fn active_limit_reached(&self) -> bool {
        self.max_active.map_or(false, |max| self.active_count() >= max)
    }

    fn insert_at(&mut self, index: usize, mut ability: Ability) {
        ability.requirements.retain(|r| !r.is_empty());
        let name = ability.name.clone();
        self.requirements.insert(name.clone(), ability.requirements.clone());
        self.abilities.insert(index, ability);
        self.ability_indices.insert(name, index);
        self.reindex_from(index);
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, ability) in self.abilities[start..].iter().enumerate() {
            self.ability_indices.insert(ability.name.clone(), start + offset);
        }
    }

    fn check_insert(&self, ability: &Ability, reasons: &mut Vec<String>) {
        if ability.name.is_empty() {
            reasons.push("ability name must not be empty".to_string());
        } else if self.has_ability(&ability.name) {
            reasons.push(format!("ability '{}' already exists", ability.name));
        }
        if !self.power_bounds.contains(ability.base_power) {
            reasons.push(format!(
                "ability '{}' power {} is outside {}",
                ability.name,
                ability.base_power,
                self.power_bounds.describe()
            ));
        }
        if ability.active && self.active_limit_reached() {
            reasons.push(format!("cannot add active ability '{}': active ability limit reached", ability.name));
        }
        if ability.requirements.iter().any(|r| r.is_empty()) {
            reasons.push(format!("ability '{}' declares an empty requirement", ability.name));
        }
    }

    fn check_exists(&self, name: &str, reasons: &mut Vec<String>) -> bool {
        if self.has_ability(name) {
            true
        } else {
            reasons.push(format!("ability '{}' does not exist", name));
            false
        }
    }

    fn check_power(&self, name: &str, power: f32, reasons: &mut Vec<String>) {
        if !self.power_bounds.contains(power) {
            reasons.push(format!(
                "ability '{}' power would become {}, outside {}",
                name,
                power,
                self.power_bounds.describe()
            ));
        }
    }

    // 校验细节
    fn validate_indices(&self, errors: &mut Vec<String>) {
        if self.ability_indices.len() != self.abilities.len() {
            errors.push(format!(
                "ability index has {} entries for {} abilities",
                self.ability_indices.len(),
                self.abilities.len()
            ));
        }
        for (index, ability) in self.abilities.iter().enumerate() {
            if ability.name.is_empty() {
                errors.push(format!("ability at position {} has an empty name", index));
            }
            if self.ability_indices.get(&ability.name) != Some(&index) {
                errors.push(format!("ability '{}' is not indexed at position {}", ability.name, index));
            }
        }
    }

    fn validate_abilities(&self, errors: &mut Vec<String>) {
        for ability in &self.abilities {
            if !self.power_bounds.contains(ability.base_power) {
                errors.push(format!(
                    "ability '{}' power {} is outside {}",
                    ability.name,
                    ability.base_power,
                    self.power_bounds.describe()
                ));
            }
        }
        if let Some(max) = self.max_active {
            let active = self.active_count();
            if active > max {
                errors.push(format!("{} active abilities exceed the limit of {}", active, max));
            }
        }
    }

    fn validate_requirements(&self, errors: &mut Vec<String>) {
        for name in self.requirements.keys() {
            if !self.has_ability(name) {
                errors.push(format!("requirements recorded for unknown ability '{}'", name));
            }
        }
        for ability in &self.abilities {
            match self.requirements.get(&ability.name) {
                Some(required) if *required == ability.requirements => {}
                _ => errors.push(format!("requirement map out of sync for ability '{}'", ability.name)),
            }
            if ability.requirements.iter().any(|r| r.is_empty()) {
                errors.push(format!("ability '{}' declares an empty requirement", ability.name));
            }
        }
    }
}

impl StateComponent for AbilityState {
    type Change = AbilityChange;

    const NAME: &'static str = "ability";

    fn check_change(&self, change: &AbilityChange) -> Vec<String> {
        let mut reasons = Vec::new();
        match change {
            AbilityChange::AddAbility { ability } => self.check_insert(ability, &mut reasons),
            AbilityChange::RestoreAbility { ability, index } => {
                self.check_insert(ability, &mut reasons);
                if *index > self.abilities.len() {
                    reasons.push(format!("ability index {} is out of range", index));
                }
            }
            AbilityChange::RemoveAbility { name } => {
                self.check_exists(name, &mut reasons);
            }
            AbilityChange::ModifyPower { name, delta } => {
                if let Some(ability) = self.get_ability(name) {
                    self.check_power(name, ability.base_power + delta, &mut reasons);
                } else {
                    self.check_exists(name, &mut reasons);
                }
            }
            AbilityChange::SetPower { name, power } => {
                if self.check_exists(name, &mut reasons) {
                    self.check_power(name, *power, &mut reasons);
                }
            }
            AbilityChange::SetActive { name, active } => {
                if self.check_exists(name, &mut reasons) {
                    let currently = self.get_ability(name).map_or(false, |a| a.active);
                    if *active && !currently && self.active_limit_reached() {
                        reasons.push(format!("cannot activate '{}': active ability limit reached", name));
                    }
                }
            }
            AbilityChange::AddRequirement { name, requirement } => {
                self.check_exists(name, &mut reasons);
                if requirement.is_empty() {
                    reasons.push("requirement must not be empty".to_string());
                }
            }
            AbilityChange::RemoveRequirement { name, .. } => {
                self.check_exists(name, &mut reasons);
            }
            AbilityChange::RestoreRequirement { name, requirement, .. } => {
                self.check_exists(name, &mut reasons);
                if requirement.is_empty() {
                    reasons.push("requirement must not be empty".to_string());
                }
            }
        }
        reasons
    }

    fn apply_change(&mut self, change: &AbilityChange) -> bool {
        if !self.can_apply_change(change) {
            return false;
        }

        match change {
            AbilityChange::AddAbility { ability } => {
                let index = self.abilities.len();
                self.insert_at(index, ability.clone());
            }
            AbilityChange::RestoreAbility { ability, index } => self.insert_at(*index, ability.clone()),
            AbilityChange::RemoveAbility { name } => {
                self.remove_ability(name);
            }
            AbilityChange::ModifyPower { name, delta } => {
                self.modify_base_power(name, *delta);
            }
            AbilityChange::SetPower { name, power } => {
                self.set_base_power(name, *power);
            }
            AbilityChange::SetActive { name, active } => {
                self.set_ability_active(name, *active);
            }
            AbilityChange::AddRequirement { name, requirement } => {
                self.add_requirement(name, requirement);
            }
            AbilityChange::RemoveRequirement { name, requirement } => {
                self.remove_requirement(name, requirement);
            }
            AbilityChange::RestoreRequirement { name, requirement, index } => {
                self.restore_requirement(name, requirement, *index);
            }
        }

        debug!("能力状态变更: {:?}", change);
        true
    }

    fn generate_undo(&self, change: &AbilityChange) -> Option<AbilityChange> {
        let undo = match change {
            AbilityChange::AddAbility { ability } | AbilityChange::RestoreAbility { ability, .. } => {
                AbilityChange::RemoveAbility { name: ability.name.clone() }
            }
            AbilityChange::RemoveAbility { name } => {
                let index = self.index_of(name)?;
                AbilityChange::RestoreAbility {
                    ability: self.abilities[index].clone(),
                    index,
                }
            }
            // 记录旧值而不是反向增量
            AbilityChange::ModifyPower { name, .. } | AbilityChange::SetPower { name, .. } => {
                AbilityChange::SetPower {
                    name: name.clone(),
                    power: self.get_ability(name)?.base_power,
                }
            }
            AbilityChange::SetActive { name, .. } => AbilityChange::SetActive {
                name: name.clone(),
                active: self.get_ability(name)?.active,
            },
            AbilityChange::AddRequirement { name, requirement } => {
                let present = self.requirements.get(name).map_or(false, |r| r.contains(requirement));
                if present {
                    change.clone()
                } else {
                    AbilityChange::RemoveRequirement {
                        name: name.clone(),
                        requirement: requirement.clone(),
                    }
                }
            }
            AbilityChange::RemoveRequirement { name, requirement } => {
                match self.requirement_position(name, requirement) {
                    Some(index) => AbilityChange::RestoreRequirement {
                        name: name.clone(),
                        requirement: requirement.clone(),
                        index,
                    },
                    None => change.clone(),
                }
            }
            AbilityChange::RestoreRequirement { name, requirement, .. } => {
                match self.requirement_position(name, requirement) {
                    Some(index) => AbilityChange::RestoreRequirement {
                        name: name.clone(),
                        requirement: requirement.clone(),
                        index,
                    },
                    None => AbilityChange::RemoveRequirement {
                        name: name.clone(),
                        requirement: requirement.clone(),
                    },
                }
            }
        };
        Some(undo)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.validate_indices(&mut errors);
        self.validate_abilities(&mut errors);
        self.validate_requirements(&mut errors);
        errors
    }
}

impl TryFrom<AbilityDocument> for AbilityState {
    type Error = StateError;

    fn try_from(document: AbilityDocument) -> Result<Self, Self::Error> {
        let mut state = AbilityState::default();
        for ability in document.abilities {
            if ability.name.is_empty() {
                return Err(StateError::InvalidDocument("ability with empty name".to_string()));
            }
            if state.has_ability(&ability.name) {
                return Err(StateError::InvalidDocument(format!("duplicate ability '{}'", ability.name)));
            }
            let index = state.abilities.len();
            state.insert_at(index, ability);
        }
        Ok(state)
    }
}

impl Serialize for AbilityState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AbilityDocument {
            abilities: self.abilities.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AbilityState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = AbilityDocument::deserialize(deserializer)?;
        AbilityState::try_from(document).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fireball() -> Ability {
        Ability::new("Fireball", AbilityType::Active, 10.0).with_requirement("FireAffinity")
    }

    fn assert_index_consistent(state: &AbilityState) {
        assert_eq!(state.ability_indices.len(), state.abilities.len());
        for (i, ability) in state.abilities().iter().enumerate() {
            assert_eq!(state.index_of(&ability.name), Some(i));
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut state = AbilityState::new();
        assert!(state.add_ability(fireball()));
        assert!(!state.add_ability(fireball()));
        assert!(!state.add_ability(Ability::new("", AbilityType::Passive, 1.0)));

        let stored = state.get_ability("Fireball").unwrap();
        assert_eq!(stored.base_power, 10.0);
        assert!(stored.requirements.contains("FireAffinity"));
        assert!(state.requirements("Fireball").unwrap().contains("FireAffinity"));
        assert!(state.get_ability("Frostbite").is_none());
    }

    #[test]
    fn test_index_consistency_through_adds_and_removes() {
        let mut state = AbilityState::new();
        for name in ["A", "B", "C", "D", "E"] {
            assert!(state.add_ability(Ability::new(name, AbilityType::Passive, 1.0).inactive()));
        }
        assert!(state.remove_ability("B"));
        assert_index_consistent(&state);
        assert!(state.remove_ability("E"));
        assert_index_consistent(&state);
        assert!(state.add_ability(Ability::new("F", AbilityType::Passive, 2.0)));
        assert!(state.remove_ability("A"));
        assert!(!state.remove_ability("A"));
        assert_index_consistent(&state);

        let names: Vec<_> = state.abilities().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["C", "D", "F"]);
        assert!(state.requirements("A").is_none());
        assert!(state.is_valid());
    }

    #[test]
    fn test_power_floor() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());
        assert!(state.modify_base_power("Fireball", -4.0));
        assert!(!state.modify_base_power("Fireball", -7.0));
        assert_eq!(state.get_ability("Fireball").unwrap().base_power, 6.0);
        assert!(state.modify_base_power("Fireball", -6.0));
        assert!(!state.modify_base_power("Missing", 1.0));

        let change = AbilityChange::ModifyPower {
            name: "Fireball".to_string(),
            delta: -0.5,
        };
        assert_eq!(state.check_change(&change).len(), 1);
    }

    #[test]
    fn test_requirements_are_idempotent() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());
        assert!(!state.add_requirement("Fireball", "FireAffinity"));
        assert!(state.add_requirement("Fireball", "Lungs"));
        assert!(!state.add_requirement("Missing", "Lungs"));
        assert!(state.remove_requirement("Fireball", "Lungs"));
        assert!(!state.remove_requirement("Fireball", "Lungs"));

        let change = AbilityChange::AddRequirement {
            name: "Fireball".to_string(),
            requirement: "FireAffinity".to_string(),
        };
        assert!(state.can_apply_change(&change));
        assert!(state.is_valid());
    }

    #[test]
    fn test_meets_base_requirements() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());
        state.add_ability(Ability::new("Bite", AbilityType::Active, 2.0));

        let mut satisfied = IndexSet::new();
        assert!(!state.meets_base_requirements("Fireball", &satisfied));
        assert_eq!(state.unmet_requirements("Fireball", &satisfied), vec!["FireAffinity".to_string()]);
        assert!(state.meets_base_requirements("Bite", &satisfied));

        satisfied.insert("FireAffinity".to_string());
        assert!(state.meets_base_requirements("Fireball", &satisfied));
        assert!(!state.meets_base_requirements("Missing", &satisfied));
    }

    #[test]
    fn test_power_undo_is_exact() {
        let mut state = AbilityState::new();
        state.add_ability(Ability::new("Spark", AbilityType::Active, 0.1));
        let before = state.clone();

        let mut undos = Vec::new();
        for delta in [0.2_f32, 0.7, 1.3] {
            let change = AbilityChange::ModifyPower {
                name: "Spark".to_string(),
                delta,
            };
            undos.push(state.generate_undo(&change).unwrap());
            assert!(state.apply_change(&change));
        }
        for undo in undos.into_iter().rev() {
            assert!(state.apply_change(&undo));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_undo_restores_position_and_requirements() {
        let mut state = AbilityState::new();
        state.add_ability(Ability::new("Claw", AbilityType::Active, 4.0));
        state.add_ability(fireball());
        state.add_ability(Ability::new("Roar", AbilityType::Reactive, 1.0));
        state.add_requirement("Fireball", "Lungs");
        let before = state.clone();

        let change = AbilityChange::RemoveAbility { name: "Fireball".to_string() };
        let undo = state.generate_undo(&change).unwrap();
        assert!(state.apply_change(&change));
        assert_eq!(state.index_of("Roar"), Some(1));

        assert!(state.apply_change(&undo));
        assert_eq!(state, before);
        assert_index_consistent(&state);
    }

    #[test]
    fn test_remove_requirement_undo_keeps_order() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());
        state.add_requirement("Fireball", "Lungs");
        state.add_requirement("Fireball", "Heat");
        let before = serde_json::to_value(&state).unwrap();

        let change = AbilityChange::RemoveRequirement {
            name: "Fireball".to_string(),
            requirement: "FireAffinity".to_string(),
        };
        let undo = state.generate_undo(&change).unwrap();
        assert!(state.apply_change(&change));
        assert!(state.apply_change(&undo));

        assert_eq!(serde_json::to_value(&state).unwrap(), before);
        let order: Vec<_> = state.requirements("Fireball").unwrap().iter().cloned().collect();
        assert_eq!(order, vec!["FireAffinity", "Lungs", "Heat"]);
    }

    #[test]
    fn test_active_limit() {
        let limits = NumericLimits::default();
        let mut state = AbilityState::with_limits(&limits, Some(1));
        assert!(state.add_ability(Ability::new("One", AbilityType::Active, 1.0)));
        assert!(!state.add_ability(Ability::new("Two", AbilityType::Active, 1.0)));
        assert!(state.add_ability(Ability::new("Two", AbilityType::Active, 1.0).inactive()));
        assert!(!state.set_ability_active("Two", true));
        assert!(state.set_ability_active("One", false));
        assert!(state.set_ability_active("Two", true));
        assert_eq!(state.active_count(), 1);
    }

    #[test]
    fn test_change_rejections() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());

        let duplicate = AbilityChange::AddAbility { ability: fireball() };
        assert!(!state.can_apply_change(&duplicate));
        assert!(!state.apply_change(&duplicate));

        let missing = AbilityChange::RemoveAbility { name: "Ghost".to_string() };
        assert!(!state.can_apply_change(&missing));
        assert!(state.generate_undo(&missing).is_none());

        let negative = AbilityChange::SetPower {
            name: "Fireball".to_string(),
            power: -1.0,
        };
        assert!(!state.can_apply_change(&negative));
        assert_eq!(state.get_ability("Fireball").unwrap().base_power, 10.0);
    }

    #[test]
    fn test_document_round_trip() {
        let mut state = AbilityState::new();
        state.add_ability(fireball());
        state.add_ability(Ability::new("Claw", AbilityType::Active, 3.5).with_description("rend"));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["abilities"][0]["name"], "Fireball");
        assert_eq!(json["abilities"][1]["type"], "Active");

        let restored: AbilityState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_document_rejects_duplicates() {
        let json = serde_json::json!({
            "abilities": [
                {"name": "Claw", "type": "Active", "base_power": 1.0},
                {"name": "Claw", "type": "Passive", "base_power": 2.0}
            ]
        });
        let result: Result<AbilityState, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
