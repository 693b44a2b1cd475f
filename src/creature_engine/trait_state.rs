/*
 * Creature Core - Trait State
 * 开发心理过程:
 * 1. 特性序列只保存名字、类别、来源，所有关系数据按名字存放在独立映射中
 * 2. 不兼容关系是对称的，可以提前声明与尚未拥有的特性冲突
 * 3. 删除特性要从所有其他特性的不兼容集合和变异路径中清除它，是O(n)的关系清理
 * 4. 撤销删除时恢复完整的关系记录，包括其他特性指向它的变异路径
 * 5. 两个都不在序列中的特性之间的冲突声明单独写进文档，重新加载后仍然生效
 */

use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::changes::{insert_at_position, insert_entry_at_position, RelationLink, StateComponent, TraitChange};
use super::enums::{TraitCategory, TraitOrigin};
use crate::core::config::{Bounds, NumericLimits};
use crate::core::error::StateError;

pub const DEFAULT_TRAIT_STRENGTH: f32 = 1.0;

fn default_strength() -> f32 {
    DEFAULT_TRAIT_STRENGTH
}

// 特性定义：插入时的完整载荷，也是get_trait的返回形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDefinition {
    pub name: String,
    #[serde(default)]
    pub category: TraitCategory,
    #[serde(default)]
    pub origin: TraitOrigin,
    #[serde(default = "default_strength")]
    pub base_strength: f32,
    #[serde(default)]
    pub manifestations: IndexSet<String>,
    #[serde(default)]
    pub incompatible_with: IndexSet<String>,
    #[serde(default)]
    pub mutations: IndexSet<String>,
    #[serde(default)]
    pub theme_resonance: IndexMap<String, f32>,
}

impl TraitDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: TraitCategory::default(),
            origin: TraitOrigin::default(),
            base_strength: DEFAULT_TRAIT_STRENGTH,
            manifestations: IndexSet::new(),
            incompatible_with: IndexSet::new(),
            mutations: IndexSet::new(),
            theme_resonance: IndexMap::new(),
        }
    }

    pub fn with_category(mut self, category: TraitCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_origin(mut self, origin: TraitOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.base_strength = strength;
        self
    }

    pub fn with_manifestation(mut self, manifestation: impl Into<String>) -> Self {
        self.manifestations.insert(manifestation.into());
        self
    }

    pub fn incompatible_with(mut self, other: impl Into<String>) -> Self {
        self.incompatible_with.insert(other.into());
        self
    }

    pub fn with_mutation(mut self, target: impl Into<String>) -> Self {
        self.mutations.insert(target.into());
        self
    }

    pub fn with_resonance(mut self, theme: impl Into<String>, resonance: f32) -> Self {
        self.theme_resonance.insert(theme.into(), resonance);
        self
    }
}

// 序列中保存的特性本体
#[derive(Debug, Clone, PartialEq)]
struct TraitProfile {
    name: String,
    category: TraitCategory,
    origin: TraitOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitState {
    // 核心存储
    traits: Vec<TraitProfile>,
    trait_indices: HashMap<String, usize>,

    // 关系和属性
    incompatibilities: IndexMap<String, IndexSet<String>>,
    base_strengths: IndexMap<String, f32>,
    manifestations: IndexMap<String, IndexSet<String>>,
    mutation_paths: IndexMap<String, IndexSet<String>>,
    theme_resonance: IndexMap<String, IndexMap<String, f32>>,

    // 配置
    strength_bounds: Bounds,
    resonance_bounds: Bounds,
    require_registered_targets: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitDocument {
    #[serde(default)]
    pub traits: Vec<TraitDefinition>,
    // 未拥有特性的冲突声明，按名字排序输出
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub incompatibilities: IndexMap<String, IndexSet<String>>,
}

impl Default for TraitState {
    fn default() -> Self {
        Self::new()
    }
}

impl TraitState {
    pub fn new() -> Self {
        Self::with_limits(&NumericLimits::default(), false)
    }

    pub fn with_limits(limits: &NumericLimits, require_registered_targets: bool) -> Self {
        Self {
            traits: Vec::new(),
            trait_indices: HashMap::new(),
            incompatibilities: IndexMap::new(),
            base_strengths: IndexMap::new(),
            manifestations: IndexMap::new(),
            mutation_paths: IndexMap::new(),
            theme_resonance: IndexMap::new(),
            strength_bounds: limits.trait_strength,
            resonance_bounds: limits.theme_resonance,
            require_registered_targets,
        }
    }

    pub fn configure(&mut self, limits: &NumericLimits, require_registered_targets: bool) {
        self.strength_bounds = limits.trait_strength;
        self.resonance_bounds = limits.theme_resonance;
        self.require_registered_targets = require_registered_targets;
    }

    // 核心特性管理
    pub fn add_trait(&mut self, definition: TraitDefinition) -> bool {
        let mut reasons = Vec::new();
        self.check_insert(&definition, &mut reasons);
        self.check_conflicts(&definition, &mut reasons);
        if !reasons.is_empty() {
            return false;
        }
        let index = self.traits.len();
        self.insert_at(index, definition);
        true
    }

    pub fn remove_trait(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };

        self.traits.remove(index);
        self.trait_indices.remove(name);
        self.reindex_from(index);

        self.base_strengths.shift_remove(name);
        self.manifestations.shift_remove(name);
        self.mutation_paths.shift_remove(name);
        self.theme_resonance.shift_remove(name);

        // 清理对称的不兼容关系
        if let Some(partners) = self.incompatibilities.shift_remove(name) {
            for partner in partners {
                self.unlink_one_side(&partner, name);
            }
        }

        // 清理其他特性指向它的变异路径
        for targets in self.mutation_paths.values_mut() {
            targets.shift_remove(name);
        }

        true
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.trait_indices.contains_key(name)
    }

    // 从关系映射重新组装完整定义
    pub fn get_trait(&self, name: &str) -> Option<TraitDefinition> {
        let profile = &self.traits[self.index_of(name)?];
        Some(TraitDefinition {
            name: profile.name.clone(),
            category: profile.category,
            origin: profile.origin,
            base_strength: self.base_strengths.get(name).copied().unwrap_or(DEFAULT_TRAIT_STRENGTH),
            manifestations: self.manifestations.get(name).cloned().unwrap_or_default(),
            incompatible_with: self.incompatibilities.get(name).cloned().unwrap_or_default(),
            mutations: self.mutation_paths.get(name).cloned().unwrap_or_default(),
            theme_resonance: self.theme_resonance.get(name).cloned().unwrap_or_default(),
        })
    }

    pub fn all_traits(&self) -> Vec<TraitDefinition> {
        self.traits.iter().filter_map(|p| self.get_trait(&p.name)).collect()
    }

    pub fn trait_names(&self) -> impl Iterator<Item = &str> {
        self.traits.iter().map(|p| p.name.as_str())
    }

    pub fn category(&self, name: &str) -> Option<TraitCategory> {
        self.index_of(name).map(|i| self.traits[i].category)
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.trait_indices.get(name).copied()
    }

    // 表现形式管理
    pub fn add_base_manifestation(&mut self, name: &str, manifestation: &str) -> bool {
        if manifestation.is_empty() {
            return false;
        }
        match self.manifestations.get_mut(name) {
            Some(set) => set.insert(manifestation.to_string()),
            None => false,
        }
    }

    pub fn remove_base_manifestation(&mut self, name: &str, manifestation: &str) -> bool {
        self.manifestations
            .get_mut(name)
            .map_or(false, |set| set.shift_remove(manifestation))
    }

    pub fn base_manifestations(&self, name: &str) -> Option<&IndexSet<String>> {
        self.manifestations.get(name)
    }

    // 兼容性管理：任一特性未知时视为兼容
    pub fn is_compatible(&self, first: &str, second: &str) -> bool {
        if !self.has_trait(first) || !self.has_trait(second) {
            return true;
        }
        !self
            .incompatibilities
            .get(first)
            .map_or(false, |set| set.contains(second))
    }

    pub fn are_declared_incompatible(&self, first: &str, second: &str) -> bool {
        self.incompatibilities
            .get(first)
            .map_or(false, |set| set.contains(second))
    }

    pub fn set_incompatible(&mut self, first: &str, second: &str) -> bool {
        if first.is_empty() || second.is_empty() || first == second {
            return false;
        }
        if self.are_declared_incompatible(first, second) {
            return false;
        }
        self.link(first, second);
        true
    }

    pub fn remove_incompatibility(&mut self, first: &str, second: &str) -> bool {
        if !self.are_declared_incompatible(first, second) {
            return false;
        }
        self.unlink_one_side(first, second);
        self.unlink_one_side(second, first);
        true
    }

    pub fn incompatibilities(&self, name: &str) -> Option<&IndexSet<String>> {
        self.incompatibilities.get(name)
    }

    // 基础强度
    pub fn base_strength(&self, name: &str) -> Option<f32> {
        self.base_strengths.get(name).copied()
    }

    pub fn set_base_strength(&mut self, name: &str, strength: f32) -> bool {
        if !self.strength_bounds.contains(strength) {
            return false;
        }
        match self.base_strengths.get_mut(name) {
            Some(value) => {
                *value = strength;
                true
            }
            None => false,
        }
    }

    pub fn modify_base_strength(&mut self, name: &str, delta: f32) -> bool {
        match self.base_strength(name) {
            Some(current) => self.set_base_strength(name, current + delta),
            None => false,
        }
    }

    // 主题共鸣：未设置的主题返回0
    pub fn theme_resonance(&self, name: &str, theme: &str) -> f32 {
        self.theme_resonance
            .get(name)
            .and_then(|themes| themes.get(theme))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn theme_resonances(&self, name: &str) -> Option<&IndexMap<String, f32>> {
        self.theme_resonance.get(name)
    }

    pub fn set_theme_resonance(&mut self, name: &str, theme: &str, resonance: f32) -> bool {
        if theme.is_empty() || !self.resonance_bounds.contains(resonance) {
            return false;
        }
        match self.theme_resonance.get_mut(name) {
            Some(themes) => {
                themes.insert(theme.to_string(), resonance);
                true
            }
            None => false,
        }
    }

    pub fn clear_theme_resonance(&mut self, name: &str, theme: &str) -> bool {
        self.theme_resonance
            .get_mut(name)
            .map_or(false, |themes| themes.shift_remove(theme).is_some())
    }

    // 变异路径
    pub fn add_mutation_path(&mut self, name: &str, target: &str) -> bool {
        let mut reasons = Vec::new();
        self.check_new_mutation_path(name, target, &mut reasons);
        if !reasons.is_empty() {
            return false;
        }
        match self.mutation_paths.get_mut(name) {
            Some(targets) => targets.insert(target.to_string()),
            None => false,
        }
    }

    pub fn remove_mutation_path(&mut self, name: &str, target: &str) -> bool {
        self.mutation_paths
            .get_mut(name)
            .map_or(false, |targets| targets.shift_remove(target))
    }

    pub fn mutation_paths(&self, name: &str) -> Option<&IndexSet<String>> {
        self.mutation_paths.get(name)
    }

    // 所有变异路径指向target的特性，按序列顺序
    pub fn mutation_sources(&self, target: &str) -> Vec<String> {
        self.mutation_links(target).into_iter().map(|link| link.name).collect()
    }

    // 指向target的变异路径，以及target在各自路径集合中的位置
    fn mutation_links(&self, target: &str) -> Vec<RelationLink> {
        self.traits
            .iter()
            .filter_map(|p| {
                let index = self.mutation_paths.get(&p.name)?.get_index_of(target)?;
                Some(RelationLink {
                    name: p.name.clone(),
                    index,
                })
            })
            .collect()
    }

    // name在每个冲突对象的集合中的位置
    fn incompatibility_links(&self, name: &str) -> Vec<RelationLink> {
        self.incompatibilities
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|partner| {
                let index = self.incompatibilities.get(partner)?.get_index_of(name)?;
                Some(RelationLink {
                    name: partner.clone(),
                    index,
                })
            })
            .collect()
    }

    // 两个都不在序列中的冲突声明
    fn detached_incompatibilities(&self) -> IndexMap<String, IndexSet<String>> {
        let mut detached: Vec<_> = self
            .incompatibilities
            .iter()
            .filter(|(name, _)| !self.has_trait(name))
            .map(|(name, partners)| (name.clone(), partners.clone()))
            .collect();
        detached.sort_by(|a, b| a.0.cmp(&b.0));
        detached.into_iter().collect()
    }

    fn restore_trait(
        &mut self,
        definition: &TraitDefinition,
        index: usize,
        sources: &[RelationLink],
        partners: &[RelationLink],
    ) {
        let name = definition.name.clone();
        self.insert_at(index, definition.clone());
        for link in sources {
            if let Some(targets) = self.mutation_paths.get_mut(&link.name) {
                insert_at_position(targets, name.clone(), link.index);
            }
        }
        for link in partners {
            if let Some(set) = self.incompatibilities.get_mut(&link.name) {
                insert_at_position(set, name.clone(), link.index);
            }
        }
    }

    fn restore_incompatibility(&mut self, first: &str, second: &str, first_index: usize, second_index: usize) {
        self.link(first, second);
        if let Some(set) = self.incompatibilities.get_mut(first) {
            insert_at_position(set, second.to_string(), first_index);
        }
        if let Some(set) = self.incompatibilities.get_mut(second) {
            insert_at_position(set, first.to_string(), second_index);
        }
    }

    // 已声明冲突的当前位置，作为恢复变更
    fn incompatibility_position(&self, first: &str, second: &str) -> Option<TraitChange> {
        Some(TraitChange::RestoreIncompatibility {
            first: first.to_string(),
            second: second.to_string(),
            first_index: self.incompatibilities.get(first)?.get_index_of(second)?,
            second_index: self.incompatibilities.get(second)?.get_index_of(first)?,
        })
    }

    // 内部辅助
    fn insert_at(&mut self, index: usize, definition: TraitDefinition) {
        let TraitDefinition {
            name,
            category,
            origin,
            base_strength,
            mut manifestations,
            incompatible_with,
            mut mutations,
            theme_resonance,
        } = definition;

        manifestations.retain(|m| !m.is_empty());
        mutations.retain(|m| !m.is_empty() && *m != name);

        self.traits.insert(
            index,
            TraitProfile {
                name: name.clone(),
                category,
                origin,
            },
        );
        self.trait_indices.insert(name.clone(), index);
        self.reindex_from(index);

        self.base_strengths.insert(name.clone(), base_strength);
        self.manifestations.insert(name.clone(), manifestations);
        self.mutation_paths.insert(name.clone(), mutations);
        self.theme_resonance.insert(name.clone(), theme_resonance);

        for other in incompatible_with {
            if !other.is_empty() && other != name {
                self.link(&name, &other);
            }
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, profile) in self.traits[start..].iter().enumerate() {
            self.trait_indices.insert(profile.name.clone(), start + offset);
        }
    }

    fn link(&mut self, first: &str, second: &str) {
        self.incompatibilities
            .entry(first.to_string())
            .or_default()
            .insert(second.to_string());
        self.incompatibilities
            .entry(second.to_string())
            .or_default()
            .insert(first.to_string());
    }

    // 删除单向关系，集合空了就删掉键
    fn unlink_one_side(&mut self, owner: &str, other: &str) {
        let now_empty = match self.incompatibilities.get_mut(owner) {
            Some(set) => {
                set.shift_remove(other);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.incompatibilities.shift_remove(owner);
        }
    }

    fn check_insert(&self, definition: &TraitDefinition, reasons: &mut Vec<String>) {
        let name = &definition.name;
        if name.is_empty() {
            reasons.push("trait name must not be empty".to_string());
            return;
        }
        if self.has_trait(name) {
            reasons.push(format!("trait '{}' already exists", name));
        }
        if !self.strength_bounds.contains(definition.base_strength) {
            reasons.push(format!(
                "trait '{}' strength {} is outside {}",
                name,
                definition.base_strength,
                self.strength_bounds.describe()
            ));
        }
        for (theme, resonance) in &definition.theme_resonance {
            if theme.is_empty() {
                reasons.push(format!("trait '{}' has resonance for an empty theme", name));
            } else if !self.resonance_bounds.contains(*resonance) {
                reasons.push(format!(
                    "trait '{}' resonance {} for theme '{}' is outside {}",
                    name,
                    resonance,
                    theme,
                    self.resonance_bounds.describe()
                ));
            }
        }
        if definition.incompatible_with.contains(name) {
            reasons.push(format!("trait '{}' cannot be incompatible with itself", name));
        }
        if definition.mutations.contains(name) {
            reasons.push(format!("trait '{}' cannot mutate into itself", name));
        }
        if self.require_registered_targets {
            for target in &definition.mutations {
                if !self.has_trait(target) {
                    reasons.push(format!("mutation target '{}' of '{}' is not a known trait", target, name));
                }
            }
        }
    }

    // 新特性不能与已有特性冲突，双向都要检查
    fn check_conflicts(&self, definition: &TraitDefinition, reasons: &mut Vec<String>) {
        let declared_here = definition.incompatible_with.iter();
        let declared_elsewhere = self
            .incompatibilities
            .get(&definition.name)
            .into_iter()
            .flat_map(|set| set.iter());

        let mut conflicts: IndexSet<&str> = IndexSet::new();
        for other in declared_here.chain(declared_elsewhere) {
            if self.has_trait(other) {
                conflicts.insert(other.as_str());
            }
        }
        for other in conflicts {
            reasons.push(format!(
                "trait '{}' is incompatible with active trait '{}'",
                definition.name, other
            ));
        }
    }

    fn check_exists(&self, name: &str, reasons: &mut Vec<String>) -> bool {
        if self.has_trait(name) {
            true
        } else {
            reasons.push(format!("trait '{}' does not exist", name));
            false
        }
    }

    fn check_new_mutation_path(&self, name: &str, target: &str, reasons: &mut Vec<String>) {
        if !self.check_exists(name, reasons) {
            return;
        }
        if target.is_empty() {
            reasons.push("mutation target must not be empty".to_string());
        } else if target == name {
            reasons.push(format!("trait '{}' cannot mutate into itself", name));
        } else if self.mutation_paths.get(name).map_or(false, |t| t.contains(target)) {
            reasons.push(format!("mutation path '{}' -> '{}' already exists", name, target));
        } else if self.require_registered_targets && !self.has_trait(target) {
            reasons.push(format!("mutation target '{}' is not a known trait", target));
        }
    }

    fn check_strength(&self, name: &str, strength: f32, reasons: &mut Vec<String>) {
        if !self.strength_bounds.contains(strength) {
            reasons.push(format!(
                "trait '{}' strength would become {}, outside {}",
                name,
                strength,
                self.strength_bounds.describe()
            ));
        }
    }

    // 校验细节
    fn validate_traits(&self, errors: &mut Vec<String>) {
        if self.trait_indices.len() != self.traits.len() {
            errors.push(format!(
                "trait index has {} entries for {} traits",
                self.trait_indices.len(),
                self.traits.len()
            ));
        }
        for (index, profile) in self.traits.iter().enumerate() {
            if profile.name.is_empty() {
                errors.push(format!("trait at position {} has an empty name", index));
            }
            if self.trait_indices.get(&profile.name) != Some(&index) {
                errors.push(format!("trait '{}' is not indexed at position {}", profile.name, index));
            }
            if !self.manifestations.contains_key(&profile.name)
                || !self.mutation_paths.contains_key(&profile.name)
                || !self.theme_resonance.contains_key(&profile.name)
            {
                errors.push(format!("trait '{}' is missing relation entries", profile.name));
            }
        }

        let stale = self
            .manifestations
            .keys()
            .chain(self.mutation_paths.keys())
            .chain(self.theme_resonance.keys())
            .chain(self.base_strengths.keys())
            .filter(|name| !self.has_trait(name))
            .collect::<IndexSet<_>>();
        for name in stale {
            errors.push(format!("relation data recorded for unknown trait '{}'", name));
        }

        for set in self.manifestations.values() {
            if set.iter().any(|m| m.is_empty()) {
                errors.push("trait manifestations must not be empty".to_string());
                break;
            }
        }
    }

    fn validate_compatibility(&self, errors: &mut Vec<String>) {
        for (name, partners) in &self.incompatibilities {
            if partners.is_empty() {
                errors.push(format!("empty incompatibility entry for '{}'", name));
            }
            for partner in partners {
                if partner == name {
                    errors.push(format!("trait '{}' is incompatible with itself", name));
                } else if !self.are_declared_incompatible(partner, name) {
                    errors.push(format!(
                        "incompatibility '{}' -> '{}' is not symmetric",
                        name, partner
                    ));
                }
            }
        }
    }

    fn validate_strengths(&self, errors: &mut Vec<String>) {
        for profile in &self.traits {
            match self.base_strengths.get(&profile.name) {
                Some(strength) if self.strength_bounds.contains(*strength) => {}
                Some(strength) => errors.push(format!(
                    "trait '{}' strength {} is outside {}",
                    profile.name,
                    strength,
                    self.strength_bounds.describe()
                )),
                None => errors.push(format!("trait '{}' has no base strength", profile.name)),
            }
        }
        for (name, themes) in &self.theme_resonance {
            for (theme, resonance) in themes {
                if theme.is_empty() || !self.resonance_bounds.contains(*resonance) {
                    errors.push(format!(
                        "trait '{}' resonance {} for theme '{}' is invalid",
                        name, resonance, theme
                    ));
                }
            }
        }
    }

    fn validate_mutations(&self, errors: &mut Vec<String>) {
        for (name, targets) in &self.mutation_paths {
            for target in targets {
                if target.is_empty() || target == name {
                    errors.push(format!("trait '{}' has an invalid mutation path '{}'", name, target));
                } else if self.require_registered_targets && !self.has_trait(target) {
                    errors.push(format!("mutation target '{}' of '{}' is not a known trait", target, name));
                }
            }
        }
    }
}

impl StateComponent for TraitState {
    type Change = TraitChange;

    const NAME: &'static str = "trait";

    fn check_change(&self, change: &TraitChange) -> Vec<String> {
        let mut reasons = Vec::new();
        match change {
            TraitChange::AddTrait { definition } => {
                self.check_insert(definition, &mut reasons);
                self.check_conflicts(definition, &mut reasons);
            }
            // 恢复的是之前合法共存的状态，不再做冲突检查
            TraitChange::RestoreTrait {
                definition,
                index,
                mutation_sources,
                ..
            } => {
                self.check_insert(definition, &mut reasons);
                if *index > self.traits.len() {
                    reasons.push(format!("trait index {} is out of range", index));
                }
                for source in mutation_sources {
                    self.check_exists(&source.name, &mut reasons);
                }
            }
            TraitChange::RemoveTrait { name } => {
                self.check_exists(name, &mut reasons);
            }
            TraitChange::AddManifestation { name, manifestation }
            | TraitChange::RestoreManifestation { name, manifestation, .. } => {
                if self.check_exists(name, &mut reasons) {
                    if manifestation.is_empty() {
                        reasons.push("manifestation must not be empty".to_string());
                    } else if self.manifestations.get(name).map_or(false, |m| m.contains(manifestation)) {
                        reasons.push(format!("trait '{}' already manifests '{}'", name, manifestation));
                    }
                }
            }
            TraitChange::RemoveManifestation { name, manifestation } => {
                if self.check_exists(name, &mut reasons)
                    && !self.manifestations.get(name).map_or(false, |m| m.contains(manifestation))
                {
                    reasons.push(format!("trait '{}' does not manifest '{}'", name, manifestation));
                }
            }
            TraitChange::SetIncompatible { first, second }
            | TraitChange::RestoreIncompatibility { first, second, .. } => {
                if first.is_empty() || second.is_empty() {
                    reasons.push("incompatibility requires two trait names".to_string());
                } else if first == second {
                    reasons.push(format!("trait '{}' cannot be incompatible with itself", first));
                }
            }
            TraitChange::RemoveIncompatibility { first, second } => {
                if !self.are_declared_incompatible(first, second) {
                    reasons.push(format!("'{}' and '{}' are not incompatible", first, second));
                }
            }
            TraitChange::SetBaseStrength { name, strength } => {
                if self.check_exists(name, &mut reasons) {
                    self.check_strength(name, *strength, &mut reasons);
                }
            }
            TraitChange::ModifyBaseStrength { name, delta } => {
                if let Some(current) = self.base_strength(name) {
                    self.check_strength(name, current + delta, &mut reasons);
                } else {
                    self.check_exists(name, &mut reasons);
                }
            }
            TraitChange::SetThemeResonance { name, theme, resonance }
            | TraitChange::RestoreThemeResonance { name, theme, resonance, .. } => {
                if self.check_exists(name, &mut reasons) {
                    if theme.is_empty() {
                        reasons.push("theme must not be empty".to_string());
                    } else if !self.resonance_bounds.contains(*resonance) {
                        reasons.push(format!(
                            "resonance {} is outside {}",
                            resonance,
                            self.resonance_bounds.describe()
                        ));
                    }
                }
            }
            TraitChange::ClearThemeResonance { name, theme } => {
                if self.check_exists(name, &mut reasons)
                    && !self.theme_resonance.get(name).map_or(false, |t| t.contains_key(theme))
                {
                    reasons.push(format!("trait '{}' has no resonance for theme '{}'", name, theme));
                }
            }
            TraitChange::AddMutationPath { name, target } | TraitChange::RestoreMutationPath { name, target, .. } => {
                self.check_new_mutation_path(name, target, &mut reasons);
            }
            TraitChange::RemoveMutationPath { name, target } => {
                if self.check_exists(name, &mut reasons)
                    && !self.mutation_paths.get(name).map_or(false, |t| t.contains(target))
                {
                    reasons.push(format!("mutation path '{}' -> '{}' does not exist", name, target));
                }
            }
        }
        reasons
    }

    fn apply_change(&mut self, change: &TraitChange) -> bool {
        if !self.can_apply_change(change) {
            return false;
        }

        match change {
            TraitChange::AddTrait { definition } => {
                let index = self.traits.len();
                self.insert_at(index, definition.clone());
            }
            TraitChange::RestoreTrait {
                definition,
                index,
                mutation_sources,
                incompatible_partners,
            } => {
                self.restore_trait(definition, *index, mutation_sources, incompatible_partners);
            }
            TraitChange::RemoveTrait { name } => {
                self.remove_trait(name);
            }
            TraitChange::AddManifestation { name, manifestation } => {
                self.add_base_manifestation(name, manifestation);
            }
            TraitChange::RemoveManifestation { name, manifestation } => {
                self.remove_base_manifestation(name, manifestation);
            }
            TraitChange::RestoreManifestation { name, manifestation, index } => {
                if let Some(set) = self.manifestations.get_mut(name) {
                    insert_at_position(set, manifestation.clone(), *index);
                }
            }
            TraitChange::SetIncompatible { first, second } => {
                self.set_incompatible(first, second);
            }
            TraitChange::RemoveIncompatibility { first, second } => {
                self.remove_incompatibility(first, second);
            }
            TraitChange::RestoreIncompatibility {
                first,
                second,
                first_index,
                second_index,
            } => {
                self.restore_incompatibility(first, second, *first_index, *second_index);
            }
            TraitChange::SetBaseStrength { name, strength } => {
                self.set_base_strength(name, *strength);
            }
            TraitChange::ModifyBaseStrength { name, delta } => {
                self.modify_base_strength(name, *delta);
            }
            TraitChange::SetThemeResonance { name, theme, resonance } => {
                self.set_theme_resonance(name, theme, *resonance);
            }
            TraitChange::ClearThemeResonance { name, theme } => {
                self.clear_theme_resonance(name, theme);
            }
            TraitChange::RestoreThemeResonance {
                name,
                theme,
                resonance,
                index,
            } => {
                if let Some(themes) = self.theme_resonance.get_mut(name) {
                    insert_entry_at_position(themes, theme.clone(), *resonance, *index);
                }
            }
            TraitChange::AddMutationPath { name, target } => {
                self.add_mutation_path(name, target);
            }
            TraitChange::RemoveMutationPath { name, target } => {
                self.remove_mutation_path(name, target);
            }
            TraitChange::RestoreMutationPath { name, target, index } => {
                if let Some(targets) = self.mutation_paths.get_mut(name) {
                    insert_at_position(targets, target.clone(), *index);
                }
            }
        }

        debug!("特性状态变更: {:?}", change);
        true
    }

    fn generate_undo(&self, change: &TraitChange) -> Option<TraitChange> {
        let undo = match change {
            TraitChange::AddTrait { definition } | TraitChange::RestoreTrait { definition, .. } => {
                TraitChange::RemoveTrait {
                    name: definition.name.clone(),
                }
            }
            TraitChange::RemoveTrait { name } => TraitChange::RestoreTrait {
                definition: self.get_trait(name)?,
                index: self.index_of(name)?,
                mutation_sources: self.mutation_links(name),
                incompatible_partners: self.incompatibility_links(name),
            },
            TraitChange::AddManifestation { name, manifestation }
            | TraitChange::RestoreManifestation { name, manifestation, .. } => TraitChange::RemoveManifestation {
                name: name.clone(),
                manifestation: manifestation.clone(),
            },
            TraitChange::RemoveManifestation { name, manifestation } => TraitChange::RestoreManifestation {
                name: name.clone(),
                manifestation: manifestation.clone(),
                index: self.manifestations.get(name)?.get_index_of(manifestation.as_str())?,
            },
            TraitChange::SetIncompatible { first, second }
            | TraitChange::RestoreIncompatibility { first, second, .. } => {
                if self.are_declared_incompatible(first, second) {
                    self.incompatibility_position(first, second)?
                } else {
                    TraitChange::RemoveIncompatibility {
                        first: first.clone(),
                        second: second.clone(),
                    }
                }
            }
            TraitChange::RemoveIncompatibility { first, second } => self.incompatibility_position(first, second)?,
            TraitChange::SetBaseStrength { name, .. } | TraitChange::ModifyBaseStrength { name, .. } => {
                TraitChange::SetBaseStrength {
                    name: name.clone(),
                    strength: self.base_strength(name)?,
                }
            }
            TraitChange::SetThemeResonance { name, theme, .. }
            | TraitChange::RestoreThemeResonance { name, theme, .. } => {
                match self.theme_resonance.get(name)?.get_full(theme.as_str()) {
                    Some((index, _, previous)) => TraitChange::RestoreThemeResonance {
                        name: name.clone(),
                        theme: theme.clone(),
                        resonance: *previous,
                        index,
                    },
                    None => TraitChange::ClearThemeResonance {
                        name: name.clone(),
                        theme: theme.clone(),
                    },
                }
            }
            TraitChange::ClearThemeResonance { name, theme } => {
                let (index, _, resonance) = self.theme_resonance.get(name)?.get_full(theme.as_str())?;
                TraitChange::RestoreThemeResonance {
                    name: name.clone(),
                    theme: theme.clone(),
                    resonance: *resonance,
                    index,
                }
            }
            TraitChange::AddMutationPath { name, target }
            | TraitChange::RestoreMutationPath { name, target, .. } => TraitChange::RemoveMutationPath {
                name: name.clone(),
                target: target.clone(),
            },
            TraitChange::RemoveMutationPath { name, target } => TraitChange::RestoreMutationPath {
                name: name.clone(),
                target: target.clone(),
                index: self.mutation_paths.get(name)?.get_index_of(target.as_str())?,
            },
        };
        Some(undo)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.validate_traits(&mut errors);
        self.validate_compatibility(&mut errors);
        self.validate_strengths(&mut errors);
        self.validate_mutations(&mut errors);
        errors
    }
}

impl TryFrom<TraitDocument> for TraitState {
    type Error = StateError;

    fn try_from(document: TraitDocument) -> Result<Self, Self::Error> {
        let mut state = TraitState::new();
        for definition in document.traits {
            if definition.name.is_empty() {
                return Err(StateError::InvalidDocument("trait with empty name".to_string()));
            }
            if state.has_trait(&definition.name) {
                return Err(StateError::InvalidDocument(format!("duplicate trait '{}'", definition.name)));
            }
            let index = state.traits.len();
            state.insert_at(index, definition);
        }

        for (name, partners) in document.incompatibilities {
            if name.is_empty() || partners.iter().any(|p| p.is_empty() || *p == name) {
                return Err(StateError::InvalidDocument(format!(
                    "invalid incompatibility entry for '{}'",
                    name
                )));
            }
            for (position, partner) in partners.into_iter().enumerate() {
                state.link(&name, &partner);
                if let Some(set) = state.incompatibilities.get_mut(&name) {
                    insert_at_position(set, partner, position);
                }
            }
        }
        Ok(state)
    }
}

impl Serialize for TraitState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TraitDocument {
            traits: self.all_traits(),
            incompatibilities: self.detached_incompatibilities(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TraitState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = TraitDocument::deserialize(deserializer)?;
        TraitState::try_from(document).map_err(serde::de::Error::custom)
    }
}
