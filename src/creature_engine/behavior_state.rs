/*
 * Creature Core - Behavior State
 * 开发心理过程:
 * 1. 智力、攻击性、社会结构三个分类属性
 * 2. 行为标签是非空字符串集合，主题影响是主题到数值的映射
 * 3. 变更只拒绝结构上不成立的情况，比如移除不存在的标签
 */

use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};

use super::changes::{insert_at_position, insert_entry_at_position, BehaviorChange, StateComponent};
use super::enums::{Aggression, Intelligence, SocialStructure};
use crate::core::config::{Bounds, NumericLimits};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorState {
    intelligence: Intelligence,
    aggression: Aggression,
    social_structure: SocialStructure,
    base_behaviors: IndexSet<String>,
    theme_influences: IndexMap<String, f32>,
    #[serde(skip)]
    influence_bounds: Bounds,
}

impl BehaviorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: &NumericLimits) -> Self {
        Self {
            influence_bounds: limits.theme_influence,
            ..Self::default()
        }
    }

    pub fn configure(&mut self, limits: &NumericLimits) {
        self.influence_bounds = limits.theme_influence;
    }

    pub fn intelligence(&self) -> Intelligence {
        self.intelligence
    }

    pub fn set_intelligence(&mut self, intelligence: Intelligence) {
        self.intelligence = intelligence;
    }

    pub fn aggression(&self) -> Aggression {
        self.aggression
    }

    pub fn set_aggression(&mut self, aggression: Aggression) {
        self.aggression = aggression;
    }

    pub fn social_structure(&self) -> SocialStructure {
        self.social_structure
    }

    pub fn set_social_structure(&mut self, social_structure: SocialStructure) {
        self.social_structure = social_structure;
    }

    // 行为标签
    pub fn base_behaviors(&self) -> &IndexSet<String> {
        &self.base_behaviors
    }

    pub fn add_base_behavior(&mut self, behavior: &str) -> bool {
        if behavior.is_empty() {
            return false;
        }
        self.base_behaviors.insert(behavior.to_string())
    }

    pub fn remove_base_behavior(&mut self, behavior: &str) -> bool {
        self.base_behaviors.shift_remove(behavior)
    }

    pub fn has_base_behavior(&self, behavior: &str) -> bool {
        self.base_behaviors.contains(behavior)
    }

    // 主题影响，未知主题返回0
    pub fn theme_influence(&self, theme: &str) -> f32 {
        self.theme_influences.get(theme).copied().unwrap_or(0.0)
    }

    pub fn theme_influences(&self) -> &IndexMap<String, f32> {
        &self.theme_influences
    }

    pub fn set_theme_influence(&mut self, theme: &str, influence: f32) -> bool {
        if theme.is_empty() || !self.influence_bounds.contains(influence) {
            return false;
        }
        self.theme_influences.insert(theme.to_string(), influence);
        true
    }

    pub fn clear_theme_influence(&mut self, theme: &str) -> bool {
        self.theme_influences.shift_remove(theme).is_some()
    }
}

impl StateComponent for BehaviorState {
    type Change = BehaviorChange;

    const NAME: &'static str = "behavior";

    fn check_change(&self, change: &BehaviorChange) -> Vec<String> {
        let mut reasons = Vec::new();
        match change {
            BehaviorChange::SetIntelligence { .. }
            | BehaviorChange::SetAggression { .. }
            | BehaviorChange::SetSocialStructure { .. } => {}
            BehaviorChange::AddBehavior { behavior } => {
                if behavior.is_empty() {
                    reasons.push("behavior tag must not be empty".to_string());
                } else if self.has_base_behavior(behavior) {
                    reasons.push(format!("behavior '{}' is already present", behavior));
                }
            }
            BehaviorChange::RemoveBehavior { behavior } => {
                if !self.has_base_behavior(behavior) {
                    reasons.push(format!("behavior '{}' is not present", behavior));
                }
            }
            BehaviorChange::RestoreBehavior { behavior, .. } => {
                if behavior.is_empty() {
                    reasons.push("behavior tag must not be empty".to_string());
                } else if self.has_base_behavior(behavior) {
                    reasons.push(format!("behavior '{}' is already present", behavior));
                }
            }
            BehaviorChange::SetThemeInfluence { theme, influence }
            | BehaviorChange::RestoreThemeInfluence { theme, influence, .. } => {
                if theme.is_empty() {
                    reasons.push("theme must not be empty".to_string());
                }
                if !self.influence_bounds.contains(*influence) {
                    reasons.push(format!(
                        "influence {} for theme '{}' is outside {}",
                        influence,
                        theme,
                        self.influence_bounds.describe()
                    ));
                }
            }
            BehaviorChange::ClearThemeInfluence { theme } => {
                if !self.theme_influences.contains_key(theme) {
                    reasons.push(format!("theme '{}' has no influence to clear", theme));
                }
            }
        }
        reasons
    }

    fn apply_change(&mut self, change: &BehaviorChange) -> bool {
        if !self.can_apply_change(change) {
            return false;
        }

        match change {
            BehaviorChange::SetIntelligence { intelligence } => self.set_intelligence(*intelligence),
            BehaviorChange::SetAggression { aggression } => self.set_aggression(*aggression),
            BehaviorChange::SetSocialStructure { social_structure } => {
                self.set_social_structure(*social_structure)
            }
            BehaviorChange::AddBehavior { behavior } => {
                self.add_base_behavior(behavior);
            }
            BehaviorChange::RemoveBehavior { behavior } => {
                self.remove_base_behavior(behavior);
            }
            BehaviorChange::SetThemeInfluence { theme, influence } => {
                self.set_theme_influence(theme, *influence);
            }
            BehaviorChange::ClearThemeInfluence { theme } => {
                self.clear_theme_influence(theme);
            }
            BehaviorChange::RestoreBehavior { behavior, index } => {
                insert_at_position(&mut self.base_behaviors, behavior.clone(), *index);
            }
            BehaviorChange::RestoreThemeInfluence { theme, influence, index } => {
                insert_entry_at_position(&mut self.theme_influences, theme.clone(), *influence, *index);
            }
        }

        debug!("行为状态变更: {:?}", change);
        true
    }

    fn generate_undo(&self, change: &BehaviorChange) -> Option<BehaviorChange> {
        let undo = match change {
            BehaviorChange::SetIntelligence { .. } => BehaviorChange::SetIntelligence {
                intelligence: self.intelligence,
            },
            BehaviorChange::SetAggression { .. } => BehaviorChange::SetAggression {
                aggression: self.aggression,
            },
            BehaviorChange::SetSocialStructure { .. } => BehaviorChange::SetSocialStructure {
                social_structure: self.social_structure,
            },
            BehaviorChange::AddBehavior { behavior } => BehaviorChange::RemoveBehavior {
                behavior: behavior.clone(),
            },
            BehaviorChange::RemoveBehavior { behavior } => BehaviorChange::RestoreBehavior {
                behavior: behavior.clone(),
                index: self.base_behaviors.get_index_of(behavior.as_str())?,
            },
            BehaviorChange::RestoreBehavior { behavior, .. } => BehaviorChange::RemoveBehavior {
                behavior: behavior.clone(),
            },
            BehaviorChange::SetThemeInfluence { theme, .. } | BehaviorChange::RestoreThemeInfluence { theme, .. } => {
                match self.theme_influences.get_full(theme.as_str()) {
                    Some((index, _, previous)) => BehaviorChange::RestoreThemeInfluence {
                        theme: theme.clone(),
                        influence: *previous,
                        index,
                    },
                    None => BehaviorChange::ClearThemeInfluence { theme: theme.clone() },
                }
            }
            BehaviorChange::ClearThemeInfluence { theme } => {
                let (index, _, influence) = self.theme_influences.get_full(theme.as_str())?;
                BehaviorChange::RestoreThemeInfluence {
                    theme: theme.clone(),
                    influence: *influence,
                    index,
                }
            }
        };
        Some(undo)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.base_behaviors.iter().any(|b| b.is_empty()) {
            errors.push("behavior tags must not be empty".to_string());
        }
        for (theme, influence) in &self.theme_influences {
            if theme.is_empty() {
                errors.push("theme influence recorded for an empty theme".to_string());
            } else if !self.influence_bounds.contains(*influence) {
                errors.push(format!(
                    "influence {} for theme '{}' is outside {}",
                    influence,
                    theme,
                    self.influence_bounds.describe()
                ));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = BehaviorState::new();
        assert_eq!(state.intelligence(), Intelligence::Animal);
        assert_eq!(state.aggression(), Aggression::Defensive);
        assert_eq!(state.social_structure(), SocialStructure::Solitary);
        assert_eq!(state.theme_influence("Shadow"), 0.0);
        assert!(state.is_valid());
    }

    #[test]
    fn test_behavior_tags() {
        let mut state = BehaviorState::new();
        assert!(state.add_base_behavior("Nocturnal"));
        assert!(!state.add_base_behavior("Nocturnal"));
        assert!(!state.add_base_behavior(""));
        assert!(state.has_base_behavior("Nocturnal"));
        assert!(!state.has_base_behavior("nocturnal"));
        assert!(state.remove_base_behavior("Nocturnal"));
        assert!(!state.remove_base_behavior("Nocturnal"));
    }

    #[test]
    fn test_structural_rejections() {
        let state = BehaviorState::new();
        let remove = BehaviorChange::RemoveBehavior { behavior: "Pack Hunter".to_string() };
        assert!(!state.can_apply_change(&remove));
        let clear = BehaviorChange::ClearThemeInfluence { theme: "Fire".to_string() };
        assert!(!state.can_apply_change(&clear));
        let nan = BehaviorChange::SetThemeInfluence { theme: "Fire".to_string(), influence: f32::NAN };
        assert!(!state.can_apply_change(&nan));
    }

    #[test]
    fn test_influence_bounds_from_config() {
        let limits = NumericLimits {
            theme_influence: Bounds::between(-1.0, 1.0),
            ..NumericLimits::default()
        };
        let mut state = BehaviorState::with_limits(&limits);
        assert!(!state.set_theme_influence("Fire", 2.0));
        assert!(state.set_theme_influence("Fire", -0.5));

        let mut open = BehaviorState::new();
        assert!(open.set_theme_influence("Fire", 250.0));
    }

    #[test]
    fn test_undo_restores_previous_values() {
        let mut state = BehaviorState::new();
        state.set_theme_influence("Shadow", 0.3);
        let before = state.clone();

        let changes = vec![
            BehaviorChange::SetIntelligence { intelligence: Intelligence::Sapient },
            BehaviorChange::SetSocialStructure { social_structure: SocialStructure::Hive },
            BehaviorChange::AddBehavior { behavior: "Hoarding".to_string() },
            BehaviorChange::SetThemeInfluence { theme: "Shadow".to_string(), influence: 0.9 },
            BehaviorChange::SetThemeInfluence { theme: "Light".to_string(), influence: 0.1 },
            BehaviorChange::ClearThemeInfluence { theme: "Shadow".to_string() },
        ];

        let mut undos = Vec::new();
        for change in &changes {
            undos.push(state.generate_undo(change).unwrap());
            assert!(state.apply_change(change));
        }
        assert_eq!(state.intelligence(), Intelligence::Sapient);
        assert_eq!(state.theme_influence("Shadow"), 0.0);

        for undo in undos.iter().rev() {
            assert!(state.apply_change(undo));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_undo_keeps_document_order() {
        let mut state = BehaviorState::new();
        state.add_base_behavior("Hoard");
        state.add_base_behavior("Roost");
        state.set_theme_influence("Shadow", 0.3);
        state.set_theme_influence("Frost", 0.6);
        // 直接序列化成字符串，映射的键顺序也参与比较
        let before = serde_json::to_string(&state).unwrap();

        let changes = vec![
            BehaviorChange::RemoveBehavior { behavior: "Hoard".to_string() },
            BehaviorChange::ClearThemeInfluence { theme: "Shadow".to_string() },
        ];
        let mut undos = Vec::new();
        for change in &changes {
            undos.push(state.generate_undo(change).unwrap());
            assert!(state.apply_change(change));
        }
        for undo in undos.iter().rev() {
            assert!(state.apply_change(undo));
        }

        let order: Vec<_> = state.base_behaviors().iter().cloned().collect();
        assert_eq!(order, vec!["Hoard", "Roost"]);
        assert_eq!(serde_json::to_string(&state).unwrap(), before);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut state = BehaviorState::new();
        state.add_base_behavior("Territorial Marking");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["social_structure"], "Solitary");
        assert_eq!(json["base_behaviors"][0], "Territorial Marking");
        assert!(json.get("influence_bounds").is_none());

        let restored: BehaviorState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }
}
