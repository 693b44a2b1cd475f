/*
 * Creature Core - Physical State
 * 开发心理过程:
 * 1. 体型、形态、一个主要移动方式加若干次要移动方式
 * 2. 次要移动方式不可重复，也不可与主要方式相同
 * 3. 基础特征是区分大小写的非空字符串集合
 * 4. 任何变更都不能让生物失去唯一的移动方式
 */

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use super::changes::{insert_at_position, PhysicalChange, StateComponent};
use super::enums::{BodyShape, Locomotion, Size};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalState {
    size: Size,
    shape: BodyShape,
    primary_locomotion: Locomotion,
    secondary_locomotion: Vec<Locomotion>,
    base_features: IndexSet<String>,
}

impl PhysicalState {
    pub fn new() -> Self {
        Self::default()
    }

    // 核心属性
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    pub fn shape(&self) -> BodyShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: BodyShape) {
        self.shape = shape;
    }

    // 移动方式管理
    pub fn primary_locomotion(&self) -> Locomotion {
        self.primary_locomotion
    }

    // 若新主要方式原本在次要列表中则一并移出，保持互斥
    pub fn set_primary_locomotion(&mut self, mode: Locomotion) {
        self.secondary_locomotion.retain(|m| *m != mode);
        self.primary_locomotion = mode;
    }

    pub fn secondary_locomotion(&self) -> &[Locomotion] {
        &self.secondary_locomotion
    }

    pub fn has_locomotion(&self, mode: Locomotion) -> bool {
        self.primary_locomotion == mode || self.secondary_locomotion.contains(&mode)
    }

    pub fn locomotion_count(&self) -> usize {
        1 + self.secondary_locomotion.len()
    }

    pub fn add_secondary_locomotion(&mut self, mode: Locomotion) -> bool {
        if self.has_locomotion(mode) {
            return false;
        }
        self.secondary_locomotion.push(mode);
        true
    }

    pub fn remove_secondary_locomotion(&mut self, mode: Locomotion) -> bool {
        match self.secondary_position(mode) {
            Some(index) => {
                self.secondary_locomotion.remove(index);
                true
            }
            None => false,
        }
    }

    fn secondary_position(&self, mode: Locomotion) -> Option<usize> {
        self.secondary_locomotion.iter().position(|m| *m == mode)
    }

    // 基础特征管理
    pub fn base_features(&self) -> &IndexSet<String> {
        &self.base_features
    }

    pub fn add_base_feature(&mut self, feature: &str) -> bool {
        if feature.is_empty() {
            return false;
        }
        self.base_features.insert(feature.to_string())
    }

    pub fn remove_base_feature(&mut self, feature: &str) -> bool {
        self.base_features.shift_remove(feature)
    }

    pub fn has_base_feature(&self, feature: &str) -> bool {
        self.base_features.contains(feature)
    }

    // 校验细节
    fn validate_locomotion(&self, errors: &mut Vec<String>) {
        for (i, mode) in self.secondary_locomotion.iter().enumerate() {
            if *mode == self.primary_locomotion {
                errors.push(format!("secondary locomotion {} duplicates the primary locomotion", mode));
            }
            if self.secondary_locomotion[..i].contains(mode) {
                errors.push(format!("secondary locomotion {} is listed more than once", mode));
            }
        }
    }

    fn validate_features(&self, errors: &mut Vec<String>) {
        if self.base_features.iter().any(|f| f.is_empty()) {
            errors.push("base feature names must not be empty".to_string());
        }
    }
}

impl StateComponent for PhysicalState {
    type Change = PhysicalChange;

    const NAME: &'static str = "physical";

    fn check_change(&self, change: &PhysicalChange) -> Vec<String> {
        let mut reasons = Vec::new();
        match change {
            PhysicalChange::SetSize { .. } | PhysicalChange::SetShape { .. } => {}
            PhysicalChange::SetPrimaryLocomotion { mode } => {
                if self.secondary_locomotion.contains(mode) {
                    reasons.push(format!("{} is already a secondary locomotion; promote it instead", mode));
                }
            }
            PhysicalChange::AddSecondaryLocomotion { mode } => {
                if self.has_locomotion(*mode) {
                    reasons.push(format!("locomotion {} is already present", mode));
                }
            }
            PhysicalChange::RemoveSecondaryLocomotion { mode } => {
                if self.secondary_position(*mode).is_none() {
                    reasons.push(format!("{} is not a secondary locomotion", mode));
                }
            }
            PhysicalChange::RestoreSecondaryLocomotion { mode, index } => {
                if self.has_locomotion(*mode) {
                    reasons.push(format!("locomotion {} is already present", mode));
                }
                if *index > self.secondary_locomotion.len() {
                    reasons.push(format!("secondary locomotion index {} is out of range", index));
                }
            }
            PhysicalChange::PromoteSecondaryLocomotion { mode } => {
                if self.secondary_position(*mode).is_none() {
                    reasons.push(format!("{} is not a secondary locomotion", mode));
                }
            }
            PhysicalChange::DropPrimaryLocomotion => {
                if self.secondary_locomotion.is_empty() {
                    reasons.push(format!(
                        "cannot drop {}: it is the only locomotion mode",
                        self.primary_locomotion
                    ));
                }
            }
            PhysicalChange::RestorePrimaryLocomotion { mode } => {
                if self.has_locomotion(*mode) {
                    reasons.push(format!("locomotion {} is already present", mode));
                }
            }
            PhysicalChange::AddFeature { feature } => {
                if feature.is_empty() {
                    reasons.push("feature name must not be empty".to_string());
                } else if self.has_base_feature(feature) {
                    reasons.push(format!("feature '{}' is already present", feature));
                }
            }
            PhysicalChange::RemoveFeature { feature } => {
                if !self.has_base_feature(feature) {
                    reasons.push(format!("feature '{}' is not present", feature));
                }
            }
            PhysicalChange::RestoreFeature { feature, .. } => {
                if feature.is_empty() {
                    reasons.push("feature name must not be empty".to_string());
                } else if self.has_base_feature(feature) {
                    reasons.push(format!("feature '{}' is already present", feature));
                }
            }
        }
        reasons
    }

    fn apply_change(&mut self, change: &PhysicalChange) -> bool {
        if !self.can_apply_change(change) {
            return false;
        }

        match change {
            PhysicalChange::SetSize { size } => self.size = *size,
            PhysicalChange::SetShape { shape } => self.shape = *shape,
            PhysicalChange::SetPrimaryLocomotion { mode } => self.primary_locomotion = *mode,
            PhysicalChange::AddSecondaryLocomotion { mode } => self.secondary_locomotion.push(*mode),
            PhysicalChange::RemoveSecondaryLocomotion { mode } => {
                self.remove_secondary_locomotion(*mode);
            }
            PhysicalChange::RestoreSecondaryLocomotion { mode, index } => {
                self.secondary_locomotion.insert(*index, *mode);
            }
            PhysicalChange::PromoteSecondaryLocomotion { mode } => {
                if let Some(index) = self.secondary_position(*mode) {
                    self.secondary_locomotion[index] = self.primary_locomotion;
                    self.primary_locomotion = *mode;
                }
            }
            PhysicalChange::DropPrimaryLocomotion => {
                let promoted = self.secondary_locomotion.remove(0);
                self.primary_locomotion = promoted;
            }
            PhysicalChange::RestorePrimaryLocomotion { mode } => {
                self.secondary_locomotion.insert(0, self.primary_locomotion);
                self.primary_locomotion = *mode;
            }
            PhysicalChange::AddFeature { feature } => {
                self.base_features.insert(feature.clone());
            }
            PhysicalChange::RemoveFeature { feature } => {
                self.base_features.shift_remove(feature.as_str());
            }
            PhysicalChange::RestoreFeature { feature, index } => {
                insert_at_position(&mut self.base_features, feature.clone(), *index);
            }
        }

        debug!("物理状态变更: {:?}", change);
        true
    }

    fn generate_undo(&self, change: &PhysicalChange) -> Option<PhysicalChange> {
        let undo = match change {
            PhysicalChange::SetSize { .. } => PhysicalChange::SetSize { size: self.size },
            PhysicalChange::SetShape { .. } => PhysicalChange::SetShape { shape: self.shape },
            PhysicalChange::SetPrimaryLocomotion { .. } => PhysicalChange::SetPrimaryLocomotion {
                mode: self.primary_locomotion,
            },
            PhysicalChange::AddSecondaryLocomotion { mode } => {
                PhysicalChange::RemoveSecondaryLocomotion { mode: *mode }
            }
            PhysicalChange::RemoveSecondaryLocomotion { mode } => PhysicalChange::RestoreSecondaryLocomotion {
                mode: *mode,
                index: self.secondary_position(*mode)?,
            },
            PhysicalChange::RestoreSecondaryLocomotion { mode, .. } => {
                PhysicalChange::RemoveSecondaryLocomotion { mode: *mode }
            }
            // 互换操作的逆就是把原主要方式换回来
            PhysicalChange::PromoteSecondaryLocomotion { .. } => PhysicalChange::PromoteSecondaryLocomotion {
                mode: self.primary_locomotion,
            },
            PhysicalChange::DropPrimaryLocomotion => PhysicalChange::RestorePrimaryLocomotion {
                mode: self.primary_locomotion,
            },
            PhysicalChange::RestorePrimaryLocomotion { .. } => PhysicalChange::DropPrimaryLocomotion,
            PhysicalChange::AddFeature { feature } => PhysicalChange::RemoveFeature {
                feature: feature.clone(),
            },
            PhysicalChange::RemoveFeature { feature } => PhysicalChange::RestoreFeature {
                feature: feature.clone(),
                index: self.base_features.get_index_of(feature.as_str())?,
            },
            PhysicalChange::RestoreFeature { feature, .. } => PhysicalChange::RemoveFeature {
                feature: feature.clone(),
            },
        };
        Some(undo)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.validate_locomotion(&mut errors);
        self.validate_features(&mut errors);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_with_undo(state: &mut PhysicalState, change: PhysicalChange) -> PhysicalChange {
        let undo = state.generate_undo(&change).unwrap();
        assert!(state.apply_change(&change), "change rejected: {:?}", state.check_change(&change));
        undo
    }

    #[test]
    fn test_default_state() {
        let state = PhysicalState::new();
        assert_eq!(state.size(), Size::Medium);
        assert_eq!(state.shape(), BodyShape::Humanoid);
        assert_eq!(state.primary_locomotion(), Locomotion::Walker);
        assert_eq!(state.locomotion_count(), 1);
        assert!(state.is_valid());
    }

    #[test]
    fn test_secondary_locomotion_rejects_duplicates() {
        let mut state = PhysicalState::new();
        assert!(state.add_secondary_locomotion(Locomotion::Flyer));
        assert!(!state.add_secondary_locomotion(Locomotion::Flyer));
        assert!(!state.add_secondary_locomotion(Locomotion::Walker));
        assert_eq!(state.secondary_locomotion(), &[Locomotion::Flyer]);

        assert!(state.remove_secondary_locomotion(Locomotion::Flyer));
        assert!(!state.remove_secondary_locomotion(Locomotion::Flyer));
    }

    #[test]
    fn test_set_primary_keeps_modes_disjoint() {
        let mut state = PhysicalState::new();
        state.add_secondary_locomotion(Locomotion::Swimmer);
        state.set_primary_locomotion(Locomotion::Swimmer);
        assert_eq!(state.primary_locomotion(), Locomotion::Swimmer);
        assert!(state.secondary_locomotion().is_empty());
        assert!(state.is_valid());
    }

    #[test]
    fn test_features() {
        let mut state = PhysicalState::new();
        assert!(state.add_base_feature("Horns"));
        assert!(!state.add_base_feature("Horns"));
        assert!(state.add_base_feature("horns"));
        assert!(!state.add_base_feature(""));
        assert!(state.has_base_feature("Horns"));
        assert!(state.remove_base_feature("Horns"));
        assert!(!state.remove_base_feature("Horns"));
    }

    #[test]
    fn test_cannot_drop_only_locomotion() {
        let mut state = PhysicalState::new();
        let change = PhysicalChange::DropPrimaryLocomotion;
        assert!(!state.can_apply_change(&change));
        assert!(!state.apply_change(&change));
        assert_eq!(state.primary_locomotion(), Locomotion::Walker);
    }

    #[test]
    fn test_drop_primary_round_trip() {
        let mut state = PhysicalState::new();
        state.add_secondary_locomotion(Locomotion::Flyer);
        state.add_secondary_locomotion(Locomotion::Swimmer);
        let before = state.clone();

        let undo = apply_with_undo(&mut state, PhysicalChange::DropPrimaryLocomotion);
        assert_eq!(state.primary_locomotion(), Locomotion::Flyer);
        assert_eq!(state.secondary_locomotion(), &[Locomotion::Swimmer]);

        assert!(state.apply_change(&undo));
        assert_eq!(state, before);
    }

    #[test]
    fn test_promote_round_trip() {
        let mut state = PhysicalState::new();
        state.add_secondary_locomotion(Locomotion::Crawler);
        state.add_secondary_locomotion(Locomotion::Burrower);
        let before = state.clone();

        let undo = apply_with_undo(
            &mut state,
            PhysicalChange::PromoteSecondaryLocomotion { mode: Locomotion::Burrower },
        );
        assert_eq!(state.primary_locomotion(), Locomotion::Burrower);
        assert_eq!(state.secondary_locomotion(), &[Locomotion::Crawler, Locomotion::Walker]);
        assert!(state.is_valid());

        assert!(state.apply_change(&undo));
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_secondary_restores_position() {
        let mut state = PhysicalState::new();
        state.add_secondary_locomotion(Locomotion::Flyer);
        state.add_secondary_locomotion(Locomotion::Floater);
        state.add_secondary_locomotion(Locomotion::Phaser);
        let before = state.clone();

        let undo = apply_with_undo(
            &mut state,
            PhysicalChange::RemoveSecondaryLocomotion { mode: Locomotion::Floater },
        );
        assert_eq!(
            undo,
            PhysicalChange::RestoreSecondaryLocomotion { mode: Locomotion::Floater, index: 1 }
        );
        assert!(state.apply_change(&undo));
        assert_eq!(state, before);
    }

    #[test]
    fn test_scalar_undo_restores_previous_value() {
        let mut state = PhysicalState::new();
        let undo = apply_with_undo(&mut state, PhysicalChange::SetSize { size: Size::Huge });
        assert_eq!(state.size(), Size::Huge);
        assert!(state.apply_change(&undo));
        assert_eq!(state.size(), Size::Medium);

        let undo = apply_with_undo(&mut state, PhysicalChange::SetShape { shape: BodyShape::Draconic });
        assert!(state.apply_change(&undo));
        assert_eq!(state.shape(), BodyShape::Humanoid);
    }

    #[test]
    fn test_set_primary_to_secondary_mode_is_rejected() {
        let mut state = PhysicalState::new();
        state.add_secondary_locomotion(Locomotion::Flyer);
        let change = PhysicalChange::SetPrimaryLocomotion { mode: Locomotion::Flyer };
        assert_eq!(state.check_change(&change).len(), 1);
    }

    #[test]
    fn test_feature_change_checks() {
        let mut state = PhysicalState::new();
        assert!(!state.can_apply_change(&PhysicalChange::AddFeature { feature: String::new() }));
        assert!(!state.can_apply_change(&PhysicalChange::RemoveFeature { feature: "Tail".to_string() }));

        let undo = apply_with_undo(&mut state, PhysicalChange::AddFeature { feature: "Tail".to_string() });
        assert!(!state.can_apply_change(&PhysicalChange::AddFeature { feature: "Tail".to_string() }));
        assert!(state.apply_change(&undo));
        assert!(state.base_features().is_empty());
    }

    #[test]
    fn test_remove_feature_restores_position() {
        let mut state = PhysicalState::new();
        state.add_base_feature("Horns");
        state.add_base_feature("Tail");
        state.add_base_feature("Claws");
        let before = serde_json::to_value(&state).unwrap();

        let undo = apply_with_undo(&mut state, PhysicalChange::RemoveFeature { feature: "Horns".to_string() });
        assert_eq!(
            undo,
            PhysicalChange::RestoreFeature { feature: "Horns".to_string(), index: 0 }
        );
        assert!(state.apply_change(&undo));
        // IndexSet的相等比较忽略顺序，这里比较文档
        assert_eq!(serde_json::to_value(&state).unwrap(), before);
    }

    #[test]
    fn test_validate_catches_corrupted_document() {
        let state: PhysicalState = serde_json::from_value(serde_json::json!({
            "primary_locomotion": "Walker",
            "secondary_locomotion": ["Walker", "Flyer", "Flyer"],
            "base_features": [""]
        }))
        .unwrap();

        let errors = state.validate();
        assert_eq!(errors.len(), 3);
        assert!(!state.is_valid());
    }
}
