/*
 * Creature Core - Creature Engine Module
 * 开发心理过程:
 * 1. 生物定义拆成物理、能力、特性、行为四个可组合的子状态
 * 2. 子状态之间互不知晓，跨状态规则统一交给聚合根和校验器
 * 3. 所有修改都走变更协议，可检查、可撤销、可回滚
 */

pub mod enums;
pub mod changes;
pub mod physical_state;
pub mod ability_state;
pub mod trait_state;
pub mod behavior_state;
pub mod history;
pub mod validator;
pub mod creature_state;

pub use enums::*;
pub use changes::{
    AbilityChange, BehaviorChange, ChangeMetadata, ChangeResult, FormChange, PhysicalChange, RelationLink,
    StateChange, StateComponent, TraitChange,
};
pub use physical_state::PhysicalState;
pub use ability_state::{Ability, AbilityState};
pub use trait_state::{TraitDefinition, TraitState};
pub use behavior_state::BehaviorState;
pub use history::{ChangeHistory, HistoryEntry};
pub use validator::{CrossStateValidator, ValidationIssue, ValidationReport, ValidationResult};
pub use creature_state::{CreatureState, StateSnapshot};
