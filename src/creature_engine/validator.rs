/*
 * Creature Core - Cross-State Validator
 * 开发心理过程:
 * 1. 单个子状态的规则由子状态自己校验，这里只处理跨越多个子状态的规则
 * 2. 每条规则可以关闭、仅提示或强制执行，强制执行的违规会触发回滚
 * 3. 校验报告汇总子状态错误、强制规则错误和提示性警告
 */

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::ability_state::AbilityState;
use super::behavior_state::BehaviorState;
use super::enums::{Intelligence, SocialStructure, ValidationSeverity};
use super::trait_state::TraitState;
use crate::core::config::{CrossStateRules, RuleMode};

pub const CROSS_STATE_SUBSYSTEM: &str = "cross_state";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub subsystem: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(severity: ValidationSeverity, subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    ValidWithWarnings,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub creature_id: String,
    pub validation_timestamp: DateTime<Utc>,
    pub overall_result: ValidationResult,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    // 按严重程度把问题分成错误和警告
    pub fn from_issues(creature_id: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity >= ValidationSeverity::Error);

        let overall_result = if !errors.is_empty() {
            ValidationResult::Invalid
        } else if !warnings.is_empty() {
            ValidationResult::ValidWithWarnings
        } else {
            ValidationResult::Valid
        };

        Self {
            creature_id: creature_id.into(),
            validation_timestamp: Utc::now(),
            overall_result,
            errors,
            warnings,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}

// 能力需求可由特性名、特性表现形式和行为标签满足
pub fn requirement_context(traits: &TraitState, behavior: &BehaviorState) -> IndexSet<String> {
    let mut context: IndexSet<String> = traits.trait_names().map(str::to_string).collect();
    for name in traits.trait_names() {
        if let Some(manifestations) = traits.base_manifestations(name) {
            context.extend(manifestations.iter().cloned());
        }
    }
    context.extend(behavior.base_behaviors().iter().cloned());
    context
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrossStateValidator {
    rules: CrossStateRules,
}

impl CrossStateValidator {
    pub fn new(rules: CrossStateRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CrossStateRules {
        &self.rules
    }

    // 只返回强制规则的违规
    pub fn enforced_violations(
        &self,
        abilities: &AbilityState,
        traits: &TraitState,
        behavior: &BehaviorState,
    ) -> Vec<String> {
        self.check(abilities, traits, behavior)
            .into_iter()
            .filter(|issue| issue.severity >= ValidationSeverity::Error)
            .map(|issue| issue.message)
            .collect()
    }

    pub fn check(
        &self,
        abilities: &AbilityState,
        traits: &TraitState,
        behavior: &BehaviorState,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(severity) = severity_for(self.rules.ability_requirements) {
            let context = requirement_context(traits, behavior);
            for ability in abilities.abilities().iter().filter(|a| a.active) {
                let unmet = abilities.unmet_requirements(&ability.name, &context);
                if !unmet.is_empty() {
                    issues.push(ValidationIssue::new(
                        severity,
                        CROSS_STATE_SUBSYSTEM,
                        format!(
                            "active ability '{}' has unmet requirements: {}",
                            ability.name,
                            unmet.join(", ")
                        ),
                    ));
                }
            }
        }

        if let Some(severity) = severity_for(self.rules.hive_intelligence) {
            if behavior.social_structure() == SocialStructure::Hive
                && behavior.intelligence() == Intelligence::Mindless
            {
                issues.push(ValidationIssue::new(
                    severity,
                    CROSS_STATE_SUBSYSTEM,
                    "hive social structure requires more than mindless intelligence",
                ));
            }
        }

        if let Some(severity) = severity_for(self.rules.mutation_targets_known) {
            for name in traits.trait_names() {
                let Some(targets) = traits.mutation_paths(name) else {
                    continue;
                };
                for target in targets.iter().filter(|t| !traits.has_trait(t)) {
                    issues.push(ValidationIssue::new(
                        severity,
                        CROSS_STATE_SUBSYSTEM,
                        format!("trait '{}' mutates into unknown trait '{}'", name, target),
                    ));
                }
            }
        }

        issues
    }
}

fn severity_for(mode: RuleMode) -> Option<ValidationSeverity> {
    match mode {
        RuleMode::Off => None,
        RuleMode::Advisory => Some(ValidationSeverity::Warning),
        RuleMode::Enforced => Some(ValidationSeverity::Error),
    }
}
