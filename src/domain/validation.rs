//! Validation outcome model
//!
//! Rule violations are expected business outcomes, not errors. A
//! `ValidationOutcome` carries the ordered violations produced by a rule
//! service; its fatal flag is derived from the violations and can never
//! disagree with them.

use crate::domain::distribution::DistributionRecord;
use crate::domain::participant::ParticipantRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single rule violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Logged as an exception, the record still flows on
    NonFatal,
    /// Blocks persistence unless exceptions are ignored
    Fatal,
}

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: u32,
    pub description: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(rule_id: u32, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule_id,
            description: description.into(),
            severity,
        }
    }

    pub fn fatal(rule_id: u32, description: impl Into<String>) -> Self {
        Self::new(rule_id, description, Severity::Fatal)
    }

    pub fn non_fatal(rule_id: u32, description: impl Into<String>) -> Self {
        Self::new(rule_id, description, Severity::NonFatal)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Ordered violations from one or more rule services
///
/// `is_fatal` is recomputed on construction and on deserialization, so a
/// service that reports an inconsistent flag cannot break the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "OutcomeRepr")]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    violations: Vec<Violation>,
    is_fatal: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRepr {
    #[serde(default)]
    violations: Vec<Violation>,
}

impl From<OutcomeRepr> for ValidationOutcome {
    fn from(repr: OutcomeRepr) -> Self {
        Self::new(repr.violations)
    }
}

impl ValidationOutcome {
    pub fn new(violations: Vec<Violation>) -> Self {
        let is_fatal = violations.iter().any(Violation::is_fatal);
        Self {
            violations,
            is_fatal,
        }
    }

    /// An outcome with no violations
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_fatal(&self) -> bool {
        self.is_fatal
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Concatenate `self` then `other`; fatal if either side is fatal
    pub fn merge(mut self, other: ValidationOutcome) -> Self {
        self.violations.extend(other.violations);
        self.is_fatal = self.is_fatal || other.is_fatal;
        self
    }

    /// Merge a sequence of outcomes in iteration order
    pub fn merge_all(outcomes: impl IntoIterator<Item = ValidationOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(ValidationOutcome::clean(), ValidationOutcome::merge)
    }
}

/// Rule set a lookup validation call is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulesType {
    ParticipantManagement,
    CohortDistribution,
}

impl fmt::Display for RulesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesType::ParticipantManagement => write!(f, "ParticipantManagement"),
            RulesType::CohortDistribution => write!(f, "CohortDistribution"),
        }
    }
}

/// Input to a rule service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidationRequest {
    pub participant: ParticipantRecord,
    pub previous_participant: DistributionRecord,
    pub file_name: String,
    pub service_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_type: Option<RulesType>,
}

impl ValidationRequest {
    /// The same request scoped to one rule set
    pub fn for_rules_type(&self, rules_type: RulesType) -> Self {
        Self {
            rules_type: Some(rules_type),
            ..self.clone()
        }
    }
}
