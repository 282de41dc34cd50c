//! Validation issue types shared by the permission, domain, and format tiers.
//!
//! Issues are accumulated per decision attempt and ride inside trace
//! records; they are never raised as errors during steady-state processing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::SkillProposal;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a validation issue.
///
/// An ERROR blocks the decision (and triggers a retry); a WARNING is
/// recorded on the trace but does not block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleTier
// ---------------------------------------------------------------------------

/// Which layer of the pipeline produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTier {
    /// Role-table permission checks.
    Permission,
    /// Domain validators supplied by the simulation.
    Domain,
    /// Structural checks on the parsed proposal itself.
    Format,
}

impl RuleTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Domain => "domain",
            Self::Format => "format",
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationIssue
// ---------------------------------------------------------------------------

/// A single structured validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// ERROR or WARNING.
    pub level: Severity,
    /// Pipeline tier the rule belongs to.
    pub tier: RuleTier,
    /// Stable rule identifier (e.g. `"skill_not_allowed"`).
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    pub fn error(tier: RuleTier, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Severity::Error,
            tier,
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn warning(tier: RuleTier, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Severity::Warning,
            tier,
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Normalize a raw validation result into a structured issue.
    ///
    /// Accepts both the structured object form and a bare message string;
    /// bare strings are treated as ERROR-level format findings. The `level`
    /// field of an object form may itself be a plain string and is parsed
    /// case-insensitively, defaulting to ERROR when unrecognized.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(message) => Some(Self::error(RuleTier::Format, "unstructured", message)),
            Value::Object(map) => {
                let level = map
                    .get("level")
                    .and_then(Value::as_str)
                    .and_then(|s| Severity::from_str(s).ok())
                    .unwrap_or(Severity::Error);
                let tier = map
                    .get("tier")
                    .and_then(Value::as_str)
                    .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
                        "permission" => Some(RuleTier::Permission),
                        "domain" => Some(RuleTier::Domain),
                        "format" => Some(RuleTier::Format),
                        _ => None,
                    })
                    .unwrap_or(RuleTier::Domain);
                let rule = map
                    .get("rule")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Self {
                    level,
                    tier,
                    rule,
                    message,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}: {}",
            self.level.as_str(),
            self.tier.as_str(),
            self.rule,
            self.message
        )
    }
}

/// True when at least one issue in the list is ERROR-level.
pub fn contains_error(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.level == Severity::Error)
}

// ---------------------------------------------------------------------------
// SkillValidator
// ---------------------------------------------------------------------------

/// A domain validator applied to every parsed proposal.
///
/// Validators accumulate issues; they never abort the pipeline themselves.
pub trait SkillValidator: Send + Sync {
    /// Stable validator name, used as the rule-id prefix in messages.
    fn name(&self) -> &str;

    /// Inspect a proposal against the bounded observable state.
    fn validate(&self, proposal: &SkillProposal, state: &Value) -> Vec<ValidationIssue>;
}

/// Flags proposals whose skill is not in the known skill set.
///
/// The adapter already degrades unknown output to the default skill, so this
/// fires only when a caller feeds proposals from another source.
pub struct KnownSkillValidator {
    pub known_skills: Vec<String>,
}

impl SkillValidator for KnownSkillValidator {
    fn name(&self) -> &str {
        "known_skill"
    }

    fn validate(&self, proposal: &SkillProposal, _state: &Value) -> Vec<ValidationIssue> {
        if self.known_skills.iter().any(|s| s == &proposal.skill) {
            Vec::new()
        } else {
            vec![ValidationIssue::error(
                RuleTier::Format,
                "unknown_skill",
                format!("skill '{}' is not a recognized skill", proposal.skill),
            )]
        }
    }
}

/// Warns on proposals whose stated confidence falls below a floor.
pub struct ConfidenceValidator {
    pub floor: f64,
}

impl Default for ConfidenceValidator {
    fn default() -> Self {
        Self { floor: 0.3 }
    }
}

impl SkillValidator for ConfidenceValidator {
    fn name(&self) -> &str {
        "confidence"
    }

    fn validate(&self, proposal: &SkillProposal, _state: &Value) -> Vec<ValidationIssue> {
        if proposal.confidence < self.floor {
            vec![ValidationIssue::warning(
                RuleTier::Domain,
                "low_confidence",
                format!(
                    "stated confidence {:.2} is below the {:.2} floor",
                    proposal.confidence, self.floor
                ),
            )]
        } else {
            Vec::new()
        }
    }
}
