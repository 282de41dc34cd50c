//! Trace, summary, and configuration types for the audit trail.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Severity, ValidationIssue};

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

/// How much of the trace stream is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Persist every trace.
    Full,
    /// Persist only traces that failed validation.
    Summary,
    /// Persist only traces carrying at least one ERROR-level issue.
    ErrorsOnly,
}

/// Audit writer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub output_dir: PathBuf,
    pub experiment_name: String,
    pub log_level: LogLevel,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("audit_logs"),
            experiment_name: "run".to_string(),
            log_level: LogLevel::Full,
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionTrace
// ---------------------------------------------------------------------------

fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_confidence() -> f64 {
    1.0
}

/// One finalized decision, as persisted to the per-category trace log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    #[serde(default = "new_trace_id")]
    pub trace_id: String,
    /// RFC 3339 UTC timestamp; stamped by the writer when empty.
    #[serde(default)]
    pub timestamp: String,
    /// Actor category; defaulted by the writer when empty.
    #[serde(default)]
    pub agent_type: String,
    pub agent_id: String,
    /// Simulated time step.
    pub year: u32,
    /// The approved skill, or the fallback skill on rejection.
    pub decision: String,
    /// `"APPROVED"` or `"REJECTED"`.
    pub outcome: String,
    #[serde(default)]
    pub retry_count: u32,
    /// Derived by the writer: no ERROR-level issues present.
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub validation_issues: Vec<ValidationIssue>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Reasoning constructs captured from the output, plus any labels
    /// recovered post-hoc. Keys become dynamic CSV columns.
    #[serde(default)]
    pub reasoning: BTreeMap<String, String>,
    /// Truncated prompt, kept for debugging only.
    #[serde(default)]
    pub raw_prompt: String,
    /// Raw generation output, truncated on export.
    #[serde(default)]
    pub raw_output: String,
}

impl DecisionTrace {
    pub fn new(agent_id: impl Into<String>, year: u32, decision: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            trace_id: new_trace_id(),
            timestamp: String::new(),
            agent_type: String::new(),
            agent_id: agent_id.into(),
            year,
            decision: decision.into(),
            outcome: outcome.into(),
            retry_count: 0,
            validated: true,
            validation_issues: Vec::new(),
            confidence: 1.0,
            reasoning: BTreeMap::new(),
            raw_prompt: String::new(),
            raw_output: String::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.validation_issues
            .iter()
            .any(|i| i.level == Severity::Error)
    }
}

// ---------------------------------------------------------------------------
// AuditSummary
// ---------------------------------------------------------------------------

/// Per-category decision counts and histograms.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorySummary {
    pub traces: u64,
    pub approved: u64,
    pub rejected: u64,
    /// Decision value → occurrence count.
    pub decisions: BTreeMap<String, u64>,
}

/// Run-level aggregation, mutated incrementally as traces are written and
/// finalized once at end-of-run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub total_traces: u64,
    pub total_errors: u64,
    pub total_warnings: u64,
    pub by_category: BTreeMap<String, CategorySummary>,
}

impl AuditSummary {
    /// Errors per written trace, as a percentage string.
    pub fn error_rate(&self) -> String {
        Self::rate(self.total_errors, self.total_traces)
    }

    /// Warnings per written trace, as a percentage string.
    pub fn warning_rate(&self) -> String {
        Self::rate(self.total_warnings, self.total_traces)
    }

    fn rate(count: u64, total: u64) -> String {
        if total == 0 {
            "0.00%".to_string()
        } else {
            format!("{:.2}%", count as f64 * 100.0 / total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RuleTier;

    #[test]
    fn trace_round_trips_through_json() {
        let mut trace = DecisionTrace::new("hh_1", 3, "elevate_house", "APPROVED");
        trace.reasoning.insert("threat_appraisal".into(), "H".into());
        trace
            .validation_issues
            .push(ValidationIssue::warning(RuleTier::Domain, "w", "minor"));
        let json = serde_json::to_string(&trace).unwrap();
        let back: DecisionTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(back.agent_id, "hh_1");
        assert_eq!(back.reasoning["threat_appraisal"], "H");
        assert_eq!(back.validation_issues.len(), 1);
    }

    #[test]
    fn rates_format_as_percentages() {
        let summary = AuditSummary {
            total_traces: 8,
            total_errors: 2,
            total_warnings: 1,
            ..Default::default()
        };
        assert_eq!(summary.error_rate(), "25.00%");
        assert_eq!(summary.warning_rate(), "12.50%");
    }

    #[test]
    fn empty_summary_rates_do_not_divide_by_zero() {
        assert_eq!(AuditSummary::default().error_rate(), "0.00%");
    }
}
