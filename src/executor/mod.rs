//! # Decision Pipeline
//!
//! The parse → validate → retry → audit state machine wrapped around one
//! external generation call per attempt. The generation collaborator is
//! opaque; its retry bound is the only circuit breaker. Every terminal
//! decision, approved or rejected with the fallback skill substituted,
//! produces exactly one trace record, never an exception.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::adapter::{OutputAdapter, ParseContext, SkillProposal};
use crate::audit::{AuditWriter, DecisionTrace};
use crate::classify::ConstructClassifier;
use crate::context::ContextBuilder;
use crate::policy::RoleEnforcer;
use crate::validation::{
    contains_error, ConfidenceValidator, RuleTier, SkillValidator, ValidationIssue,
};

/// Default bound on corrective retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

// ---------------------------------------------------------------------------
// GenerationProvider
// ---------------------------------------------------------------------------

/// Failure surfaced by the generation collaborator.
///
/// Folded into the retry loop as an ERROR-level issue on that attempt;
/// never propagated out of the pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation call failed: {message}")]
    CallFailed { message: String },
}

/// One external generation call per decision attempt.
pub trait GenerationProvider {
    fn generate(&mut self, prompt: &str) -> Result<String, GenerationError>;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Terminal state of a decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Result handed back to the simulation for one finalized decision.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub proposal: SkillProposal,
    pub outcome: DecisionOutcome,
    /// Corrective retries consumed (0 = approved on the first attempt).
    pub retry_count: u32,
    /// Issues from the final attempt.
    pub issues: Vec<ValidationIssue>,
}

// ---------------------------------------------------------------------------
// DecisionExecutor
// ---------------------------------------------------------------------------

/// Drives the bounded decision loop for one actor at a time.
pub struct DecisionExecutor {
    pub adapter: OutputAdapter,
    pub enforcer: RoleEnforcer,
    pub validators: Vec<Box<dyn SkillValidator>>,
    pub classifier: ConstructClassifier,
    /// Skill names proposals may resolve to.
    pub known_skills: Vec<String>,
    /// Fallback skill substituted on parse failure and retry exhaustion.
    pub default_skill: String,
    pub max_retries: u32,
}

impl DecisionExecutor {
    pub fn new(enforcer: RoleEnforcer, known_skills: Vec<String>) -> Self {
        Self {
            adapter: OutputAdapter::new(),
            enforcer,
            validators: vec![Box::new(ConfidenceValidator::default())],
            classifier: ConstructClassifier::default(),
            known_skills,
            default_skill: "do_nothing".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_validators(mut self, validators: Vec<Box<dyn SkillValidator>>) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Run one full decision for `actor_id` at `year`.
    ///
    /// Builds the bounded context, then loops: generate → parse →
    /// permission check → domain validators. ERROR-level issues trigger a
    /// corrective retry prompt; exhausting the bound substitutes the
    /// fallback skill under a REJECTED outcome. The terminal decision is
    /// written to the audit trail either way.
    pub fn run_decision(
        &self,
        actor_id: &str,
        actor_category: &str,
        year: u32,
        builder: &dyn ContextBuilder,
        provider: &mut dyn GenerationProvider,
        audit: &mut AuditWriter,
    ) -> DecisionRecord {
        let scopes = self.enforcer.readable_scopes(actor_category);
        let state = builder.build(actor_id, &scopes);
        let original_prompt = builder.format_prompt(&state);

        let parse_ctx = ParseContext {
            actor_id: actor_id.to_string(),
            valid_skills: self.known_skills.clone(),
            default_skill: self.default_skill.clone(),
            already_adapted: already_adapted(&state),
        };

        let mut prompt = original_prompt.clone();
        let mut retry_count = 0u32;
        loop {
            let mut issues: Vec<ValidationIssue> = Vec::new();
            let raw = match provider.generate(&prompt) {
                Ok(raw) => raw,
                Err(e) => {
                    issues.push(ValidationIssue::error(
                        RuleTier::Format,
                        "generation_failed",
                        e.to_string(),
                    ));
                    String::new()
                }
            };
            let proposal = self.adapter.parse_output(&raw, &parse_ctx);

            let permission = self
                .enforcer
                .check_skill_permission(actor_category, &proposal.skill);
            if !permission.allowed {
                issues.push(ValidationIssue::error(
                    RuleTier::Permission,
                    "skill_not_allowed",
                    permission.reason,
                ));
            }
            for validator in &self.validators {
                issues.extend(validator.validate(&proposal, &state));
            }

            if !contains_error(&issues) {
                let record = DecisionRecord {
                    proposal,
                    outcome: DecisionOutcome::Approved,
                    retry_count,
                    issues,
                };
                self.write_trace(actor_category, year, &original_prompt, &record, audit);
                return record;
            }

            if retry_count >= self.max_retries {
                log::warn!(
                    "decision for {actor_id} ({actor_category}) rejected after {retry_count} retries; \
                     falling back to '{}'",
                    self.default_skill
                );
                let mut fallback = proposal;
                fallback.skill = self.default_skill.clone();
                let record = DecisionRecord {
                    proposal: fallback,
                    outcome: DecisionOutcome::Rejected,
                    retry_count,
                    issues,
                };
                self.write_trace(actor_category, year, &original_prompt, &record, audit);
                return record;
            }

            retry_count += 1;
            prompt = self.adapter.format_retry_prompt(&original_prompt, &issues);
        }
    }

    fn write_trace(
        &self,
        actor_category: &str,
        year: u32,
        prompt: &str,
        record: &DecisionRecord,
        audit: &mut AuditWriter,
    ) {
        let mut trace = DecisionTrace::new(
            record.proposal.actor_id.clone(),
            year,
            record.proposal.skill.clone(),
            record.outcome.as_str(),
        );
        trace.retry_count = record.retry_count;
        trace.validation_issues = record.issues.clone();
        trace.confidence = record.proposal.confidence;
        trace.reasoning = record.proposal.reasoning.clone();
        trace.raw_prompt = prompt.to_string();
        trace.raw_output = record.proposal.raw.clone();

        // Recover construct labels from free-text reasoning post-hoc.
        for (source, label_key) in [
            ("threat_appraisal", "threat_label"),
            ("coping_appraisal", "coping_label"),
        ] {
            if let Some(text) = record.proposal.reasoning.get(source) {
                trace
                    .reasoning
                    .insert(label_key.to_string(), self.classifier.classify_label(text));
            }
        }

        audit.write_trace(actor_category, trace, None);
    }
}

/// Whether the actor's own state says it already adapted (elevated).
fn already_adapted(state: &Value) -> bool {
    state
        .pointer("/own/elevated")
        .or_else(|| state.get("already_adapted"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditConfig, LogLevel};
    use crate::policy::default_role_table;
    use serde_json::json;
    use tempfile::TempDir;

    struct StaticContext;

    impl ContextBuilder for StaticContext {
        fn build(&self, _actor_id: &str, _observable: &[String]) -> Value {
            json!({"own": {"elevated": false, "savings": 1200.0}, "flood": {"depth": 0.4}})
        }

        fn format_prompt(&self, _context: &Value) -> String {
            "Choose a skill.".to_string()
        }

        fn get_memory(&self, _actor_id: &str) -> Vec<String> {
            Vec::new()
        }
    }

    /// Replays a fixed script of generation outputs.
    struct ScriptedProvider {
        responses: Vec<String>,
        calls: usize,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                calls: 0,
            }
        }
    }

    impl GenerationProvider for ScriptedProvider {
        fn generate(&mut self, _prompt: &str) -> Result<String, GenerationError> {
            let response = self
                .responses
                .get(self.calls)
                .cloned()
                .ok_or_else(|| GenerationError::CallFailed {
                    message: "script exhausted".to_string(),
                })?;
            self.calls += 1;
            Ok(response)
        }
    }

    fn executor() -> DecisionExecutor {
        DecisionExecutor::new(
            RoleEnforcer::new(default_role_table()),
            vec![
                "do_nothing".to_string(),
                "buy_insurance".to_string(),
                "elevate_house".to_string(),
                "relocate".to_string(),
                "adjust_premium".to_string(),
            ],
        )
    }

    fn audit(dir: &TempDir) -> AuditWriter {
        AuditWriter::new(AuditConfig {
            output_dir: dir.path().to_path_buf(),
            experiment_name: "exp".to_string(),
            log_level: LogLevel::Full,
        })
        .unwrap()
    }

    #[test]
    fn first_attempt_approval() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        let mut provider =
            ScriptedProvider::new(&["Threat appraisal: high risk\nSkill: elevate_house"]);
        let record = executor().run_decision(
            "hh_1",
            "household",
            3,
            &StaticContext,
            &mut provider,
            &mut audit,
        );
        assert_eq!(record.outcome, DecisionOutcome::Approved);
        assert_eq!(record.proposal.skill, "elevate_house");
        assert_eq!(record.retry_count, 0);
        assert_eq!(audit.summary().total_traces, 1);
        assert_eq!(audit.summary().by_category["household"].approved, 1);
    }

    #[test]
    fn denied_skill_is_retried_with_corrective_prompt() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        // A household may not adjust premiums; the retry should succeed.
        let mut provider =
            ScriptedProvider::new(&["Skill: adjust_premium", "Skill: buy_insurance"]);
        let record = executor().run_decision(
            "hh_1",
            "household",
            3,
            &StaticContext,
            &mut provider,
            &mut audit,
        );
        assert_eq!(record.outcome, DecisionOutcome::Approved);
        assert_eq!(record.proposal.skill, "buy_insurance");
        assert_eq!(record.retry_count, 1);
        assert_eq!(provider.calls, 2);
    }

    #[test]
    fn retry_exhaustion_rejects_with_fallback_skill() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        let mut provider = ScriptedProvider::new(&[
            "Skill: adjust_premium",
            "Skill: adjust_premium",
            "Skill: adjust_premium",
        ]);
        let record = executor().run_decision(
            "hh_1",
            "household",
            3,
            &StaticContext,
            &mut provider,
            &mut audit,
        );
        assert_eq!(record.outcome, DecisionOutcome::Rejected);
        assert_eq!(record.proposal.skill, "do_nothing");
        assert_eq!(record.retry_count, DEFAULT_MAX_RETRIES);
        assert!(!record.issues.is_empty());
        assert_eq!(audit.summary().by_category["household"].rejected, 1);
    }

    #[test]
    fn unknown_category_never_approves() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        let mut provider = ScriptedProvider::new(&[
            "Skill: do_nothing",
            "Skill: do_nothing",
            "Skill: do_nothing",
        ]);
        let record = executor().run_decision(
            "x_1",
            "martian",
            1,
            &StaticContext,
            &mut provider,
            &mut audit,
        );
        assert_eq!(record.outcome, DecisionOutcome::Rejected);
        assert!(record
            .issues
            .iter()
            .any(|i| i.rule == "skill_not_allowed"));
    }

    #[test]
    fn generation_failure_degrades_to_rejection_not_panic() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        let mut provider = ScriptedProvider::new(&[]);
        let record = executor().run_decision(
            "hh_1",
            "household",
            1,
            &StaticContext,
            &mut provider,
            &mut audit,
        );
        assert_eq!(record.outcome, DecisionOutcome::Rejected);
        assert!(record
            .issues
            .iter()
            .any(|i| i.rule == "generation_failed"));
    }

    #[test]
    fn trace_carries_classified_construct_labels() {
        let dir = TempDir::new().unwrap();
        let mut audit = audit(&dir);
        let mut provider = ScriptedProvider::new(&[
            "Threat appraisal: severe flooding is certain\nCoping appraisal: savings remain low\nSkill: elevate_house",
        ]);
        executor().run_decision("hh_1", "household", 3, &StaticContext, &mut provider, &mut audit);

        let content =
            std::fs::read_to_string(dir.path().join("exp_household.jsonl")).unwrap();
        let trace: DecisionTrace = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(trace.reasoning["threat_label"], "H");
        assert_eq!(trace.reasoning["coping_label"], "L");
        assert_eq!(trace.outcome, "APPROVED");
        assert_eq!(trace.agent_type, "household");
    }
}
