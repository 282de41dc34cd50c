//! # Model Output Adaptation
//!
//! Turns free-form generation output into a structured [`SkillProposal`]
//! and formats corrective retry prompts when validation fails. Malformed
//! input never raises an error; every failure path degrades to the
//! configured default skill.

pub mod parser;

pub use parser::{strip_code_fences, strip_reasoning_blocks, OutputAdapter};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SkillProposal
// ---------------------------------------------------------------------------

/// Structured representation of an agent's intended action plus its stated
/// reasoning. Created once per decision attempt; immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProposal {
    /// The proposed skill name.
    pub skill: String,
    /// The proposing actor.
    pub actor_id: String,
    /// Named reasoning fragments captured verbatim from the output
    /// (e.g. `threat_appraisal`, `coping_appraisal`).
    pub reasoning: BTreeMap<String, String>,
    /// Stated confidence in [0, 1]; 1.0 when no confidence line was found.
    pub confidence: f64,
    /// The raw generation text the proposal was parsed from.
    pub raw: String,
}

// ---------------------------------------------------------------------------
// ParseContext
// ---------------------------------------------------------------------------

/// Per-attempt context handed to the parser.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// The actor the proposal belongs to.
    pub actor_id: String,
    /// The set of skill names a proposal may name.
    pub valid_skills: Vec<String>,
    /// Skill substituted when nothing can be recovered from the output.
    pub default_skill: String,
    /// Selects the legacy numeric-code table: actors that already adapted
    /// (elevated) read digits through a different table.
    pub already_adapted: bool,
}

impl ParseContext {
    pub fn new(actor_id: impl Into<String>, valid_skills: Vec<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            valid_skills,
            default_skill: "do_nothing".to_string(),
            already_adapted: false,
        }
    }
}
