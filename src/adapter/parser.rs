//! Parsing of generation output into skill proposals.
//!
//! Recognizers run in priority order: an explicit `Skill:`/`Decision:`
//! labeled line, PMT-style reasoning lines captured verbatim, then a legacy
//! `Final Decision:` line tried first as a skill-name substring and then as
//! a single digit through one of two numeric-code tables. If no skill is
//! recovered the configured default skill is substituted.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ParseContext, SkillProposal};
use crate::validation::ValidationIssue;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Line labels that declare a skill directly.
const SKILL_LABELS: [&str; 2] = ["skill:", "decision:"];

/// Legacy line label carrying either a skill substring or a numeric code.
const FINAL_DECISION_LABEL: &str = "final decision:";

/// Reasoning line labels captured verbatim, with the trace key they map to.
const REASONING_LABELS: [(&str, &str); 2] = [
    ("threat appraisal:", "threat_appraisal"),
    ("coping appraisal:", "coping_appraisal"),
];

const CONFIDENCE_LABEL: &str = "confidence:";

/// Legacy numeric decision codes for actors that have not yet adapted.
static CODES_BASELINE: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('0', "do_nothing"),
        ('1', "buy_insurance"),
        ('2', "elevate_house"),
        ('3', "relocate"),
    ])
});

/// Legacy codes once the property is already elevated; elevation is not
/// repeatable, so code 2 shifts to relocation.
static CODES_ADAPTED: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('0', "do_nothing"),
        ('1', "buy_insurance"),
        ('2', "relocate"),
    ])
});

// ---------------------------------------------------------------------------
// Preprocessing hooks
// ---------------------------------------------------------------------------

/// Strip chain-of-thought delimiter blocks some model families emit.
pub fn strip_reasoning_blocks(text: &str) -> String {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("invalid regex"));
    RE.replace_all(text, "").into_owned()
}

/// Strip markdown code fences, keeping the fenced content.
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// OutputAdapter
// ---------------------------------------------------------------------------

/// Parses generation output and formats retry prompts.
pub struct OutputAdapter {
    /// Hooks run over the raw text before any scanning, in order.
    preprocessors: Vec<fn(&str) -> String>,
}

impl OutputAdapter {
    pub fn new() -> Self {
        Self {
            preprocessors: vec![strip_reasoning_blocks, strip_code_fences],
        }
    }

    /// Replace the preprocessing hooks entirely.
    pub fn with_preprocessors(preprocessors: Vec<fn(&str) -> String>) -> Self {
        Self { preprocessors }
    }

    /// Parse raw generation output into a proposal.
    ///
    /// Never fails: unrecognized output degrades to the context's default
    /// skill with the reasoning fragments that could still be captured.
    pub fn parse_output(&self, raw: &str, ctx: &ParseContext) -> SkillProposal {
        let mut text = raw.to_string();
        for hook in &self.preprocessors {
            text = hook(&text);
        }

        let mut reasoning = BTreeMap::new();
        let mut confidence = 1.0f64;
        let mut skill: Option<String> = None;
        let mut legacy_line: Option<String> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            let lowered = trimmed.to_lowercase();

            for (label, key) in REASONING_LABELS {
                if lowered.starts_with(label) {
                    reasoning.insert(key.to_string(), trimmed[label.len()..].trim().to_string());
                }
            }

            if lowered.starts_with(CONFIDENCE_LABEL) {
                if let Ok(v) = trimmed[CONFIDENCE_LABEL.len()..].trim().parse::<f64>() {
                    confidence = v.clamp(0.0, 1.0);
                }
            }

            if skill.is_none() {
                for label in SKILL_LABELS {
                    if lowered.starts_with(label) {
                        skill = match_skill(&trimmed[label.len()..], &ctx.valid_skills);
                    }
                }
            }

            if legacy_line.is_none() && lowered.starts_with(FINAL_DECISION_LABEL) {
                legacy_line = Some(trimmed[FINAL_DECISION_LABEL.len()..].trim().to_string());
            }
        }

        let skill = skill
            .or_else(|| legacy_line.as_deref().and_then(|l| parse_legacy(l, ctx)))
            .unwrap_or_else(|| ctx.default_skill.clone());

        SkillProposal {
            skill,
            actor_id: ctx.actor_id.clone(),
            reasoning,
            confidence,
            raw: raw.to_string(),
        }
    }

    /// Prefix a human-readable list of validation errors ahead of the
    /// original prompt, instructing reconsideration.
    pub fn format_retry_prompt(&self, original_prompt: &str, issues: &[ValidationIssue]) -> String {
        let mut out =
            String::from("Your previous response was not valid for the following reasons:\n");
        for (i, issue) in issues.iter().enumerate() {
            out.push_str(&format!("{}. [{}] {}\n", i + 1, issue.level, issue.message));
        }
        out.push_str(
            "\nReconsider your answer, address every issue above, and respond again in the required format.\n\n",
        );
        out.push_str(original_prompt);
        out
    }
}

impl Default for OutputAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Match a candidate skill string against the valid skill set.
///
/// Exact (case- and separator-insensitive) matches win; otherwise a valid
/// skill appearing as a substring of the candidate is accepted.
fn match_skill(candidate: &str, valid_skills: &[String]) -> Option<String> {
    let normalized = candidate
        .trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c == '.' || c == '`')
        .to_lowercase()
        .replace(' ', "_");
    if normalized.is_empty() {
        return None;
    }
    for skill in valid_skills {
        if normalized == skill.to_lowercase() {
            return Some(skill.clone());
        }
    }
    for skill in valid_skills {
        if normalized.contains(&skill.to_lowercase()) {
            return Some(skill.clone());
        }
    }
    None
}

/// Resolve a legacy `Final Decision:` payload: skill substring first, then
/// a single digit through the table selected by the adapted flag.
fn parse_legacy(payload: &str, ctx: &ParseContext) -> Option<String> {
    if let Some(skill) = match_skill(payload, &ctx.valid_skills) {
        return Some(skill);
    }
    let digit = payload.chars().find(|c| c.is_ascii_digit())?;
    let table: &HashMap<char, &'static str> = if ctx.already_adapted {
        &CODES_ADAPTED
    } else {
        &CODES_BASELINE
    };
    table.get(&digit).map(|s| s.to_string())
}
