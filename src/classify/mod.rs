//! # Construct Classification
//!
//! Tiered text-to-label classification used to recover theory-driven
//! constructs (threat and coping appraisal levels) from free text when a
//! structured label was not produced.
//!
//! Tiers are an ordered list of pure rules evaluated short-circuit:
//!
//! 1. An isolated categorical token (`VH`/`H`/`M`/`L`/`VL`) is returned
//!    verbatim.
//! 2. Qualifier-precedence phrases ("remains low", "moderate concern")
//!    resolve to the matching level, unless escalation language
//!    (severe/critical/catastrophic/...) is present in the same text, in
//!    which case the high level wins. This handles texts like
//!    "low risk of flooding", which would otherwise substring-match a
//!    high-risk keyword.
//! 3. Substring match against domain keyword dictionaries, high before low.
//!
//! Anything unmatched defaults to the medium level.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// KeywordLexicon
// ---------------------------------------------------------------------------

/// Dictionaries and pattern sources driving the classifier.
///
/// Overridable at construction to support non-flood domains; the default
/// lexicon targets flood-adaptation language.
#[derive(Debug, Clone)]
pub struct KeywordLexicon {
    /// Substrings indicating the high level (lowercase).
    pub high_keywords: Vec<String>,
    /// Substrings indicating the low level (lowercase).
    pub low_keywords: Vec<String>,
    /// Regex source detecting low-framing qualifiers.
    pub qualifier_low: String,
    /// Regex source detecting moderate-framing qualifiers.
    pub qualifier_moderate: String,
    /// Regex source detecting escalation language that overrides qualifiers.
    pub escalation: String,
}

impl Default for KeywordLexicon {
    fn default() -> Self {
        Self {
            high_keywords: [
                "high risk",
                "risk of flood",
                "severe",
                "major damage",
                "extensive damage",
                "immediate threat",
                "very likely",
                "urgent",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            low_keywords: [
                "low risk",
                "no risk",
                "no threat",
                "minimal damage",
                "unlikely",
                "well protected",
                "safe",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            qualifier_low: r"(?i)\b(low|minimal|negligible|unlikely)\b".to_string(),
            qualifier_moderate: r"(?i)\b(moderate|modest|medium|some concern)\b".to_string(),
            escalation: r"(?i)\b(severe|critical|extreme|catastrophic|emergency|devastat\w*|disastrous|disaster)\b"
                .to_string(),
        }
    }
}

static DEFAULT_LEXICON: Lazy<KeywordLexicon> = Lazy::new(KeywordLexicon::default);

// ---------------------------------------------------------------------------
// ConstructClassifier
// ---------------------------------------------------------------------------

/// Levels produced by the classifier, lowest to highest.
pub const LEVELS: [&str; 5] = ["VL", "L", "M", "H", "VH"];

const HIGH: &str = "H";
const MEDIUM: &str = "M";
const LOW: &str = "L";

/// Tiered classifier mapping free text to an appraisal level.
#[derive(Debug)]
pub struct ConstructClassifier {
    token_re: Regex,
    qualifier_low_re: Regex,
    qualifier_moderate_re: Regex,
    escalation_re: Regex,
    high_keywords: Vec<String>,
    low_keywords: Vec<String>,
}

impl ConstructClassifier {
    /// Build a classifier from a lexicon.
    ///
    /// Fails only when a custom lexicon carries an invalid pattern; the
    /// default lexicon's patterns are known-good.
    pub fn new(lexicon: &KeywordLexicon) -> Result<Self, ConfigError> {
        let compile = |src: &str| {
            Regex::new(src).map_err(|e| ConfigError::Lexicon {
                message: e.to_string(),
            })
        };
        Ok(Self {
            token_re: Regex::new(r"\b(VH|VL|H|M|L)\b").expect("invalid token regex"),
            qualifier_low_re: compile(&lexicon.qualifier_low)?,
            qualifier_moderate_re: compile(&lexicon.qualifier_moderate)?,
            escalation_re: compile(&lexicon.escalation)?,
            high_keywords: lexicon.high_keywords.clone(),
            low_keywords: lexicon.low_keywords.clone(),
        })
    }

    /// Classify `text` into one of the five levels.
    ///
    /// Tiers short-circuit at the first match; unmatched text is medium.
    pub fn classify_label(&self, text: &str) -> String {
        self.isolated_token(text)
            .or_else(|| self.qualifier_precedence(text))
            .or_else(|| self.keyword_match(text))
            .unwrap_or_else(|| MEDIUM.to_string())
    }

    /// Tier 1: an isolated categorical token is returned verbatim.
    fn isolated_token(&self, text: &str) -> Option<String> {
        self.token_re
            .find(text)
            .map(|m| m.as_str().to_string())
    }

    /// Tier 1.5: qualifier framing, with escalation override.
    fn qualifier_precedence(&self, text: &str) -> Option<String> {
        let low = self.qualifier_low_re.is_match(text);
        let moderate = self.qualifier_moderate_re.is_match(text);
        if !low && !moderate {
            return None;
        }
        if self.escalation_re.is_match(text) {
            return Some(HIGH.to_string());
        }
        Some(if low { LOW.to_string() } else { MEDIUM.to_string() })
    }

    /// Tier 2: substring match against the keyword dictionaries.
    fn keyword_match(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        if self.high_keywords.iter().any(|k| lowered.contains(k)) {
            return Some(HIGH.to_string());
        }
        if self.low_keywords.iter().any(|k| lowered.contains(k)) {
            return Some(LOW.to_string());
        }
        None
    }
}

impl Default for ConstructClassifier {
    fn default() -> Self {
        Self::new(&DEFAULT_LEXICON).expect("default lexicon patterns are valid")
    }
}
