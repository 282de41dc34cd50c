//! Reflection scheduling: when an agent runs a memory-consolidation pass.
//!
//! Four trigger kinds are supported; each is a pure predicate over the
//! actor, the simulated year, the trigger configuration, and a small
//! context mapping. A legacy single-interval predicate is retained for
//! callers that do not use the multi-trigger configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// TriggerKind
// ---------------------------------------------------------------------------

/// Kinds of reflection trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A crisis event; fires for every actor category unless disabled.
    Crisis,
    /// A fixed cadence of simulated years.
    Periodic,
    /// The most recent decision's type is in the configured list.
    Decision,
    /// A large policy change, institutional actor categories only.
    Institutional,
}

// ---------------------------------------------------------------------------
// ReflectionTriggerConfig
// ---------------------------------------------------------------------------

/// Configuration for reflection triggering. Loaded once, read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionTriggerConfig {
    /// Whether crisis events trigger reflection at all.
    #[serde(default = "default_crisis")]
    pub crisis: bool,
    /// Periodic cadence in years; 0 disables the periodic trigger.
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval: u32,
    /// Decision types that force reflection; empty means never.
    #[serde(default)]
    pub decision_types: Vec<String>,
    /// Policy-change magnitude above which institutional actors reflect.
    #[serde(default = "default_institutional_threshold")]
    pub institutional_threshold: f64,
    /// Actor categories treated as institutional.
    #[serde(default = "default_institutional_categories")]
    pub institutional_categories: Vec<String>,
    /// Consolidation method handed to the memory subsystem.
    #[serde(default = "default_method")]
    pub method: String,
    /// Memory batch size for one consolidation pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_crisis() -> bool {
    true
}

fn default_periodic_interval() -> u32 {
    5
}

fn default_institutional_threshold() -> f64 {
    0.2
}

fn default_institutional_categories() -> Vec<String> {
    vec!["government".to_string(), "insurance".to_string()]
}

fn default_method() -> String {
    "importance_weighted".to_string()
}

fn default_batch_size() -> usize {
    10
}

impl Default for ReflectionTriggerConfig {
    fn default() -> Self {
        Self {
            crisis: default_crisis(),
            periodic_interval: default_periodic_interval(),
            decision_types: Vec::new(),
            institutional_threshold: default_institutional_threshold(),
            institutional_categories: default_institutional_categories(),
            method: default_method(),
            batch_size: default_batch_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Should `actor_id` reflect at `year` for the given trigger kind?
///
/// The context mapping supplies `last_decision_type` for DECISION triggers
/// and `policy_change_magnitude` for INSTITUTIONAL triggers.
pub fn should_reflect_triggered(
    _actor_id: &str,
    actor_category: &str,
    year: u32,
    kind: TriggerKind,
    config: &ReflectionTriggerConfig,
    context: &Value,
) -> bool {
    match kind {
        TriggerKind::Crisis => config.crisis,
        TriggerKind::Periodic => {
            config.periodic_interval > 0 && year > 0 && year % config.periodic_interval == 0
        }
        TriggerKind::Decision => context
            .get("last_decision_type")
            .and_then(Value::as_str)
            .map(|d| config.decision_types.iter().any(|t| t == d))
            .unwrap_or(false),
        TriggerKind::Institutional => {
            if !config
                .institutional_categories
                .iter()
                .any(|c| c == actor_category)
            {
                return false;
            }
            context
                .get("policy_change_magnitude")
                .and_then(Value::as_f64)
                .map(|m| m > config.institutional_threshold)
                .unwrap_or(false)
        }
    }
}

/// Legacy single-interval predicate: fires when `interval` is positive and
/// `year` is an exact multiple of it (year 0 counts as a multiple here,
/// unlike the PERIODIC trigger).
pub fn should_reflect(_actor_id: &str, year: u32, interval: u32) -> bool {
    interval > 0 && year % interval == 0
}
