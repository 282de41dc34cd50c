//! # Symbolic Context Monitoring
//!
//! Consumes world-state snapshots, maintains a signature frequency table,
//! scores novelty-based surprise, and selects a cognitive-processing mode:
//! routine processing for familiar states, high attention for surprising
//! ones.

pub mod sensor;
pub mod signature;

pub use sensor::{sensors_from_yaml_str, Sensor, SensorBin, UNKNOWN_LABEL};
pub use signature::{SignatureEngine, SIGNATURE_WIDTH};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Surprise above this bound selects high-attention processing.
pub const DEFAULT_AROUSAL_THRESHOLD: f64 = 0.7;

// ---------------------------------------------------------------------------
// ProcessingMode
// ---------------------------------------------------------------------------

/// Cognitive-processing mode selected from surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Familiar state; cheap habitual processing suffices.
    Routine,
    /// Novel state; full deliberative processing is warranted.
    HighAttention,
}

// ---------------------------------------------------------------------------
// Surprise models
// ---------------------------------------------------------------------------

/// Strategy scoring how unexpected an observation is, given the count of
/// prior observations of the same signature and the total prior event count.
///
/// Counts always reflect state *before* the current observation is folded
/// in; the monitor owns that ordering.
pub trait SurpriseModel {
    fn surprise(&self, prior_count: u64, total_events: u64) -> f64;
}

/// Frequency-ratio novelty: a first-ever observation scores exactly 1.0,
/// and a repeated one scores `1 - prior_count / total_events`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoveltySurprise;

impl SurpriseModel for NoveltySurprise {
    fn surprise(&self, prior_count: u64, total_events: u64) -> f64 {
        if prior_count == 0 || total_events == 0 {
            return 1.0;
        }
        1.0 - prior_count as f64 / total_events as f64
    }
}

/// Add-one smoothed probability over a fixed signature vocabulary.
///
/// A first-ever observation scores below 1.0 (0.5 for a two-signature
/// vocabulary, approaching 1.0 as the vocabulary grows). Kept as a distinct
/// strategy; it does not supersede [`NoveltySurprise`].
#[derive(Debug, Clone, Copy)]
pub struct LaplaceSurprise {
    pub vocabulary_size: usize,
}

impl SurpriseModel for LaplaceSurprise {
    fn surprise(&self, prior_count: u64, total_events: u64) -> f64 {
        let v = self.vocabulary_size.max(1) as f64;
        1.0 - (prior_count as f64 + 1.0) / (total_events as f64 + v)
    }
}

// ---------------------------------------------------------------------------
// ContextMonitor
// ---------------------------------------------------------------------------

/// One observation folded into the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub signature: String,
    pub surprise: f64,
    pub mode: ProcessingMode,
    /// True when the signature had never been seen before.
    pub novel: bool,
}

/// Owns the signature frequency table for one simulation run.
///
/// Not safe for concurrent access; shard by simulation shard rather than
/// sharing one counter map.
pub struct ContextMonitor<S: SurpriseModel = NoveltySurprise> {
    engine: SignatureEngine,
    counts: HashMap<String, u64>,
    total_events: u64,
    arousal_threshold: f64,
    model: S,
}

impl ContextMonitor<NoveltySurprise> {
    pub fn new(engine: SignatureEngine) -> Self {
        Self::with_model(engine, NoveltySurprise, DEFAULT_AROUSAL_THRESHOLD)
    }
}

impl<S: SurpriseModel> ContextMonitor<S> {
    pub fn with_model(engine: SignatureEngine, model: S, arousal_threshold: f64) -> Self {
        Self {
            engine,
            counts: HashMap::new(),
            total_events: 0,
            arousal_threshold,
            model,
        }
    }

    /// Fold one world-state snapshot into the monitor.
    ///
    /// Surprise is scored against counts as they stood before this
    /// observation; the check → score → increment ordering is load-bearing
    /// and must not be rearranged.
    pub fn observe(&mut self, state: &Value) -> Observation {
        let signature = self.engine.compute_signature(state);
        let prior = self.counts.get(&signature).copied().unwrap_or(0);
        let surprise = self.model.surprise(prior, self.total_events);
        *self.counts.entry(signature.clone()).or_insert(0) += 1;
        self.total_events += 1;
        Observation {
            mode: self.determine_system(surprise),
            novel: prior == 0,
            signature,
            surprise,
        }
    }

    /// Select the processing mode for a surprise score.
    pub fn determine_system(&self, surprise: f64) -> ProcessingMode {
        if surprise > self.arousal_threshold {
            ProcessingMode::HighAttention
        } else {
            ProcessingMode::Routine
        }
    }

    /// Forget all observed signatures.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.total_events = 0;
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn distinct_signatures(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monitor() -> ContextMonitor {
        ContextMonitor::new(SignatureEngine::new(vec![Sensor::new(
            "depth",
            "flood.depth",
            vec![("dry", 0.0), ("shallow", 1.0), ("deep", 5.0)],
        )]))
    }

    #[test]
    fn first_observation_is_maximally_surprising() {
        let mut m = monitor();
        let obs = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert_eq!(obs.surprise, 1.0);
        assert!(obs.novel);
        assert_eq!(obs.mode, ProcessingMode::HighAttention);
    }

    #[test]
    fn repeated_observation_is_strictly_less_surprising() {
        let mut m = monitor();
        let first = m.observe(&json!({"flood": {"depth": 0.5}}));
        let second = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert!(second.surprise < first.surprise);
        assert!(!second.novel);
    }

    #[test]
    fn surprise_uses_counts_before_the_current_observation() {
        let mut m = monitor();
        m.observe(&json!({"flood": {"depth": 0.5}})); // A
        m.observe(&json!({"flood": {"depth": 3.0}})); // B
        // A again: prior count 1, total events before = 2.
        let third = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert!((third.surprise - 0.5).abs() < 1e-12);
        assert_eq!(m.total_events(), 3);
        assert_eq!(m.distinct_signatures(), 2);
    }

    #[test]
    fn familiar_state_falls_back_to_routine_mode() {
        let mut m = monitor();
        for _ in 0..5 {
            m.observe(&json!({"flood": {"depth": 0.5}}));
        }
        let obs = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert_eq!(obs.mode, ProcessingMode::Routine);
    }

    #[test]
    fn reset_restores_full_novelty() {
        let mut m = monitor();
        m.observe(&json!({"flood": {"depth": 0.5}}));
        m.reset();
        let obs = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert_eq!(obs.surprise, 1.0);
    }

    #[test]
    fn laplace_first_observation_is_smoothed_below_one() {
        let engine = SignatureEngine::new(vec![Sensor::new(
            "depth",
            "flood.depth",
            vec![("dry", 0.0), ("wet", 5.0)],
        )]);
        let mut m = ContextMonitor::with_model(
            engine,
            LaplaceSurprise { vocabulary_size: 2 },
            DEFAULT_AROUSAL_THRESHOLD,
        );
        let obs = m.observe(&json!({"flood": {"depth": 0.5}}));
        assert!((obs.surprise - 0.5).abs() < 1e-12);
    }
}
