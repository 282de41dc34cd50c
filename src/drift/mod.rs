//! # Behavioral Drift Detection
//!
//! Watches the population of decisions for collapse into herding (low
//! entropy, one dominant action) and watches individual actors for
//! stagnation (a sliding window of near-identical decisions).
//!
//! Reports are recomputed on demand from current window state and are not
//! persisted; with no recorded data the detector returns no alerts and no
//! error.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DriftConfig
// ---------------------------------------------------------------------------

/// Thresholds driving drift alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Population entropy below this raises an alert.
    pub entropy_threshold: f64,
    /// Dominant-decision share above this raises an alert.
    pub dominance_ratio: f64,
    /// Window self-similarity at or above this marks an actor stagnant.
    pub similarity_threshold: f64,
    /// Stagnation also requires at most this many distinct decisions.
    pub variety_floor: usize,
    /// Per-actor sliding-window length.
    pub window_size: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: 0.5,
            dominance_ratio: 0.8,
            similarity_threshold: 0.9,
            variety_floor: 2,
            window_size: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Population-level drift measurements for one time step.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub year: u32,
    /// Shannon entropy in bits, normalized by log2 of the distinct
    /// observed decision count.
    pub entropy: f64,
    pub dominant_decision: Option<String>,
    pub dominant_share: f64,
    pub population: usize,
    pub alerts: Vec<String>,
}

/// Per-actor stagnation measurements.
#[derive(Debug, Clone, Serialize)]
pub struct IndividualDriftReport {
    pub actor_id: String,
    /// Jaccard similarity of the window's older and recent decision sets
    /// (or against a caller-supplied reference set).
    pub similarity: f64,
    pub distinct_decisions: usize,
    pub stagnant: bool,
}

// ---------------------------------------------------------------------------
// DriftDetector
// ---------------------------------------------------------------------------

/// Accumulates decisions and computes population and individual drift.
///
/// Windows are independent per actor; in a parallel rewrite, shard by actor
/// id rather than sharing the detector.
pub struct DriftDetector {
    config: DriftConfig,
    /// year → actor id → (actor category, decision).
    by_year: HashMap<u32, BTreeMap<String, (String, String)>>,
    /// actor id → bounded recent-decision window.
    windows: HashMap<String, VecDeque<String>>,
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            by_year: HashMap::new(),
            windows: HashMap::new(),
        }
    }

    /// Record one finalized decision.
    pub fn record_decision(&mut self, year: u32, actor_id: &str, category: &str, decision: &str) {
        self.by_year
            .entry(year)
            .or_default()
            .insert(actor_id.to_string(), (category.to_string(), decision.to_string()));
        let window = self.windows.entry(actor_id.to_string()).or_default();
        window.push_back(decision.to_string());
        while window.len() > self.config.window_size {
            window.pop_front();
        }
    }

    /// Population drift for one time step, across all categories.
    pub fn population_drift(&self, year: u32) -> Option<DriftReport> {
        let decisions: Vec<&str> = self
            .by_year
            .get(&year)?
            .values()
            .map(|(_, d)| d.as_str())
            .collect();
        Some(self.report_for(year, &decisions, None))
    }

    /// Population drift restricted to one actor category.
    pub fn population_drift_for_category(&self, year: u32, category: &str) -> Option<DriftReport> {
        let decisions: Vec<&str> = self
            .by_year
            .get(&year)?
            .values()
            .filter(|(c, _)| c == category)
            .map(|(_, d)| d.as_str())
            .collect();
        if decisions.is_empty() {
            return None;
        }
        Some(self.report_for(year, &decisions, Some(category)))
    }

    fn report_for(&self, year: u32, decisions: &[&str], category: Option<&str>) -> DriftReport {
        let entropy = normalized_entropy(decisions);
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for d in decisions {
            *counts.entry(d).or_insert(0) += 1;
        }
        let (dominant_decision, dominant_count) = counts
            .iter()
            .max_by_key(|(_, c)| **c)
            .map(|(d, c)| (Some(d.to_string()), *c))
            .unwrap_or((None, 0));
        let dominant_share = if decisions.is_empty() {
            0.0
        } else {
            dominant_count as f64 / decisions.len() as f64
        };

        let scope = match category {
            Some(c) => format!("category '{c}'"),
            None => "population".to_string(),
        };
        let mut alerts = Vec::new();
        if !decisions.is_empty() && entropy < self.config.entropy_threshold {
            alerts.push(format!(
                "{scope} entropy {entropy:.3} below threshold {:.2} in year {year}",
                self.config.entropy_threshold
            ));
        }
        if dominant_share > self.config.dominance_ratio {
            if let Some(ref d) = dominant_decision {
                alerts.push(format!(
                    "{scope} dominated by '{d}' at {:.0}% in year {year}",
                    dominant_share * 100.0
                ));
            }
        }

        DriftReport {
            year,
            entropy,
            dominant_decision,
            dominant_share,
            population: decisions.len(),
            alerts,
        }
    }

    /// Stagnation measurements for one actor.
    ///
    /// With a `reference` set, the window's decision set is compared to the
    /// reference; otherwise the older half of the window is compared to the
    /// recent half. Returns `None` until the actor has a full window.
    pub fn individual_drift(
        &self,
        actor_id: &str,
        reference: Option<&HashSet<String>>,
    ) -> Option<IndividualDriftReport> {
        let window = self.windows.get(actor_id)?;
        if window.len() < self.config.window_size {
            return None;
        }
        let all: HashSet<&str> = window.iter().map(String::as_str).collect();
        let similarity = match reference {
            Some(reference) => {
                let reference: HashSet<&str> = reference.iter().map(String::as_str).collect();
                jaccard(&all, &reference)
            }
            None => {
                let mid = window.len() / 2;
                let older: HashSet<&str> = window.iter().take(mid).map(String::as_str).collect();
                let recent: HashSet<&str> = window.iter().skip(mid).map(String::as_str).collect();
                jaccard(&older, &recent)
            }
        };
        let distinct_decisions = all.len();
        Some(IndividualDriftReport {
            actor_id: actor_id.to_string(),
            similarity,
            distinct_decisions,
            stagnant: similarity >= self.config.similarity_threshold
                && distinct_decisions <= self.config.variety_floor,
        })
    }

    /// All alerts for one time step: population-level, per-category, and
    /// per-actor stagnation. Empty when nothing is recorded for the year.
    pub fn get_alerts(&self, year: u32) -> Vec<String> {
        let mut alerts = Vec::new();
        let step = match self.by_year.get(&year) {
            Some(step) => step,
            None => return alerts,
        };

        if let Some(report) = self.population_drift(year) {
            alerts.extend(report.alerts);
        }

        let categories: HashSet<&str> = step.values().map(|(c, _)| c.as_str()).collect();
        let mut categories: Vec<&str> = categories.into_iter().collect();
        categories.sort_unstable();
        for category in categories {
            if let Some(report) = self.population_drift_for_category(year, category) {
                // Skip single-category steps that just repeat the population alert.
                if report.population < step.len() {
                    alerts.extend(report.alerts);
                }
            }
        }

        for actor_id in step.keys() {
            if let Some(report) = self.individual_drift(actor_id, None) {
                if report.stagnant {
                    alerts.push(format!(
                        "actor {} stagnant: {} distinct decisions in last {} steps",
                        report.actor_id,
                        report.distinct_decisions,
                        self.config.window_size
                    ));
                }
            }
        }

        alerts
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DriftConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Shannon entropy (base 2) normalized by log2 of the distinct observed
/// decision count. All-identical inputs are exactly 0.0; an exact 50/50
/// two-way split is exactly 1.0.
pub fn normalized_entropy(decisions: &[&str]) -> f64 {
    if decisions.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in decisions {
        *counts.entry(d).or_insert(0) += 1;
    }
    let k = counts.len();
    if k <= 1 {
        return 0.0;
    }
    let n = decisions.len() as f64;
    let raw: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum();
    raw / (k as f64).log2()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_of_identical_population_is_zero() {
        assert_eq!(normalized_entropy(&["elevate_house"; 10]), 0.0);
    }

    #[test]
    fn entropy_of_even_two_way_split_is_one_bit() {
        let decisions = ["do_nothing", "relocate", "do_nothing", "relocate"];
        assert!((normalized_entropy(&decisions) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn herding_population_is_flagged() {
        let mut detector = DriftDetector::default();
        for i in 0..9 {
            detector.record_decision(3, &format!("hh_{i}"), "household", "elevate_house");
        }
        detector.record_decision(3, "hh_9", "household", "do_nothing");

        let report = detector.population_drift(3).unwrap();
        assert_eq!(report.population, 10);
        assert_eq!(report.dominant_decision.as_deref(), Some("elevate_house"));
        assert!((report.dominant_share - 0.9).abs() < 1e-12);
        assert!(report.entropy < 0.5);
        assert!(!report.alerts.is_empty());

        let alerts = detector.get_alerts(3);
        assert!(alerts.iter().any(|a| a.contains("entropy")));
        assert!(alerts.iter().any(|a| a.contains("elevate_house")));
    }

    #[test]
    fn diverse_population_raises_no_alerts() {
        let mut detector = DriftDetector::default();
        for (i, d) in ["do_nothing", "buy_insurance", "elevate_house", "relocate"]
            .iter()
            .enumerate()
        {
            detector.record_decision(1, &format!("hh_{i}"), "household", d);
        }
        assert!(detector.get_alerts(1).is_empty());
    }

    #[test]
    fn no_recorded_data_yields_no_alerts() {
        let detector = DriftDetector::default();
        assert!(detector.get_alerts(7).is_empty());
        assert!(detector.population_drift(7).is_none());
        assert!(detector.individual_drift("nobody", None).is_none());
    }

    #[test]
    fn repetitive_actor_is_stagnant() {
        let mut detector = DriftDetector::default();
        for year in 0..5 {
            detector.record_decision(year, "hh_1", "household", "do_nothing");
        }
        let report = detector.individual_drift("hh_1", None).unwrap();
        assert!(report.stagnant);
        assert_eq!(report.distinct_decisions, 1);
        assert_eq!(report.similarity, 1.0);
    }

    #[test]
    fn varied_actor_is_not_stagnant() {
        let mut detector = DriftDetector::default();
        let decisions = ["do_nothing", "buy_insurance", "elevate_house", "do_nothing", "relocate"];
        for (year, d) in decisions.iter().enumerate() {
            detector.record_decision(year as u32, "hh_1", "household", d);
        }
        let report = detector.individual_drift("hh_1", None).unwrap();
        assert!(!report.stagnant);
        assert!(report.distinct_decisions > 2);
    }

    #[test]
    fn reference_set_comparison() {
        let mut detector = DriftDetector::default();
        for year in 0..5 {
            detector.record_decision(year, "hh_1", "household", "do_nothing");
        }
        let reference: HashSet<String> = ["do_nothing".to_string()].into_iter().collect();
        let report = detector.individual_drift("hh_1", Some(&reference)).unwrap();
        assert_eq!(report.similarity, 1.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut detector = DriftDetector::new(DriftConfig {
            window_size: 3,
            ..DriftConfig::default()
        });
        for year in 0..10 {
            detector.record_decision(year, "hh_1", "household", "do_nothing");
        }
        assert_eq!(detector.windows.get("hh_1").unwrap().len(), 3);
    }
}
