//! The audit writer: per-category trace files, summary, and CSV export.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::{json, Value};

use super::trace::{AuditConfig, AuditSummary, DecisionTrace, LogLevel};
use crate::errors::ConfigError;
use crate::validation::{Severity, ValidationIssue};

/// Characters of prompt kept in CSV debug columns.
const PROMPT_EXCERPT_LEN: usize = 160;
/// Characters of raw output kept in CSV debug columns.
const OUTPUT_EXCERPT_LEN: usize = 400;

/// Fixed core CSV columns, ahead of the dynamic reasoning columns.
const CORE_FIELDS: [&str; 8] = [
    "timestamp",
    "year",
    "agent_id",
    "outcome",
    "retry_count",
    "decision",
    "validated",
    "issues",
];

/// Writes decision traces for one run.
///
/// Each actor category's log file is exclusively owned by this writer for
/// the run; appends are sequential. I/O failures are logged and swallowed.
pub struct AuditWriter {
    config: AuditConfig,
    files: HashMap<String, File>,
    buffers: HashMap<String, Vec<DecisionTrace>>,
    summary: AuditSummary,
}

impl AuditWriter {
    /// Create a writer, preparing the output directory.
    pub fn new(config: AuditConfig) -> Result<Self, ConfigError> {
        fs::create_dir_all(&config.output_dir).map_err(|e| ConfigError::AuditSetup {
            message: format!(
                "cannot create output dir {}: {e}",
                config.output_dir.display()
            ),
        })?;
        Ok(Self {
            config,
            files: HashMap::new(),
            buffers: HashMap::new(),
            summary: AuditSummary::default(),
        })
    }

    /// Record one finalized decision.
    ///
    /// Stamps timestamp and category defaults, normalizes any raw
    /// validation results into the trace, updates running counters and
    /// histograms, and (subject to the configured log level) appends the
    /// trace to the per-category file and buffers it for export.
    pub fn write_trace(
        &mut self,
        actor_category: &str,
        mut trace: DecisionTrace,
        validation_results: Option<&[Value]>,
    ) {
        if trace.timestamp.is_empty() {
            trace.timestamp = Utc::now().to_rfc3339();
        }
        if trace.agent_type.is_empty() {
            trace.agent_type = actor_category.to_string();
        }
        if let Some(raw) = validation_results {
            trace
                .validation_issues
                .extend(raw.iter().filter_map(ValidationIssue::from_value));
        }
        trace.validated = !trace.has_errors();

        self.summary.total_traces += 1;
        for issue in &trace.validation_issues {
            match issue.level {
                Severity::Error => self.summary.total_errors += 1,
                Severity::Warning => self.summary.total_warnings += 1,
            }
        }
        let per_category = self
            .summary
            .by_category
            .entry(actor_category.to_string())
            .or_default();
        per_category.traces += 1;
        if trace.outcome == "APPROVED" {
            per_category.approved += 1;
        } else {
            per_category.rejected += 1;
        }
        *per_category
            .decisions
            .entry(trace.decision.clone())
            .or_insert(0) += 1;

        if !self.should_persist(&trace) {
            return;
        }
        self.append_record(actor_category, &trace);
        self.buffers
            .entry(actor_category.to_string())
            .or_default()
            .push(trace);
    }

    /// Whether a trace passes the configured log-level filter.
    fn should_persist(&self, trace: &DecisionTrace) -> bool {
        match self.config.log_level {
            LogLevel::Full => true,
            LogLevel::Summary => !trace.validated,
            LogLevel::ErrorsOnly => trace.has_errors(),
        }
    }

    fn append_record(&mut self, category: &str, trace: &DecisionTrace) {
        let line = match serde_json::to_string(trace) {
            Ok(line) => line,
            Err(e) => {
                log::error!("audit: cannot serialize trace {}: {e}", trace.trace_id);
                return;
            }
        };
        let path = self.category_path(category);
        let file = match self.files.entry(category.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => entry.insert(file),
                    Err(e) => {
                        log::error!("audit: cannot open {}: {e}", path.display());
                        return;
                    }
                }
            }
        };
        if let Err(e) = writeln!(file, "{line}") {
            log::error!("audit: append to {} failed: {e}", path.display());
        }
    }

    /// Write the run-level summary and export per-category CSVs.
    ///
    /// For every category with buffered traces, a flattened CSV is written
    /// (fixed core fields, then alphabetically sorted reasoning-construct
    /// fields, then debug fields last), alongside a second CSV holding only
    /// non-approved or invalid rows.
    pub fn finalize(&mut self) {
        let summary_path = self
            .config
            .output_dir
            .join(format!("{}_summary.json", self.config.experiment_name));
        let body = json!({
            "experiment": self.config.experiment_name,
            "generated_at": Utc::now().to_rfc3339(),
            "total_traces": self.summary.total_traces,
            "total_errors": self.summary.total_errors,
            "total_warnings": self.summary.total_warnings,
            "error_rate": self.summary.error_rate(),
            "warning_rate": self.summary.warning_rate(),
            "by_category": self.summary.by_category,
        });
        match serde_json::to_string_pretty(&body) {
            Ok(text) => {
                if let Err(e) = fs::write(&summary_path, text) {
                    log::error!("audit: cannot write {}: {e}", summary_path.display());
                }
            }
            Err(e) => log::error!("audit: cannot serialize summary: {e}"),
        }

        let categories: Vec<String> = self.buffers.keys().cloned().collect();
        for category in categories {
            let traces = self.buffers.get(&category).cloned().unwrap_or_default();
            if traces.is_empty() {
                continue;
            }
            self.export_csv(&category, &traces, false);
            self.export_csv(&category, &traces, true);
        }
    }

    fn export_csv(&self, category: &str, traces: &[DecisionTrace], errors_only: bool) {
        let rows: Vec<&DecisionTrace> = if errors_only {
            traces
                .iter()
                .filter(|t| t.outcome != "APPROVED" || !t.validated)
                .collect()
        } else {
            traces.iter().collect()
        };
        if errors_only && rows.is_empty() {
            return;
        }

        let reasoning_fields: BTreeSet<String> = rows
            .iter()
            .flat_map(|t| t.reasoning.keys().cloned())
            .collect();

        let mut out = String::new();
        let mut header: Vec<String> = CORE_FIELDS.iter().map(|s| s.to_string()).collect();
        header.extend(reasoning_fields.iter().cloned());
        header.push("prompt_excerpt".to_string());
        header.push("raw_output".to_string());
        out.push_str(&header.iter().map(|h| csv_escape(h)).collect::<Vec<_>>().join(","));
        out.push('\n');

        for trace in rows {
            let issues = trace
                .validation_issues
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let mut cells: Vec<String> = vec![
                trace.timestamp.clone(),
                trace.year.to_string(),
                trace.agent_id.clone(),
                trace.outcome.clone(),
                trace.retry_count.to_string(),
                trace.decision.clone(),
                trace.validated.to_string(),
                issues,
            ];
            for field in &reasoning_fields {
                cells.push(trace.reasoning.get(field).cloned().unwrap_or_default());
            }
            cells.push(truncate(&trace.raw_prompt, PROMPT_EXCERPT_LEN));
            cells.push(truncate(&trace.raw_output, OUTPUT_EXCERPT_LEN));
            out.push_str(&cells.iter().map(|c| csv_escape(c)).collect::<Vec<_>>().join(","));
            out.push('\n');
        }

        let suffix = if errors_only { "errors" } else { "traces" };
        let path = self.config.output_dir.join(format!(
            "{}_{}_{suffix}.csv",
            self.config.experiment_name, category
        ));
        if let Err(e) = fs::write(&path, out) {
            log::error!("audit: cannot write {}: {e}", path.display());
        }
    }

    /// Rename existing per-category files to timestamped backups and drop
    /// all in-memory state, so a re-run does not silently overwrite.
    pub fn reset(&mut self) {
        self.files.clear();
        self.buffers.clear();
        self.summary = AuditSummary::default();

        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let prefix = format!("{}_", self.config.experiment_name);
        let entries = match fs::read_dir(&self.config.output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!(
                    "audit: cannot scan {}: {e}",
                    self.config.output_dir.display()
                );
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !name.starts_with(&prefix) || !name.ends_with(".jsonl") {
                continue;
            }
            let backup = path.with_file_name(format!("{name}.bak_{stamp}"));
            if let Err(e) = fs::rename(&path, &backup) {
                log::error!("audit: cannot back up {}: {e}", path.display());
            }
        }
    }

    pub fn summary(&self) -> &AuditSummary {
        &self.summary
    }

    pub fn category_path(&self, category: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}_{category}.jsonl", self.config.experiment_name))
    }
}

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RuleTier;
    use tempfile::TempDir;

    fn writer(dir: &TempDir, log_level: LogLevel) -> AuditWriter {
        AuditWriter::new(AuditConfig {
            output_dir: dir.path().to_path_buf(),
            experiment_name: "exp".to_string(),
            log_level,
        })
        .unwrap()
    }

    fn error_issue() -> Value {
        json!({"level": "ERROR", "tier": "domain", "rule": "budget", "message": "over budget"})
    }

    #[test]
    fn full_level_persists_every_trace() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::Full);
        w.write_trace("household", DecisionTrace::new("hh_1", 1, "do_nothing", "APPROVED"), None);
        w.write_trace("household", DecisionTrace::new("hh_2", 1, "relocate", "APPROVED"), None);

        let content = fs::read_to_string(w.category_path("household")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn errors_only_persists_iff_an_error_issue_exists() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::ErrorsOnly);

        // No issues: not persisted.
        w.write_trace("household", DecisionTrace::new("hh_1", 1, "do_nothing", "APPROVED"), None);
        // Warning only: still not persisted.
        let mut warned = DecisionTrace::new("hh_2", 1, "do_nothing", "APPROVED");
        warned
            .validation_issues
            .push(ValidationIssue::warning(RuleTier::Domain, "w", "minor"));
        w.write_trace("household", warned, None);
        // Error-level issue: persisted.
        w.write_trace(
            "household",
            DecisionTrace::new("hh_3", 1, "do_nothing", "REJECTED"),
            Some(&[error_issue()]),
        );

        let content = fs::read_to_string(w.category_path("household")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("hh_3"));
        // Counters still saw all three traces.
        assert_eq!(w.summary().total_traces, 3);
        assert_eq!(w.summary().total_errors, 1);
        assert_eq!(w.summary().total_warnings, 1);
    }

    #[test]
    fn timestamp_and_category_are_stamped() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::Full);
        w.write_trace("insurance", DecisionTrace::new("ins_1", 2, "adjust_premium", "APPROVED"), None);
        let content = fs::read_to_string(w.category_path("insurance")).unwrap();
        let trace: DecisionTrace = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(trace.agent_type, "insurance");
        assert!(!trace.timestamp.is_empty());
        assert!(trace.validated);
    }

    #[test]
    fn plain_string_validation_results_are_normalized() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::Full);
        w.write_trace(
            "household",
            DecisionTrace::new("hh_1", 1, "do_nothing", "REJECTED"),
            Some(&[json!("missing skill line")]),
        );
        let content = fs::read_to_string(w.category_path("household")).unwrap();
        let trace: DecisionTrace = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(!trace.validated);
        assert_eq!(trace.validation_issues[0].level, Severity::Error);
    }

    #[test]
    fn finalize_writes_summary_and_csvs() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::Full);
        let mut approved = DecisionTrace::new("hh_1", 1, "elevate_house", "APPROVED");
        approved.reasoning.insert("threat_appraisal".into(), "H".into());
        approved.reasoning.insert("coping_appraisal".into(), "M".into());
        approved.raw_prompt = "p".repeat(500);
        w.write_trace("household", approved, None);
        w.write_trace(
            "household",
            DecisionTrace::new("hh_2", 1, "do_nothing", "REJECTED"),
            Some(&[error_issue()]),
        );
        w.finalize();

        let summary: Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("exp_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["total_traces"], 2);
        assert_eq!(summary["error_rate"], "50.00%");

        let csv = fs::read_to_string(dir.path().join("exp_household_traces.csv")).unwrap();
        let header = csv.lines().next().unwrap();
        // Core fields first, sorted reasoning fields next, debug fields last.
        assert!(header.starts_with("timestamp,year,agent_id,outcome,retry_count,decision,validated,issues"));
        assert!(header.contains("coping_appraisal,threat_appraisal"));
        assert!(header.ends_with("prompt_excerpt,raw_output"));
        assert_eq!(csv.lines().count(), 3);
        // Prompt excerpt is truncated.
        assert!(!csv.contains(&"p".repeat(200)));

        let errors_csv = fs::read_to_string(dir.path().join("exp_household_errors.csv")).unwrap();
        assert_eq!(errors_csv.lines().count(), 2);
        assert!(errors_csv.contains("hh_2"));
        assert!(!errors_csv.contains("hh_1"));
    }

    #[test]
    fn reset_backs_up_existing_logs() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, LogLevel::Full);
        w.write_trace("household", DecisionTrace::new("hh_1", 1, "do_nothing", "APPROVED"), None);
        w.reset();
        assert!(!w.category_path("household").exists());
        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".bak_"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(w.summary().total_traces, 0);

        // Writing after reset starts a fresh file.
        w.write_trace("household", DecisionTrace::new("hh_9", 2, "relocate", "APPROVED"), None);
        let content = fs::read_to_string(w.category_path("household")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn csv_escaping_handles_commas_and_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
