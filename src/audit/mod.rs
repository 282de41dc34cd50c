//! # Audit Trail
//!
//! Durable, per-actor-category trace logging with summary aggregation and
//! CSV export. One trace is appended per finalized decision; traces are
//! append-only and never mutated after write. Audit I/O failures are
//! logged and swallowed; they never abort a simulation step.

pub mod trace;
pub mod writer;

pub use trace::{AuditConfig, AuditSummary, CategorySummary, DecisionTrace, LogLevel};
pub use writer::AuditWriter;
