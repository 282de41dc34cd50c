//! # simgov
//!
//! Governance and monitoring core for LLM-driven multi-agent social
//! simulations. A generation collaborator proposes actions ("skills") for
//! simulated economic actors (households, insurers, regulators,
//! irrigators), and this crate decides whether each proposal may execute:
//! it parses free-form output into a structured proposal, checks it against
//! a role table and domain validators, retries with corrective prompts up
//! to a bound, and writes one audit trace per finalized decision.
//!
//! Alongside the pipeline, companion monitors watch the population of
//! decisions over time: a symbolic context monitor scores state novelty and
//! selects a processing mode, a drift detector flags behavioral collapse
//! and stagnation, and a reflection trigger schedules memory-consolidation
//! passes.

pub mod adapter;
pub mod audit;
pub mod classify;
pub mod context;
pub mod drift;
pub mod errors;
pub mod executor;
pub mod monitor;
pub mod policy;
pub mod reflection;
pub mod validation;

pub use adapter::{OutputAdapter, ParseContext, SkillProposal};
pub use audit::{AuditConfig, AuditSummary, AuditWriter, DecisionTrace, LogLevel};
pub use classify::{ConstructClassifier, KeywordLexicon};
pub use context::ContextBuilder;
pub use drift::{DriftConfig, DriftDetector, DriftReport, IndividualDriftReport};
pub use errors::ConfigError;
pub use executor::{
    DecisionExecutor, DecisionOutcome, DecisionRecord, GenerationError, GenerationProvider,
};
pub use monitor::{
    ContextMonitor, LaplaceSurprise, NoveltySurprise, ProcessingMode, Sensor, SensorBin,
    SignatureEngine, SurpriseModel,
};
pub use policy::{default_role_table, PermissionResult, RoleEnforcer, RolePermissions, RoleTable};
pub use reflection::{
    should_reflect, should_reflect_triggered, ReflectionTriggerConfig, TriggerKind,
};
pub use validation::{
    ConfidenceValidator, KnownSkillValidator, RuleTier, Severity, SkillValidator, ValidationIssue,
};

/// Library version.
pub const VERSION: &str = "0.4.1";
