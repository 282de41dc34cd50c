//! Construction-time configuration errors.
//!
//! Steady-state per-decision processing never raises these; malformed
//! generation output, permission denials, and validation failures are all
//! ordinary data. Errors are reserved for unusable configuration discovered
//! while building a component.

use thiserror::Error;

/// Errors raised while constructing core components from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A role table could not be parsed.
    #[error("role table parse error: {message}")]
    RoleTable { message: String },

    /// A sensor declaration could not be parsed.
    #[error("sensor config parse error: {message}")]
    SensorConfig { message: String },

    /// A classifier lexicon contained an invalid pattern.
    #[error("lexicon pattern error: {message}")]
    Lexicon { message: String },

    /// The audit output directory could not be prepared.
    #[error("audit setup error: {message}")]
    AuditSetup { message: String },

    /// Underlying I/O failure while loading configuration.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
