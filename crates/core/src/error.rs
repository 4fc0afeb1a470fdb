//! Error types for the smoke pipeline core
//!
//! Three families of failure are kept apart so callers can decide what to skip:
//! - [`ConfigError`]: malformed or incomplete configuration, always names the field
//! - [`FireDataError`]: a single fire lacks data an operation needs
//! - [`WorkerError`]: tranche workers failing during a dispersion run
//!
//! Stage-level errors ([`FilterError`], [`MergeError`]) wrap the first two with the
//! filter name or fire id attached.

use thiserror::Error;

/// Malformed or incomplete configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required key is absent
    #[error("Missing required config field '{0}'")]
    MissingField(String),
    /// A key is present but its value is unusable
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
    /// The configuration document could not be deserialized
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        ConfigError::MissingField(field.into())
    }

    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A fire record lacks or carries inconsistent data for an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FireDataError {
    #[error("Missing location information")]
    MissingLocation,
    #[error("Missing area")]
    MissingArea,
    #[error("Negative area: {0}")]
    NegativeArea(f64),
    #[error("Conflicting meta field '{0}'")]
    MetaConflict(String),
    #[error("Fire type mismatch: {0} vs {1}")]
    TypeMismatch(String, String),
    #[error("Fuel type mismatch: {0} vs {1}")]
    FuelTypeMismatch(String, String),
    #[error("Incompatible payload shapes: {0}")]
    PayloadShape(String),
}

/// Failure of a filter pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid '{filter}' filter config: {source}")]
    Config {
        filter: String,
        #[source]
        source: ConfigError,
    },
    #[error("Failed to filter fire {fire_id}: {source}")]
    Fire {
        fire_id: String,
        #[source]
        source: FireDataError,
    },
}

/// Failure of a merge pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("Failed to merge fire {fire_id}: {source}")]
    Fire {
        fire_id: String,
        #[source]
        source: FireDataError,
    },
}

/// Failure of a tranche worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Working directory setup failed
    #[error("Worker I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// Transient failure (no free slot, busy resource); retried with backoff
    #[error("Resource unavailable: {0}")]
    Resource(String),
    /// Failure caused by the tranche data itself; never retried
    #[error("Worker failed: {0}")]
    Domain(String),
    /// A specific tranche failed
    #[error("Tranche {index} failed: {source}")]
    Tranche {
        index: usize,
        #[source]
        source: Box<WorkerError>,
    },
}

impl WorkerError {
    /// Whether a retry could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Resource(_))
    }
}
