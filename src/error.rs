//! Centralized error handling for the ETL pipeline.
//!
//! Every fatal condition the pipeline can hit is a variant of [`EtlError`].
//! Quality-gate and join failures carry the dataset, column and offending
//! value so the message alone is enough to find the bad record:
//!
//! ```
//! use orders_etl::error::EtlError;
//!
//! fn describe(err: &EtlError) -> &'static str {
//!     match err {
//!         EtlError::SchemaViolation { .. } => "missing column",
//!         EtlError::UniquenessViolation { .. } | EtlError::NullKey { .. } => "bad key",
//!         EtlError::CardinalityViolation { .. } => "join fan-out",
//!         _ => "other",
//!     }
//! }
//! ```
//!
//! Coercion failures have no variant: unparseable values become null and
//! are counted, they never abort a run.

use std::fmt;
use std::path::PathBuf;

/// Main error type for pipeline operations.
#[derive(Debug)]
pub enum EtlError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Data processing errors (Polars)
    DataProcessing(String),

    /// Invalid settings or arguments
    Config(String),

    /// None of the candidate input locations exist
    NotFound { candidates: Vec<PathBuf> },

    /// A required column is absent
    SchemaViolation { dataset: String, column: String },

    /// A dataset that must have rows has none
    EmptyDataset { dataset: String },

    /// A declared key repeats
    UniquenessViolation {
        dataset: String,
        key: String,
        value: String,
    },

    /// A declared key is null where nulls are not allowed
    NullKey {
        dataset: String,
        key: String,
        count: usize,
    },

    /// A value falls outside a declared inclusive bound
    RangeViolation {
        column: String,
        value: f64,
        lo: Option<f64>,
        hi: Option<f64>,
    },

    /// A join side expected to be unique on the key is not
    CardinalityViolation {
        side: &'static str,
        expectation: String,
        key: String,
        value: String,
    },

    /// Post-join row count differs from the left input
    RowCountInvariantBroken { expected: usize, actual: usize },

    /// Generic error with context
    Other(String),
}

fn fmt_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "-".to_owned(), |b| b.to_string())
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::NotFound { candidates } => {
                let list = candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "No input found, tried: {list}")
            }
            Self::SchemaViolation { dataset, column } => {
                write!(f, "Schema violation: {dataset} is missing required column '{column}'")
            }
            Self::EmptyDataset { dataset } => write!(f, "Empty dataset: {dataset} has no rows"),
            Self::UniquenessViolation {
                dataset,
                key,
                value,
            } => write!(
                f,
                "Uniqueness violation: {dataset}.{key} contains duplicate value '{value}'"
            ),
            Self::NullKey {
                dataset,
                key,
                count,
            } => write!(f, "Null key: {dataset}.{key} contains {count} missing value(s)"),
            Self::RangeViolation { column, value, lo, hi } => write!(
                f,
                "Range violation: {column} has value {value} outside [{}, {}]",
                fmt_bound(*lo),
                fmt_bound(*hi)
            ),
            Self::CardinalityViolation {
                side,
                expectation,
                key,
                value,
            } => write!(
                f,
                "Cardinality violation: {expectation} join expects unique {side} keys, \
                 but {key} = '{value}' repeats"
            ),
            Self::RowCountInvariantBroken { expected, actual } => write!(
                f,
                "Row count invariant broken: expected {expected} rows after join, got {actual}"
            ),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for EtlError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<EtlError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: EtlError = e.into();
            EtlError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: EtlError = e.into();
            EtlError::Other(format!("{}: {}", f(), err))
        })
    }
}
