//! Store error types.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by audit and role store implementations.
///
/// `Unavailable` is deliberately distinct from an empty result so that
/// callers can tell a backend outage apart from "no matching data" and
/// apply their own fail-open/fail-closed policy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing store unreachable or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Malformed query or filter.
    #[error("query error: {0}")]
    Query(String),

    /// Record could not be serialized for persistence.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Query(_) => "STORE_QUERY_ERROR",
            Self::Serialization(_) => "STORE_SERIALIZATION_ERROR",
        }
    }
}
