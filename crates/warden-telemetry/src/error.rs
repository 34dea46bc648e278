//! Telemetry error types.

use thiserror::Error;
use warden_core::StoreError;

/// Telemetry result type.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised inside the telemetry pipeline.
///
/// None of these reach callers of the fire-and-forget logging API; they
/// are caught at the boundary and written to the local log.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Audit store failure.
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),

    /// Geolocation collaborator failure.
    #[error("geolocation error: {0}")]
    Geolocation(String),

    /// Notification collaborator failure.
    #[error("notification error: {0}")]
    Notification(String),

    /// Record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "AUDIT_STORE_ERROR",
            Self::Geolocation(_) => "GEOLOCATION_ERROR",
            Self::Notification(_) => "NOTIFICATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
