//! Access control error types.

use thiserror::Error;
use warden_core::StoreError;

/// Access control result type.
pub type AccessResult<T> = Result<T, AccessError>;

/// Access control errors.
///
/// These never cross the public decision boundary; `check_permission`
/// maps any of them to a closed decision.
#[derive(Error, Debug)]
pub enum AccessError {
    /// Role store failure.
    #[error("role store error: {0}")]
    RoleStore(#[from] StoreError),

    /// Internal evaluation failure.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl AccessError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoleStore(_) => "ROLE_STORE_ERROR",
            Self::Evaluation(_) => "EVALUATION_ERROR",
        }
    }
}
