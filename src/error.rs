//! Error taxonomy shared by the workflow controller and the service client.
//!
//! Validation and state-conflict errors are raised locally before any network
//! call. Network, service and invalid-response errors come back from the
//! remote delay service.

use thiserror::Error;

use crate::upload::UploadRejection;

/// Fallback shown when the service answered with an error but no detail.
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";
/// Fallback shown when a transport failure carries no description.
pub const GENERIC_NETWORK_MESSAGE: &str = "network error, service unreachable";

/// Any failure the dashboard workflow can report to the operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    /// Input rejected locally before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Operation not allowed in the current workflow state.
    #[error(transparent)]
    StateConflict(#[from] StateConflict),
    /// Transport failure or timeout talking to the service.
    #[error("Network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("Service error (HTTP {status}): {}", .detail.as_deref().unwrap_or(UNKNOWN_ERROR_MESSAGE))]
    Service {
        /// HTTP status code.
        status: u16,
        /// Structured `detail` message, when the body carried one.
        detail: Option<String>,
    },
    /// A success response whose body could not be interpreted.
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint path that produced the body.
        endpoint: String,
        /// What was wrong with it.
        reason: String,
    },
    /// A worker stopped before it could report, e.g. after a panic.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    /// Message surfaced to the operator and written into the training log.
    pub fn operator_message(&self) -> String {
        match self {
            Self::Network(message) if message.trim().is_empty() => {
                GENERIC_NETWORK_MESSAGE.to_string()
            }
            Self::Network(message) => message.clone(),
            Self::Service { detail, .. } => detail
                .as_deref()
                .map(str::trim)
                .filter(|detail| !detail.is_empty())
                .unwrap_or(UNKNOWN_ERROR_MESSAGE)
                .to_string(),
            other => other.to_string(),
        }
    }

    /// True for errors raised locally, before the service was contacted.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::StateConflict(_))
    }
}

impl From<UploadRejection> for DashboardError {
    fn from(rejection: UploadRejection) -> Self {
        Self::Validation(ValidationError::Upload(rejection))
    }
}

/// Local validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The selected file failed type or size checks.
    #[error(transparent)]
    Upload(#[from] UploadRejection),
    /// Test split ratio outside [0.10, 0.50] or off the 0.05 grid.
    #[error("Test split ratio {0} must be between 0.10 and 0.50 in steps of 0.05")]
    TestSplitOutOfRange(f64),
    /// A prediction field is missing or out of range.
    #[error("Invalid field `{field}`: {reason}")]
    Field {
        /// Wire name of the field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

/// Requests that conflict with the current workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateConflict {
    /// A call of the same kind is still in flight.
    #[error("Another operation is already in progress")]
    OperationInProgress,
    /// The remote model has not been trained yet.
    #[error("Model must be trained first")]
    ModelNotTrained,
    /// Training was requested without a selected CSV file.
    #[error("Select a CSV file first")]
    NoFileSelected,
}
