//! Client core for the delivery-delay dashboard.
//!
//! The crate validates training uploads, drives the training workflow against
//! the remote prediction service, keeps the per-attempt training log, caches
//! the model status and bands delay probabilities into risk levels.

/// Application directory resolution.
pub mod app_dirs;
/// Settings file loading.
pub mod config;
/// Error taxonomy.
pub mod error;
pub(crate) mod http_client;
/// Tracing subscriber setup.
pub mod logging;
/// Cached model status.
pub mod model_status;
/// Prediction requests and results.
pub mod prediction;
/// Probability to risk-band mapping.
pub mod risk;
/// Remote service seam and HTTP client.
pub mod service;
/// Training values and results.
pub mod training;
/// Per-attempt training log.
pub mod training_log;
/// Upload candidates and validation.
pub mod upload;
/// Training workflow state machine and controller.
pub mod workflow;

pub use error::{DashboardError, StateConflict, ValidationError};
pub use workflow::{TrainingWorkflowController, WorkflowState, WorkflowUpdate};
