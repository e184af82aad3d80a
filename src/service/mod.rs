//! The remote delay-prediction service, seen through a fixed set of calls.
//!
//! [`DelayService`] is the seam the workflow controller talks to;
//! [`HttpDelayService`] implements it over HTTP+JSON.

pub mod api;
mod wire;

#[cfg(test)]
pub(crate) mod test_support;

use serde::Serialize;

use crate::error::DashboardError;
use crate::model_status::ModelInfo;
use crate::prediction::{PredictionRequest, PredictionResponse};
use crate::training::{MetricsSnapshot, TestSplitRatio, TrainingMode, TrainingResult};

pub use api::HttpDelayService;

/// Liveness answer from `GET /api/health`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub model_version: Option<String>,
}

/// One entry of `GET /api/features/importance`, in service order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// A training submission: the CSV content plus the requested split.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingUpload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    pub test_split: TestSplitRatio,
}

/// Calls the dashboard makes against the remote service.
///
/// Implementations block the calling thread; the workflow controller runs
/// them on worker threads.
pub trait DelayService: Send + Sync {
    fn health(&self) -> Result<HealthStatus, DashboardError>;

    /// Model metadata. An untrained model is a normal answer, not an error.
    fn model_info(&self) -> Result<ModelInfo, DashboardError>;

    fn train(
        &self,
        mode: TrainingMode,
        upload: &TrainingUpload,
    ) -> Result<TrainingResult, DashboardError>;

    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, DashboardError>;

    fn metrics(&self) -> Result<MetricsSnapshot, DashboardError>;

    fn feature_importance(&self) -> Result<Vec<FeatureImportance>, DashboardError>;
}
