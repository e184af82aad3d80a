//! Cached view of the remote model's trained/untrained status.
//!
//! The cache has a single writer (the workflow controller) and hands readers
//! immutable `Arc` snapshots, so a reader holding a snapshot never sees it
//! change underneath it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::DashboardError;
use crate::service::DelayService;
use crate::training::MetricsSnapshot;

/// Version reported for a model that was never trained.
pub const UNTRAINED_VERSION: &str = "0.0.0";

/// Metadata about the remote model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelInfo {
    pub is_trained: bool,
    pub version: String,
    pub training_date: Option<String>,
    pub categorical_features: BTreeSet<String>,
    pub numerical_features: BTreeSet<String>,
    pub last_metrics: Option<MetricsSnapshot>,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            is_trained: false,
            version: UNTRAINED_VERSION.to_string(),
            training_date: None,
            categorical_features: BTreeSet::new(),
            numerical_features: BTreeSet::new(),
            last_metrics: None,
        }
    }
}

/// What the cache currently knows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ModelStatus {
    /// No fetch has completed yet.
    #[default]
    NotLoaded,
    Loaded(Arc<ModelInfo>),
}

impl ModelStatus {
    /// A status that was never loaded counts as untrained.
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Loaded(info) if info.is_trained)
    }

    pub fn info(&self) -> Option<&Arc<ModelInfo>> {
        match self {
            Self::NotLoaded => None,
            Self::Loaded(info) => Some(info),
        }
    }
}

/// Single-owner cache of [`ModelInfo`].
#[derive(Clone, Debug, Default)]
pub struct ModelStatusCache {
    current: ModelStatus,
}

impl ModelStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the last fetched value, or [`ModelStatus::NotLoaded`].
    pub fn current(&self) -> ModelStatus {
        self.current.clone()
    }

    pub fn is_trained(&self) -> bool {
        self.current.is_trained()
    }

    /// Fetch model info and replace the cached snapshot. On failure the
    /// previous snapshot is kept.
    pub fn refresh(&mut self, service: &dyn DelayService) -> Result<Arc<ModelInfo>, DashboardError> {
        let info = service.model_info()?;
        Ok(self.replace(info))
    }

    /// Install a fetched value as the new snapshot.
    pub(crate) fn replace(&mut self, info: ModelInfo) -> Arc<ModelInfo> {
        let info = Arc::new(info);
        if let ModelStatus::Loaded(previous) = &self.current
            && previous.version != info.version
        {
            tracing::info!(
                "Model version changed: {} -> {}",
                previous.version,
                info.version
            );
        }
        self.current = ModelStatus::Loaded(Arc::clone(&info));
        info
    }
}
