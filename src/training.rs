//! Training-domain values: split ratio, metrics and the result of a run.

use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

const SPLIT_MIN_PERCENT: u8 = 10;
const SPLIT_MAX_PERCENT: u8 = 50;
const SPLIT_STEP_PERCENT: u8 = 5;
const SPLIT_DEFAULT_PERCENT: u8 = 20;

/// Fraction of rows the service holds out for testing.
///
/// Stored as whole percent so the 0.05 grid is exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TestSplitRatio(u8);

impl TestSplitRatio {
    pub fn new(ratio: f64) -> Result<Self, ValidationError> {
        let scaled = ratio * 100.0;
        if !scaled.is_finite() {
            return Err(ValidationError::TestSplitOutOfRange(ratio));
        }
        let percent = scaled.round();
        if (scaled - percent).abs() > 1e-6
            || percent < f64::from(SPLIT_MIN_PERCENT)
            || percent > f64::from(SPLIT_MAX_PERCENT)
        {
            return Err(ValidationError::TestSplitOutOfRange(ratio));
        }
        let percent = percent as u8;
        if percent % SPLIT_STEP_PERCENT != 0 {
            return Err(ValidationError::TestSplitOutOfRange(ratio));
        }
        Ok(Self(percent))
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl Default for TestSplitRatio {
    fn default() -> Self {
        Self(SPLIT_DEFAULT_PERCENT)
    }
}

impl fmt::Display for TestSplitRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

/// Which training endpoint a run targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrainingMode {
    /// `POST /api/train`: fit a model from scratch.
    Train,
    /// `POST /api/retrain`: refit an already-trained model.
    Retrain,
}

impl TrainingMode {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Train => "/api/train",
            Self::Retrain => "/api/retrain",
        }
    }

    pub(crate) fn verb(self) -> &'static str {
        match self {
            Self::Train => "training",
            Self::Retrain => "retraining",
        }
    }
}

/// 2x2 confusion matrix, rows are actual classes and columns predicted ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix(pub [[u64; 2]; 2]);

impl ConfusionMatrix {
    /// Accept only a well-formed 2x2 matrix.
    pub fn from_rows(rows: &[Vec<u64>]) -> Option<Self> {
        match rows {
            [first, second] if first.len() == 2 && second.len() == 2 => {
                Some(Self([[first[0], first[1]], [second[0], second[1]]]))
            }
            _ => None,
        }
    }
}

/// Performance figures reported by the service after a fit.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub accuracy: f64,
    pub auc: f64,
    pub train_size: u64,
    pub test_size: u64,
    pub confusion_matrix: Option<ConfusionMatrix>,
}

/// Outcome of one successful training call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingResult {
    pub version: String,
    pub training_date: String,
    pub metrics: MetricsSnapshot,
    pub warnings: Vec<String>,
}

impl TrainingResult {
    /// Log lines recorded after a successful run, in display order.
    pub(crate) fn summary_lines(&self) -> [String; 5] {
        [
            format!("Model version: {}", self.version),
            format!("Accuracy: {:.2}%", self.metrics.accuracy * 100.0),
            format!("AUC-ROC: {:.4}", self.metrics.auc),
            format!("Training samples: {}", self.metrics.train_size),
            format!("Test samples: {}", self.metrics.test_size),
        ]
    }
}
