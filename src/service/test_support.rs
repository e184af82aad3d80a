//! In-process [`DelayService`] double for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};

use crate::error::DashboardError;
use crate::model_status::ModelInfo;
use crate::prediction::{PredictionRequest, PredictionResponse};
use crate::training::{MetricsSnapshot, TrainingMode, TrainingResult};

use super::{DelayService, FeatureImportance, HealthStatus, TrainingUpload};

/// Scripted service that counts calls and can hold a training call open.
pub(crate) struct FakeService {
    model_info: Mutex<Result<ModelInfo, DashboardError>>,
    model_info_calls: AtomicUsize,
    train_results: Mutex<VecDeque<Result<TrainingResult, DashboardError>>>,
    train_calls: Mutex<Vec<(TrainingMode, TrainingUpload)>>,
    train_gate: Mutex<Option<mpsc::Receiver<()>>>,
    train_panics: AtomicBool,
    prediction: Mutex<Result<PredictionResponse, DashboardError>>,
    predict_calls: AtomicUsize,
}

/// Releases a training call parked by [`FakeService::hold_training`].
pub(crate) struct TrainingGate(mpsc::Sender<()>);

impl TrainingGate {
    pub(crate) fn release(self) {
        let _ = self.0.send(());
    }
}

pub(crate) fn training_result(version: &str, warnings: &[&str]) -> TrainingResult {
    TrainingResult {
        version: version.to_string(),
        training_date: "2024-05-01 10:00:00".to_string(),
        metrics: MetricsSnapshot {
            accuracy: 0.87,
            auc: 0.91,
            train_size: 64,
            test_size: 16,
            confusion_matrix: None,
        },
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
    }
}

pub(crate) fn trained_info(version: &str) -> ModelInfo {
    ModelInfo {
        is_trained: true,
        version: version.to_string(),
        ..ModelInfo::default()
    }
}

impl FakeService {
    pub(crate) fn new() -> Self {
        Self {
            model_info: Mutex::new(Ok(ModelInfo::default())),
            model_info_calls: AtomicUsize::new(0),
            train_results: Mutex::new(VecDeque::new()),
            train_calls: Mutex::new(Vec::new()),
            train_gate: Mutex::new(None),
            train_panics: AtomicBool::new(false),
            prediction: Mutex::new(Ok(PredictionResponse::default())),
            predict_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_model_info(&self, info: ModelInfo) {
        *self.model_info.lock().unwrap() = Ok(info);
    }

    pub(crate) fn fail_model_info(&self, err: DashboardError) {
        *self.model_info.lock().unwrap() = Err(err);
    }

    pub(crate) fn model_info_calls(&self) -> usize {
        self.model_info_calls.load(Ordering::SeqCst)
    }

    /// Queue the outcome of the next training call. An empty queue answers
    /// with a plain success.
    pub(crate) fn push_train_result(&self, result: Result<TrainingResult, DashboardError>) {
        self.train_results.lock().unwrap().push_back(result);
    }

    /// Make the next training call block until the gate is released.
    pub(crate) fn hold_training(&self) -> TrainingGate {
        let (tx, rx) = mpsc::channel();
        *self.train_gate.lock().unwrap() = Some(rx);
        TrainingGate(tx)
    }

    /// Make the next training call panic on its worker thread.
    pub(crate) fn panic_next_training(&self) {
        self.train_panics.store(true, Ordering::SeqCst);
    }

    pub(crate) fn train_calls(&self) -> Vec<(TrainingMode, TrainingUpload)> {
        self.train_calls.lock().unwrap().clone()
    }

    pub(crate) fn set_prediction(&self, result: Result<PredictionResponse, DashboardError>) {
        *self.prediction.lock().unwrap() = result;
    }

    pub(crate) fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }
}

impl DelayService for FakeService {
    fn health(&self) -> Result<HealthStatus, DashboardError> {
        Ok(HealthStatus {
            status: "healthy".into(),
            model_loaded: self.model_info.lock().unwrap().as_ref().is_ok_and(|i| i.is_trained),
            model_version: None,
        })
    }

    fn model_info(&self) -> Result<ModelInfo, DashboardError> {
        self.model_info_calls.fetch_add(1, Ordering::SeqCst);
        self.model_info.lock().unwrap().clone()
    }

    fn train(
        &self,
        mode: TrainingMode,
        upload: &TrainingUpload,
    ) -> Result<TrainingResult, DashboardError> {
        self.train_calls.lock().unwrap().push((mode, upload.clone()));
        let gate = self.train_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if self.train_panics.swap(false, Ordering::SeqCst) {
            panic!("model backend crashed");
        }
        self.train_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(training_result("1.0.0", &[])))
    }

    fn predict(&self, _request: &PredictionRequest) -> Result<PredictionResponse, DashboardError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        self.prediction.lock().unwrap().clone()
    }

    fn metrics(&self) -> Result<MetricsSnapshot, DashboardError> {
        Ok(training_result("1.0.0", &[]).metrics)
    }

    fn feature_importance(&self) -> Result<Vec<FeatureImportance>, DashboardError> {
        Ok(Vec::new())
    }
}
