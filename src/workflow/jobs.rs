//! Worker threads for remote calls and the channel they report on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use crate::error::DashboardError;
use crate::model_status::ModelInfo;
use crate::prediction::{PredictionRequest, PredictionResponse};
use crate::service::{DelayService, TrainingUpload};
use crate::training::{TrainingMode, TrainingResult};

pub(crate) enum JobMessage {
    TrainingSettled {
        mode: TrainingMode,
        result: Result<TrainingResult, DashboardError>,
    },
    ModelStatusLoaded(Result<ModelInfo, DashboardError>),
    PredictionSettled(Result<PredictionResponse, DashboardError>),
}

/// Spawns one thread per call and tracks which kinds are in flight.
pub(crate) struct WorkflowJobs {
    service: Arc<dyn DelayService>,
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
    pub(super) training_in_progress: bool,
    pub(super) model_status_in_progress: bool,
    pub(super) prediction_in_progress: bool,
}

impl WorkflowJobs {
    pub(super) fn new(service: Arc<dyn DelayService>) -> Self {
        let (message_tx, message_rx) = mpsc::channel();
        Self {
            service,
            message_tx,
            message_rx,
            training_in_progress: false,
            model_status_in_progress: false,
            prediction_in_progress: false,
        }
    }

    pub(super) fn any_in_progress(&self) -> bool {
        self.training_in_progress || self.model_status_in_progress || self.prediction_in_progress
    }

    pub(super) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    /// Block until the next message. `None` only if every sender is gone,
    /// which cannot happen while `self` holds one.
    pub(super) fn recv_message(&self) -> Option<JobMessage> {
        self.message_rx.recv().ok()
    }

    pub(super) fn start_training(&mut self, mode: TrainingMode, upload: TrainingUpload) {
        self.training_in_progress = true;
        let service = Arc::clone(&self.service);
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = settle(mode.endpoint(), || service.train(mode, &upload));
            let _ = tx.send(JobMessage::TrainingSettled { mode, result });
        });
    }

    pub(super) fn start_model_status(&mut self) {
        self.model_status_in_progress = true;
        let service = Arc::clone(&self.service);
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = settle("/api/model/info", || service.model_info());
            let _ = tx.send(JobMessage::ModelStatusLoaded(result));
        });
    }

    pub(super) fn start_prediction(&mut self, request: PredictionRequest) {
        self.prediction_in_progress = true;
        let service = Arc::clone(&self.service);
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = settle("/api/predict", || service.predict(&request));
            let _ = tx.send(JobMessage::PredictionSettled(result));
        });
    }
}

/// Run a service call, turning a panic into an error so the job still settles.
fn settle<T>(
    endpoint: &str,
    call: impl FnOnce() -> Result<T, DashboardError>,
) -> Result<T, DashboardError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let reason = panic_reason(&*payload);
        tracing::error!("Worker for {endpoint} panicked: {reason}");
        Err(DashboardError::Internal(format!(
            "{endpoint} worker stopped: {reason}"
        )))
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason
    } else {
        "unknown panic"
    }
}
