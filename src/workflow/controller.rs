//! The training workflow controller: owns the selection, the log, the latest
//! result and the model-status cache for one dashboard session.

use std::sync::Arc;
use std::sync::mpsc::TryRecvError;

use crate::config::DashboardConfig;
use crate::error::{DashboardError, StateConflict};
use crate::model_status::{ModelInfo, ModelStatus, ModelStatusCache};
use crate::prediction::{PredictionInput, PredictionRequest, PredictionResult};
use crate::service::{DelayService, TrainingUpload};
use crate::training::{TestSplitRatio, TrainingMode, TrainingResult};
use crate::training_log::{LogAccumulator, LogEntry};
use crate::upload::{AcceptedUpload, FileValidator, UploadCandidate};

use super::jobs::{JobMessage, WorkflowJobs};
use super::machine::{self, Effect, SelectedFile, Transition, WorkflowEvent, WorkflowState};

/// What changed when background results were applied.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowUpdate {
    /// A training or retraining call settled; `state` is the workflow state
    /// after any deferred selection was applied.
    TrainingFinished {
        mode: TrainingMode,
        outcome: Result<(), DashboardError>,
        state: WorkflowState,
    },
    ModelStatusChanged(Arc<ModelInfo>),
    ModelStatusFailed(DashboardError),
    PredictionReady(PredictionResult),
    PredictionFailed(DashboardError),
}

pub struct TrainingWorkflowController {
    state: WorkflowState,
    validator: FileValidator,
    test_split: TestSplitRatio,
    selection: Option<AcceptedUpload>,
    pending_selection: Option<AcceptedUpload>,
    log: LogAccumulator,
    training_result: Option<TrainingResult>,
    last_error: Option<DashboardError>,
    model_status: ModelStatusCache,
    model_status_stale: bool,
    last_prediction: Option<PredictionResult>,
    jobs: WorkflowJobs,
}

impl TrainingWorkflowController {
    pub fn new(service: Arc<dyn DelayService>, config: &DashboardConfig) -> Self {
        let test_split = config.test_split().unwrap_or_else(|err| {
            tracing::warn!("{err}; using the default split");
            TestSplitRatio::default()
        });
        Self {
            state: WorkflowState::Idle,
            validator: FileValidator::new(config.max_upload_bytes),
            test_split,
            selection: None,
            pending_selection: None,
            log: LogAccumulator::new(),
            training_result: None,
            last_error: None,
            model_status: ModelStatusCache::new(),
            model_status_stale: false,
            last_prediction: None,
            jobs: WorkflowJobs::new(service),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn training_result(&self) -> Option<&TrainingResult> {
        self.training_result.as_ref()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.model_status.current()
    }

    pub fn last_error(&self) -> Option<&DashboardError> {
        self.last_error.as_ref()
    }

    pub fn last_prediction(&self) -> Option<&PredictionResult> {
        self.last_prediction.as_ref()
    }

    pub fn test_split(&self) -> TestSplitRatio {
        self.test_split
    }

    pub fn selected_file(&self) -> Option<&AcceptedUpload> {
        self.selection.as_ref()
    }

    /// A file chosen while a call was in flight, waiting to be applied.
    pub fn pending_file(&self) -> Option<&AcceptedUpload> {
        self.pending_selection.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.jobs.any_in_progress()
    }

    /// Start fetching model info in the background.
    pub fn load_model_status(&mut self) -> Result<(), DashboardError> {
        if self.jobs.model_status_in_progress {
            return Err(StateConflict::OperationInProgress.into());
        }
        self.jobs.start_model_status();
        Ok(())
    }

    /// Validate and select a training file.
    ///
    /// A rejected file leaves the state and the log as they were.
    pub fn select_file(&mut self, candidate: UploadCandidate) -> Result<(), DashboardError> {
        let accepted = match self.validator.validate(candidate) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                tracing::warn!("Rejected training file: {rejection}");
                let err = DashboardError::from(rejection);
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };
        let file = selected_file(&accepted);
        self.apply(WorkflowEvent::FileAccepted(file), Some(accepted))?;
        Ok(())
    }

    pub fn set_test_split(&mut self, ratio: f64) -> Result<(), DashboardError> {
        let split = TestSplitRatio::new(ratio)?;
        self.apply(WorkflowEvent::TestSplitChanged(split), None)?;
        Ok(())
    }

    /// Submit the selected file to `POST /api/train`.
    pub fn train(&mut self) -> Result<(), DashboardError> {
        self.request_training(TrainingMode::Train)
    }

    /// Submit the selected file to `POST /api/retrain`. Needs a trained model.
    pub fn retrain(&mut self) -> Result<(), DashboardError> {
        self.request_training(TrainingMode::Retrain)
    }

    /// Validate the form and start a prediction. Gated on a trained model
    /// before anything else is checked.
    pub fn request_prediction(&mut self, input: PredictionInput) -> Result<(), DashboardError> {
        if !self.model_status.is_trained() {
            return Err(StateConflict::ModelNotTrained.into());
        }
        if self.jobs.prediction_in_progress {
            return Err(StateConflict::OperationInProgress.into());
        }
        let request = PredictionRequest::try_from(input)?;
        tracing::info!(
            "Requesting prediction for route {} at {:02}h ({}, traffic {})",
            request.route_variant_id(),
            request.planned_departure_hour(),
            request.vehicle_type().as_str(),
            request.traffic_level_forecast().as_str()
        );
        self.jobs.start_prediction(request);
        Ok(())
    }

    /// Apply every finished background result without blocking.
    pub fn poll(&mut self) -> Vec<WorkflowUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.jobs.try_recv_message() {
                Ok(message) => self.handle_message(message, &mut updates),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        updates
    }

    /// Block until no call is in flight, applying results as they arrive.
    /// Follow-up calls started along the way (the post-training refresh) are
    /// waited for too.
    pub fn wait_for_jobs(&mut self) -> Vec<WorkflowUpdate> {
        let mut updates = Vec::new();
        while self.jobs.any_in_progress() {
            let Some(message) = self.jobs.recv_message() else {
                break;
            };
            self.handle_message(message, &mut updates);
        }
        updates
    }

    fn request_training(&mut self, mode: TrainingMode) -> Result<(), DashboardError> {
        let event = WorkflowEvent::TrainRequested {
            mode,
            test_split: self.test_split,
            selection: self.selection.as_ref().map(selected_file),
            model_trained: self.model_status.is_trained(),
        };
        self.apply(event, None).map_err(|conflict| {
            let err = DashboardError::from(conflict);
            self.last_error = Some(err.clone());
            err
        })
    }

    fn apply(
        &mut self,
        event: WorkflowEvent,
        mut incoming: Option<AcceptedUpload>,
    ) -> Result<(), StateConflict> {
        let Transition { next, effects } = machine::transition(self.state, event)?;
        if next != self.state {
            tracing::info!(
                "Training workflow {} -> {}",
                self.state.as_str(),
                next.as_str()
            );
        }
        self.state = next;
        for effect in effects {
            match effect {
                Effect::ResetLog => self.log.reset(),
                Effect::Log(level, message) => {
                    self.log.append(level, message);
                }
                Effect::AdoptSelection => {
                    self.selection = incoming.take();
                    self.last_error = None;
                }
                Effect::DeferSelection => {
                    if let Some(file) = incoming.take() {
                        tracing::info!("Holding {} until the current run settles", file.name());
                        self.pending_selection = Some(file);
                    }
                }
                Effect::DiscardResult => self.training_result = None,
                Effect::SetTestSplit(split) => self.test_split = split,
                Effect::IssueTraining { mode, test_split } => {
                    self.issue_training(mode, test_split)
                }
                Effect::StoreResult(result) => self.training_result = Some(result),
                Effect::RecordError(err) => self.last_error = Some(err),
                Effect::RefreshModelStatus => self.refresh_model_status(),
            }
        }
        Ok(())
    }

    fn issue_training(&mut self, mode: TrainingMode, test_split: TestSplitRatio) {
        let Some(selection) = self.selection.take() else {
            tracing::error!("No selection to submit for {}", mode.endpoint());
            return;
        };
        let (file_name, media_type, bytes) = selection.into_inner().into_parts();
        self.last_error = None;
        self.jobs.start_training(
            mode,
            TrainingUpload {
                file_name,
                media_type,
                bytes,
                test_split,
            },
        );
    }

    fn refresh_model_status(&mut self) {
        if self.jobs.model_status_in_progress {
            self.model_status_stale = true;
        } else {
            self.jobs.start_model_status();
        }
    }

    fn handle_message(&mut self, message: JobMessage, updates: &mut Vec<WorkflowUpdate>) {
        match message {
            JobMessage::TrainingSettled { mode, result } => {
                self.jobs.training_in_progress = false;
                let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
                match &result {
                    Ok(result) => tracing::info!("{} returned model {}", mode.endpoint(), result.version),
                    Err(err) => tracing::error!("{} failed: {err}", mode.endpoint()),
                }
                if let Err(conflict) = self.apply(
                    WorkflowEvent::TrainingSettled {
                        mode,
                        outcome: result,
                    },
                    None,
                ) {
                    tracing::warn!("Ignoring training result: {conflict}");
                }
                if let Some(pending) = self.pending_selection.take() {
                    let file = selected_file(&pending);
                    if let Err(conflict) = self.apply(WorkflowEvent::FileAccepted(file), Some(pending)) {
                        tracing::warn!("Dropping deferred selection: {conflict}");
                    }
                    // Adopting the deferred file must not hide this run's failure.
                    if let Err(err) = &outcome {
                        self.last_error = Some(err.clone());
                    }
                }
                updates.push(WorkflowUpdate::TrainingFinished {
                    mode,
                    outcome,
                    state: self.state,
                });
            }
            JobMessage::ModelStatusLoaded(result) => {
                self.jobs.model_status_in_progress = false;
                match result {
                    Ok(info) => {
                        let info = self.model_status.replace(info);
                        updates.push(WorkflowUpdate::ModelStatusChanged(info));
                    }
                    Err(err) => {
                        tracing::error!("Model status refresh failed: {err}");
                        updates.push(WorkflowUpdate::ModelStatusFailed(err));
                    }
                }
                if std::mem::take(&mut self.model_status_stale) {
                    self.jobs.start_model_status();
                }
            }
            JobMessage::PredictionSettled(result) => {
                self.jobs.prediction_in_progress = false;
                match result.and_then(|response| PredictionResult::from_response(&response)) {
                    Ok(prediction) => {
                        tracing::info!(
                            "Prediction: p={:.3} risk={}",
                            prediction.probability,
                            prediction.risk_level.label()
                        );
                        self.last_prediction = Some(prediction.clone());
                        updates.push(WorkflowUpdate::PredictionReady(prediction));
                    }
                    Err(err) => {
                        tracing::error!("Prediction failed: {err}");
                        updates.push(WorkflowUpdate::PredictionFailed(err));
                    }
                }
            }
        }
    }
}

fn selected_file(upload: &AcceptedUpload) -> SelectedFile {
    SelectedFile {
        name: upload.name().to_string(),
        size_bytes: upload.size_bytes(),
    }
}
