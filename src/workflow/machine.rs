//! Pure state machine for the training workflow.
//!
//! [`transition`] never touches the network or the log. It returns the next
//! state and the effects the controller must carry out, in order.

use crate::error::{DashboardError, StateConflict};
use crate::training::{TestSplitRatio, TrainingMode, TrainingResult};
use crate::training_log::LogLevel;
use crate::upload::format_kilobytes;

/// Where the training workflow currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    #[default]
    Idle,
    FileSelected,
    Submitting,
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FileSelected => "file_selected",
            Self::Submitting => "submitting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Name and size of an accepted file, as shown in the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
}

impl SelectedFile {
    fn log_message(&self) -> String {
        format!(
            "Selected file: {} ({})",
            self.name,
            format_kilobytes(self.size_bytes)
        )
    }
}

/// Inputs to the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowEvent {
    /// A file passed validation.
    FileAccepted(SelectedFile),
    /// The operator asked for a training or retraining run.
    TrainRequested {
        mode: TrainingMode,
        test_split: TestSplitRatio,
        /// The file currently selected, if any.
        selection: Option<SelectedFile>,
        /// Whether the cached model status reports a trained model.
        model_trained: bool,
    },
    TestSplitChanged(TestSplitRatio),
    /// The outstanding training call returned.
    TrainingSettled {
        mode: TrainingMode,
        outcome: Result<TrainingResult, DashboardError>,
    },
}

/// Work the controller performs after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    ResetLog,
    Log(LogLevel, String),
    /// Make the just-accepted file the current selection.
    AdoptSelection,
    /// Hold the just-accepted file until the in-flight call settles.
    DeferSelection,
    DiscardResult,
    SetTestSplit(TestSplitRatio),
    /// Hand the current selection to the service.
    IssueTraining {
        mode: TrainingMode,
        test_split: TestSplitRatio,
    },
    StoreResult(TrainingResult),
    RecordError(DashboardError),
    RefreshModelStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: WorkflowState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: WorkflowState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }
}

/// Compute the next state and effects for `event` in `state`.
///
/// A conflict leaves the state untouched and produces no effects.
pub fn transition(state: WorkflowState, event: WorkflowEvent) -> Result<Transition, StateConflict> {
    use WorkflowState::*;

    match event {
        WorkflowEvent::FileAccepted(file) => Ok(match state {
            Submitting => Transition {
                next: Submitting,
                effects: vec![Effect::DeferSelection],
            },
            Idle | FileSelected => Transition {
                next: FileSelected,
                effects: vec![
                    Effect::AdoptSelection,
                    Effect::Log(LogLevel::Info, file.log_message()),
                ],
            },
            Succeeded | Failed => Transition {
                next: FileSelected,
                effects: vec![
                    Effect::DiscardResult,
                    Effect::AdoptSelection,
                    Effect::Log(LogLevel::Info, file.log_message()),
                ],
            },
        }),
        WorkflowEvent::TrainRequested {
            mode,
            test_split,
            selection,
            model_trained,
        } => {
            if state == Submitting {
                return Err(StateConflict::OperationInProgress);
            }
            let file = match (state, selection) {
                (FileSelected, Some(file)) => file,
                _ => return Err(StateConflict::NoFileSelected),
            };
            if mode == TrainingMode::Retrain && !model_trained {
                return Err(StateConflict::ModelNotTrained);
            }
            Ok(Transition {
                next: Submitting,
                effects: vec![
                    Effect::ResetLog,
                    Effect::Log(LogLevel::Info, file.log_message()),
                    Effect::Log(
                        LogLevel::Info,
                        format!(
                            "Starting model {} (test split: {}%)",
                            mode.verb(),
                            test_split.percent()
                        ),
                    ),
                    Effect::IssueTraining { mode, test_split },
                ],
            })
        }
        WorkflowEvent::TestSplitChanged(split) => {
            if state == Submitting {
                return Err(StateConflict::OperationInProgress);
            }
            Ok(Transition {
                next: state,
                effects: vec![Effect::SetTestSplit(split)],
            })
        }
        WorkflowEvent::TrainingSettled { mode, outcome } => {
            if state != Submitting {
                return Ok(Transition::stay(state));
            }
            Ok(match outcome {
                Ok(result) => {
                    let mut effects = vec![Effect::Log(
                        LogLevel::Success,
                        format!("Model {} completed successfully", mode.verb()),
                    )];
                    effects.extend(
                        result
                            .summary_lines()
                            .into_iter()
                            .map(|line| Effect::Log(LogLevel::Info, line)),
                    );
                    effects.extend(
                        result
                            .warnings
                            .iter()
                            .map(|warning| Effect::Log(LogLevel::Warning, warning.clone())),
                    );
                    effects.push(Effect::StoreResult(result));
                    effects.push(Effect::RefreshModelStatus);
                    Transition {
                        next: Succeeded,
                        effects,
                    }
                }
                Err(err) => Transition {
                    next: Failed,
                    effects: vec![
                        Effect::Log(LogLevel::Error, format!("Error: {}", err.operator_message())),
                        Effect::RecordError(err),
                    ],
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::training_result;

    fn file() -> SelectedFile {
        SelectedFile {
            name: "entregas.csv".into(),
            size_bytes: 5 * 1024,
        }
    }

    fn train_request(selection: Option<SelectedFile>) -> WorkflowEvent {
        WorkflowEvent::TrainRequested {
            mode: TrainingMode::Train,
            test_split: TestSplitRatio::default(),
            selection,
            model_trained: false,
        }
    }

    fn log_levels(effects: &[Effect]) -> Vec<LogLevel> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Log(level, _) => Some(*level),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn accepting_a_file_from_idle_logs_selection() {
        let t = transition(WorkflowState::Idle, WorkflowEvent::FileAccepted(file())).unwrap();
        assert_eq!(t.next, WorkflowState::FileSelected);
        assert_eq!(
            t.effects,
            vec![
                Effect::AdoptSelection,
                Effect::Log(LogLevel::Info, "Selected file: entregas.csv (5.00 KB)".into()),
            ]
        );
    }

    #[test]
    fn new_file_after_settlement_discards_result() {
        for state in [WorkflowState::Succeeded, WorkflowState::Failed] {
            let t = transition(state, WorkflowEvent::FileAccepted(file())).unwrap();
            assert_eq!(t.next, WorkflowState::FileSelected);
            assert_eq!(t.effects[0], Effect::DiscardResult);
        }
    }

    #[test]
    fn file_during_submission_is_deferred() {
        let t = transition(WorkflowState::Submitting, WorkflowEvent::FileAccepted(file())).unwrap();
        assert_eq!(t.next, WorkflowState::Submitting);
        assert_eq!(t.effects, vec![Effect::DeferSelection]);
    }

    #[test]
    fn train_resets_log_and_records_selection_first() {
        let t = transition(WorkflowState::FileSelected, train_request(Some(file()))).unwrap();
        assert_eq!(t.next, WorkflowState::Submitting);
        assert_eq!(t.effects[0], Effect::ResetLog);
        assert_eq!(
            t.effects[1],
            Effect::Log(LogLevel::Info, "Selected file: entregas.csv (5.00 KB)".into())
        );
        assert_eq!(
            t.effects[2],
            Effect::Log(LogLevel::Info, "Starting model training (test split: 20%)".into())
        );
        assert_eq!(
            t.effects[3],
            Effect::IssueTraining {
                mode: TrainingMode::Train,
                test_split: TestSplitRatio::default()
            }
        );
    }

    #[test]
    fn train_conflicts() {
        assert_eq!(
            transition(WorkflowState::Submitting, train_request(Some(file()))),
            Err(StateConflict::OperationInProgress)
        );
        for state in [WorkflowState::Idle, WorkflowState::Succeeded, WorkflowState::Failed] {
            assert_eq!(
                transition(state, train_request(None)),
                Err(StateConflict::NoFileSelected)
            );
        }
    }

    #[test]
    fn retrain_requires_trained_model() {
        let event = |model_trained| WorkflowEvent::TrainRequested {
            mode: TrainingMode::Retrain,
            test_split: TestSplitRatio::default(),
            selection: Some(file()),
            model_trained,
        };
        assert_eq!(
            transition(WorkflowState::FileSelected, event(false)),
            Err(StateConflict::ModelNotTrained)
        );
        let t = transition(WorkflowState::FileSelected, event(true)).unwrap();
        assert_eq!(
            t.effects[2],
            Effect::Log(LogLevel::Info, "Starting model retraining (test split: 20%)".into())
        );
    }

    #[test]
    fn success_logs_summary_then_warnings() {
        let result = training_result("1.0.1", &["w1", "w2"]);
        let t = transition(
            WorkflowState::Submitting,
            WorkflowEvent::TrainingSettled {
                mode: TrainingMode::Train,
                outcome: Ok(result.clone()),
            },
        )
        .unwrap();
        assert_eq!(t.next, WorkflowState::Succeeded);
        assert_eq!(
            log_levels(&t.effects),
            vec![
                LogLevel::Success,
                LogLevel::Info,
                LogLevel::Info,
                LogLevel::Info,
                LogLevel::Info,
                LogLevel::Info,
                LogLevel::Warning,
                LogLevel::Warning,
            ]
        );
        let tail = &t.effects[t.effects.len() - 2..];
        assert_eq!(
            tail,
            &[Effect::StoreResult(result), Effect::RefreshModelStatus]
        );
    }

    #[test]
    fn failure_logs_one_error_entry() {
        let err = DashboardError::Service {
            status: 400,
            detail: Some("Arquivo CSV vazio".into()),
        };
        let t = transition(
            WorkflowState::Submitting,
            WorkflowEvent::TrainingSettled {
                mode: TrainingMode::Train,
                outcome: Err(err.clone()),
            },
        )
        .unwrap();
        assert_eq!(t.next, WorkflowState::Failed);
        assert_eq!(
            t.effects,
            vec![
                Effect::Log(LogLevel::Error, "Error: Arquivo CSV vazio".into()),
                Effect::RecordError(err),
            ]
        );
    }

    #[test]
    fn split_change_blocked_only_while_submitting() {
        let split = TestSplitRatio::new(0.3).unwrap();
        assert_eq!(
            transition(WorkflowState::Submitting, WorkflowEvent::TestSplitChanged(split)),
            Err(StateConflict::OperationInProgress)
        );
        let t = transition(WorkflowState::Failed, WorkflowEvent::TestSplitChanged(split)).unwrap();
        assert_eq!(t.next, WorkflowState::Failed);
        assert_eq!(t.effects, vec![Effect::SetTestSplit(split)]);
    }

    #[test]
    fn stray_settlement_is_ignored() {
        let t = transition(
            WorkflowState::Idle,
            WorkflowEvent::TrainingSettled {
                mode: TrainingMode::Train,
                outcome: Ok(training_result("1.0.0", &[])),
            },
        )
        .unwrap();
        assert_eq!(t, Transition::stay(WorkflowState::Idle));
    }
}
