//! Training workflow: a pure transition function plus the controller that
//! runs its effects against a [`DelayService`](crate::service::DelayService).

mod controller;
mod jobs;
pub mod machine;

pub use controller::{TrainingWorkflowController, WorkflowUpdate};
pub use machine::{Effect, SelectedFile, Transition, WorkflowEvent, WorkflowState, transition};
