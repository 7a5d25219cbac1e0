// core/src/workflow/mod.rs

//! A small step runner for multi-step order procedures.
//!
//! A [`Workflow`] is an ordered list of named steps. Each step can carry `before`,
//! `on` and `after` handlers which receive a shared [`StepContext`] and answer with a
//! [`StepControl`]. Steps may be optional (allowed to have no handlers) and may be
//! skipped by a condition evaluated against the context.

pub mod context;
pub mod control;
pub mod runner;
pub mod step;

pub use context::{Handler, StepContext, StepFuture};
pub use control::{RunOutcome, StepControl};
pub use runner::Workflow;
pub use step::{SkipCondition, StepDef};

use thiserror::Error;

/// Errors raised by the runner itself, as opposed to its handlers.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Handler missing for required step '{step_name}' in workflow '{workflow}'")]
  HandlerMissing { workflow: String, step_name: String },

  #[error("Workflow '{workflow}' stopped before producing a result")]
  UnexpectedStop { workflow: String },

  /// A step ran before the step that should have filled in its input.
  #[error("Step '{step_name}' found no {missing} in its context")]
  MissingState { step_name: String, missing: String },
}
