// core/src/workflow/control.rs

/// Signal from a handler: keep going, or halt the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  Continue,
  /// Halt immediately. Remaining handlers and steps are not executed.
  Stop,
}

/// How a run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Completed,
  /// A handler returned [`StepControl::Stop`].
  Stopped,
}
