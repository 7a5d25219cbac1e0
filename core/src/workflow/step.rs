// core/src/workflow/step.rs

use std::sync::Arc;

/// Evaluated against the context (under a read lock) right before a step runs.
/// Returning `true` skips the step.
pub type SkipCondition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: Send + Sync + 'static> {
  pub name: String,
  /// Optional steps may be left without handlers.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
