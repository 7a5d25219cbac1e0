// core/src/workflow/runner.rs

//! The [`Workflow`] definition, handler registration and execution.

use super::context::{Handler, StepContext};
use super::control::{RunOutcome, StepControl};
use super::step::{SkipCondition, StepDef};
use super::WorkflowError;
use std::collections::HashMap;
use std::future::Future;
use tracing::{event, instrument, Instrument, Level};

/// An ordered, named-step procedure over context data `T`, whose handlers fail with `Err`.
pub struct Workflow<T, Err>
where
  T: Send + Sync + 'static,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  name: String,
  steps: Vec<StepDef<T>>,
  before: HashMap<String, Vec<Handler<T, Err>>>,
  on: HashMap<String, Vec<Handler<T, Err>>>,
  after: HashMap<String, Vec<Handler<T, Err>>>,
}

impl<T, Err> Workflow<T, Err>
where
  T: Send + Sync + 'static,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Creates a workflow from `(step name, optional, skip condition)` triples.
  pub fn new(name: impl Into<String>, step_defs: &[(&str, bool, Option<SkipCondition<T>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional, skip_if)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      name: name.into(),
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// Registering a handler for an undeclared step is a wiring bug, caught at construction.
  fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "workflow '{}' has no step named '{}'; declare it in Workflow::new",
        self.name, step_name
      );
    }
  }

  fn box_handler<F, HandlerErr>(
    handler_fn: impl Fn(StepContext<T>) -> F + Send + Sync + 'static,
  ) -> Handler<T, Err>
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    Box::new(move |ctx| {
      let fut = handler_fn(ctx);
      Box::pin(async move { fut.await.map_err(Into::into) })
    })
  }

  pub fn before<F, HandlerErr>(&mut self, step_name: &str, handler_fn: impl Fn(StepContext<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = Self::box_handler(handler_fn);
    self.before.entry(step_name.to_string()).or_default().push(handler);
  }

  pub fn on<F, HandlerErr>(&mut self, step_name: &str, handler_fn: impl Fn(StepContext<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = Self::box_handler(handler_fn);
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }

  pub fn after<F, HandlerErr>(&mut self, step_name: &str, handler_fn: impl Fn(StepContext<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = Self::box_handler(handler_fn);
    self.after.entry(step_name.to_string()).or_default().push(handler);
  }

  fn has_handlers(&self, step_name: &str) -> bool {
    [&self.before, &self.on, &self.after]
      .iter()
      .any(|phase| phase.get(step_name).is_some_and(|v| !v.is_empty()))
  }

  /// Runs every step in order against `ctx`.
  ///
  /// Stops early with [`RunOutcome::Stopped`] when a handler asks to, and returns the first
  /// handler error unchanged.
  #[instrument(
    name = "Workflow::run",
    skip_all,
    fields(workflow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: StepContext<T>) -> Result<RunOutcome, Err> {
    event!(Level::DEBUG, "Workflow run starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      let skip = step_def.skip_if.as_ref().is_some_and(|cond| cond(&ctx.read()));
      if skip {
        event!(Level::DEBUG, step = step_name, "Step skipped by condition.");
        continue;
      }

      if !self.has_handlers(step_name) {
        if step_def.optional {
          event!(Level::DEBUG, step = step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step = step_name, "Required step has no handlers.");
        return Err(Err::from(WorkflowError::HandlerMissing {
          workflow: self.name.clone(),
          step_name: step_def.name.clone(),
        }));
      }

      let step_span = tracing::info_span!("workflow_step", step = step_name, step_index = step_idx);
      let control = self.run_step(step_name, &ctx).instrument(step_span).await?;
      if control == StepControl::Stop {
        return Ok(RunOutcome::Stopped);
      }
    }

    event!(Level::DEBUG, "Workflow run completed.");
    Ok(RunOutcome::Completed)
  }

  async fn run_step(&self, step_name: &str, ctx: &StepContext<T>) -> Result<StepControl, Err> {
    for (phase, handlers) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
      let Some(handlers) = handlers.get(step_name) else {
        continue;
      };
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        let handler_span = tracing::debug_span!("workflow_handler", phase, handler_index = handler_idx);
        match handler_fn(ctx.clone()).instrument(handler_span).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Stop) => {
            event!(Level::INFO, phase, "Workflow stopped by a handler.");
            return Ok(StepControl::Stop);
          }
          Err(e) => {
            event!(Level::WARN, phase, error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }
    Ok(StepControl::Continue)
  }
}
