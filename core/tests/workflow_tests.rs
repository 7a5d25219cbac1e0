// tests/workflow_tests.rs
mod common;

use common::setup_tracing;
use kilnworks_core::workflow::SkipCondition;
use kilnworks_core::{RunOutcome, StepContext, StepControl, Workflow, WorkflowError};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Trace {
  steps: Vec<String>,
  skip_middle: bool,
  stop_at: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
enum TraceError {
  #[error("handler failed: {0}")]
  Handler(String),
  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}

fn record(label: &'static str) -> impl Fn(StepContext<Trace>) -> kilnworks_core::workflow::StepFuture<TraceError> {
  move |ctx| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.steps.push(label.to_string());
      if guard.stop_at == Some(label) {
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  }
}

#[tokio::test]
async fn runs_phases_and_steps_in_declaration_order() {
  setup_tracing();
  let mut workflow = Workflow::<Trace, TraceError>::new("trace", &[("first", false, None), ("second", false, None)]);
  workflow.after("first", record("first:after"));
  workflow.on("first", record("first:on"));
  workflow.before("first", record("first:before"));
  workflow.on("second", record("second:on"));

  let ctx = StepContext::new(Trace::default());
  let outcome = workflow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, RunOutcome::Completed);
  assert_eq!(
    ctx.read().steps,
    vec!["first:before", "first:on", "first:after", "second:on"]
  );
  assert_eq!(workflow.step_names(), vec!["first", "second"]);
}

#[tokio::test]
async fn stop_halts_remaining_handlers_and_steps() {
  setup_tracing();
  let mut workflow = Workflow::<Trace, TraceError>::new("trace", &[("a", false, None), ("b", false, None)]);
  workflow.on("a", record("a:on"));
  workflow.after("a", record("a:after"));
  workflow.on("b", record("b:on"));

  let ctx = StepContext::new(Trace {
    stop_at: Some("a:on"),
    ..Trace::default()
  });
  let outcome = workflow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, RunOutcome::Stopped);
  assert_eq!(ctx.read().steps, vec!["a:on"]);
}

#[tokio::test]
async fn handler_error_is_returned_unchanged() {
  setup_tracing();
  let mut workflow = Workflow::<Trace, TraceError>::new("trace", &[("a", false, None), ("b", false, None)]);
  workflow.on("a", |_ctx: StepContext<Trace>| async { Err::<StepControl, _>(TraceError::Handler("boom".into())) });
  workflow.on("b", record("b:on"));

  let ctx = StepContext::new(Trace::default());
  let err = workflow.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(err, TraceError::Handler(ref m) if m == "boom"));
  assert!(ctx.read().steps.is_empty());
}

#[tokio::test]
async fn skip_condition_is_evaluated_against_the_context() {
  setup_tracing();
  let skip_middle: SkipCondition<Trace> = Arc::new(|t: &Trace| t.skip_middle);
  let mut workflow = Workflow::<Trace, TraceError>::new(
    "trace",
    &[("a", false, None), ("middle", false, Some(skip_middle)), ("c", false, None)],
  );
  workflow.on("a", record("a"));
  workflow.on("middle", record("middle"));
  workflow.on("c", record("c"));

  let skipped = StepContext::new(Trace {
    skip_middle: true,
    ..Trace::default()
  });
  workflow.run(skipped.clone()).await.unwrap();
  assert_eq!(skipped.read().steps, vec!["a", "c"]);

  let full = StepContext::new(Trace::default());
  workflow.run(full.clone()).await.unwrap();
  assert_eq!(full.read().steps, vec!["a", "middle", "c"]);
}

#[tokio::test]
async fn optional_steps_may_have_no_handlers_but_required_ones_may_not() {
  setup_tracing();
  let mut lenient = Workflow::<Trace, TraceError>::new("lenient", &[("a", false, None), ("notify", true, None)]);
  lenient.on("a", record("a"));
  assert_eq!(
    lenient.run(StepContext::new(Trace::default())).await.unwrap(),
    RunOutcome::Completed
  );

  let mut strict = Workflow::<Trace, TraceError>::new("strict", &[("a", false, None), ("b", false, None)]);
  strict.on("a", record("a"));
  let ctx = StepContext::new(Trace::default());
  let err = strict.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(
    err,
    TraceError::Workflow(WorkflowError::HandlerMissing { ref workflow, ref step_name })
      if workflow == "strict" && step_name == "b"
  ));
  assert_eq!(ctx.read().steps, vec!["a"]);
}

#[test]
#[should_panic(expected = "has no step named")]
fn registering_for_an_unknown_step_panics() {
  let mut workflow = Workflow::<Trace, TraceError>::new("trace", &[("a", false, None)]);
  workflow.on("typo", record("typo"));
}
