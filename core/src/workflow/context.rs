// core/src/workflow/context.rs

use super::control::StepControl;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Shared, lockable state threaded through every handler of a workflow run.
///
/// Guards are blocking `parking_lot` guards. They MUST be dropped before any `.await`;
/// handlers copy what they need out of the context, await, then write results back.
#[derive(Debug)]
pub struct StepContext<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> StepContext<T> {
  pub fn new(data: T) -> Self {
    StepContext(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Takes the state back once every other handle has been dropped.
  pub fn into_inner(self) -> Option<T> {
    Arc::try_unwrap(self.0).ok().map(RwLock::into_inner)
  }
}

impl<T: Send + Sync + 'static> Clone for StepContext<T> {
  fn clone(&self) -> Self {
    StepContext(Arc::clone(&self.0))
  }
}

pub type StepFuture<Err> = Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>>;

/// A boxed step handler. Receives its own clone of the context handle.
pub type Handler<T, Err> = Box<dyn Fn(StepContext<T>) -> StepFuture<Err> + Send + Sync>;
