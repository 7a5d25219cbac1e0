// core/src/error.rs

//! Error types for every layer of the order core.
//!
//! Collaborator seams (stores, gateway, notifier) have their own narrow error enums.
//! The engine folds them into [`OrderError`], which is what callers see.

use crate::domain::{PaymentStatus, ProductId};
use crate::workflow::WorkflowError;
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Failures raised by an [`OrderLedger`](crate::ports::OrderLedger) or
/// [`CatalogStore`](crate::ports::CatalogStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
  /// A unique constraint rejected the write. `constraint` carries the backend's name for it.
  #[error("Unique constraint violated: {constraint}")]
  Conflict { constraint: String },

  #[error("Record not found: {0}")]
  Missing(String),

  /// A stock adjustment would have taken the product below the requested floor.
  #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
  InsufficientStock {
    product_id: ProductId,
    requested: i64,
    available: i64,
  },

  #[error("Store backend failure. Source: {source}")]
  Backend {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for StoreError {
  fn from(err: AnyhowError) -> Self {
    StoreError::Backend { source: err }
  }
}

/// Failures raised by a [`PaymentGateway`](crate::ports::PaymentGateway) adapter.
#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("Payment gateway rejected the intent: {0}")]
  Rejected(String),

  #[error("Payment gateway unavailable: {0}")]
  Unavailable(String),
}

/// A confirmation message could not be delivered. Never surfaced to callers.
#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// The error callers of the engine and the reporter receive.
#[derive(Debug, Error)]
pub enum OrderError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
  InsufficientStock {
    product_id: ProductId,
    requested: i64,
    available: i64,
  },

  /// Intent creation failed upstream. Nothing was persisted.
  #[error("Payment Gateway Error: {source}")]
  Gateway {
    #[from]
    source: GatewayError,
  },

  #[error("Payment signature verification failed")]
  SignatureInvalid,

  #[error("Order Not Found: {0}")]
  OrderNotFound(String),

  #[error("Payment for order {order_number} is {status}, not pending")]
  PaymentNotPending { order_number: String, status: PaymentStatus },

  #[error("Transition of {field} from '{from}' to '{to}' is not allowed")]
  InvalidTransition {
    field: &'static str,
    from: String,
    to: String,
  },

  /// Stock and settlement state may have diverged; needs attention from an operator.
  #[error("Settlement failed for order {order_number}: {message}")]
  Settlement { order_number: String, message: String },

  #[error("Store Error: {source}")]
  Store {
    #[from]
    source: StoreError,
  },

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },
}

pub type OrderResult<T, E = OrderError> = std::result::Result<T, E>;
