// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use kilnworks_core::OrderError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Order(#[from] OrderError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl AppError {
  /// The `{error, detail?}` pair sent to clients. Internal details stay in the logs.
  fn public_message(&self) -> (String, Option<String>) {
    match self {
      AppError::Validation(m) => (m.clone(), None),
      AppError::Auth(m) => (m.clone(), None),
      AppError::Config(_) => ("Configuration issue".to_string(), None),
      AppError::Sqlx(_) => ("Database operation failed".to_string(), None),
      AppError::Internal(_) => ("An internal error occurred".to_string(), None),
      AppError::Order(order_err) => match order_err {
        OrderError::Validation(m) => (m.clone(), None),
        OrderError::InsufficientStock { .. } => ("Insufficient stock".to_string(), Some(order_err.to_string())),
        OrderError::Gateway { .. } => (
          "Payment gateway unavailable".to_string(),
          Some("No order was created. Please try again.".to_string()),
        ),
        OrderError::SignatureInvalid => (
          "signature invalid".to_string(),
          Some("Your payment could not be verified. Please contact support with your order details.".to_string()),
        ),
        OrderError::OrderNotFound(_) => ("Order not found".to_string(), Some(order_err.to_string())),
        OrderError::PaymentNotPending { .. } => ("Payment is not pending".to_string(), Some(order_err.to_string())),
        OrderError::InvalidTransition { .. } => ("Status transition not allowed".to_string(), Some(order_err.to_string())),
        OrderError::Settlement { order_number, .. } => (
          "Order settlement failed".to_string(),
          Some(format!("Order {} needs attention from the shop.", order_number)),
        ),
        OrderError::Store { .. } => ("Database operation failed".to_string(), None),
        OrderError::Workflow { .. } => ("Order processing error".to_string(), None),
      },
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Order(order_err) => match order_err {
        OrderError::Validation(_) | OrderError::InsufficientStock { .. } | OrderError::SignatureInvalid => {
          StatusCode::BAD_REQUEST
        }
        OrderError::Gateway { .. } => StatusCode::BAD_GATEWAY,
        OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::PaymentNotPending { .. } | OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrderError::Settlement { .. } | OrderError::Store { .. } | OrderError::Workflow { .. } => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Request rejected");
    }

    let (error, detail) = self.public_message();
    let body = match detail {
      Some(detail) => json!({ "error": error, "detail": detail }),
      None => json!({ "error": error }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use kilnworks_core::{GatewayError, PaymentStatus};

  #[test]
  fn order_errors_map_to_http_statuses() {
    let cases = [
      (AppError::from(OrderError::Validation("x".into())), 400),
      (AppError::from(OrderError::SignatureInvalid), 400),
      (AppError::from(OrderError::from(GatewayError::Unavailable("down".into()))), 502),
      (AppError::from(OrderError::OrderNotFound("ORD-1".into())), 404),
      (
        AppError::from(OrderError::PaymentNotPending {
          order_number: "ORD-1".into(),
          status: PaymentStatus::Failed,
        }),
        409,
      ),
      (
        AppError::from(OrderError::Settlement {
          order_number: "ORD-1".into(),
          message: "boom".into(),
        }),
        500,
      ),
      (AppError::Auth("no".into()), 401),
    ];
    for (err, expected) in cases {
      assert_eq!(err.status_code().as_u16(), expected, "{}", err);
    }
  }

  #[test]
  fn anyhow_errors_keep_database_failures_distinct() {
    let db = AppError::from(anyhow::Error::new(sqlx::Error::RowNotFound));
    assert!(matches!(db, AppError::Sqlx(_)));
    let other = AppError::from(anyhow::anyhow!("seed file unreadable"));
    assert!(matches!(other, AppError::Internal(ref m) if m.contains("seed file")));
  }

  #[test]
  fn internal_details_are_not_exposed() {
    let err = AppError::Internal("connection string postgres://secret".into());
    let (message, detail) = err.public_message();
    assert_eq!(message, "An internal error occurred");
    assert!(detail.is_none());
  }
}
