// server/src/web/extractors.rs

use crate::errors::AppError;
use crate::state::AppState;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use subtle::ConstantTimeEq;
use tracing::warn;

pub const OPERATOR_TOKEN_HEADER: &str = "X-Operator-Token";

/// Guards operator routes. When `OPERATOR_TOKEN` is configured the request must carry it
/// in the `X-Operator-Token` header; otherwise every caller is let through.
#[derive(Debug, Clone, Copy)]
pub struct OperatorAccess;

impl FromRequest for OperatorAccess {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
      return ready(Err(AppError::Internal("Application state is not registered".to_string())));
    };
    let Some(expected) = state.config.operator_token.as_deref() else {
      return ready(Ok(OperatorAccess));
    };

    let provided = req
      .headers()
      .get(OPERATOR_TOKEN_HEADER)
      .and_then(|value| value.to_str().ok());
    match provided {
      Some(token) if tokens_match(token, expected) => ready(Ok(OperatorAccess)),
      Some(_) => {
        warn!(path = %req.path(), "Rejected operator request with a wrong token.");
        ready(Err(AppError::Auth("Operator token is invalid".to_string())))
      }
      None => ready(Err(AppError::Auth(format!(
        "Operator routes require the {} header",
        OPERATOR_TOKEN_HEADER
      )))),
    }
  }
}

/// Length differences are not hidden; the comparison of equal-length tokens is constant-time.
fn tokens_match(provided: &str, expected: &str) -> bool {
  provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
