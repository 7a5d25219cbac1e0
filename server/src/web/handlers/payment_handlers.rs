// server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use kilnworks_core::{PaymentAck, PaymentCallback};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::Result;
use crate::state::AppState;

/// Fields default to empty so a partial callback reaches the engine, which names what is
/// missing instead of failing at deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
  #[serde(default)]
  pub gateway_order_id: String,
  #[serde(default)]
  pub gateway_payment_id: String,
  #[serde(default)]
  pub client_signature: String,
}

#[derive(Debug, Serialize)]
struct VerifyPaymentResponse {
  success: bool,
  #[serde(flatten)]
  ack: PaymentAck,
}

#[instrument(
    name = "handler::verify_payment",
    skip(app_state, payload),
    fields(gateway_order_id = %payload.gateway_order_id, gateway_payment_id = %payload.gateway_payment_id)
)]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse> {
  let VerifyPaymentRequest {
    gateway_order_id,
    gateway_payment_id,
    client_signature,
  } = payload.into_inner();
  let ack = app_state
    .engine
    .verify_payment(PaymentCallback {
      gateway_order_id,
      gateway_payment_id,
      client_signature,
    })
    .await?;
  info!(
    order_number = %ack.order_number,
    already_processed = ack.already_processed,
    "Payment callback accepted."
  );
  Ok(HttpResponse::Ok().json(VerifyPaymentResponse { success: true, ack }))
}
