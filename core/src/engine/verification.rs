// core/src/engine/verification.rs

use super::settlement::{self, SettleOutcome};
use super::{EngineParts, PaymentCallback};
use crate::domain::{GatewayCapture, Order};
use crate::error::{OrderError, OrderResult};
use crate::ports::PaymentClaim;
use crate::workflow::{StepContext, StepControl, Workflow, WorkflowError};
use std::sync::Arc;
use tracing::{info, warn};

const VERIFY_SIGNATURE: &str = "verify_signature";
const CLAIM_PAYMENT: &str = "claim_payment";
const SETTLE_PAID_ORDER: &str = "settle_paid_order";
const SEND_CONFIRMATION: &str = "send_confirmation";

pub(crate) struct VerificationCtx {
  parts: Arc<EngineParts>,
  callback: PaymentCallback,
  pub(crate) order: Option<Order>,
  pub(crate) already_processed: bool,
  settled_here: bool,
}

impl VerificationCtx {
  pub(crate) fn new(parts: Arc<EngineParts>, callback: PaymentCallback) -> Self {
    Self {
      parts,
      callback,
      order: None,
      already_processed: false,
      settled_here: false,
    }
  }
}

pub(crate) fn build_workflow() -> Workflow<VerificationCtx, OrderError> {
  let mut workflow = Workflow::new(
    "verify_payment",
    &[
      (VERIFY_SIGNATURE, false, None),
      (CLAIM_PAYMENT, false, None),
      (SETTLE_PAID_ORDER, false, None),
      (SEND_CONFIRMATION, true, None),
    ],
  );

  workflow.on(VERIFY_SIGNATURE, verify_signature);
  workflow.on(CLAIM_PAYMENT, claim_payment);
  workflow.on(SETTLE_PAID_ORDER, settle_paid_order);
  workflow.on(SEND_CONFIRMATION, send_confirmation);
  workflow
}

fn missing_order(step_name: &str) -> OrderError {
  WorkflowError::MissingState {
    step_name: step_name.to_string(),
    missing: "order".to_string(),
  }
  .into()
}

async fn verify_signature(ctx: StepContext<VerificationCtx>) -> OrderResult<StepControl> {
  let (parts, callback) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.callback.clone())
  };

  let absent: Vec<&str> = [
    ("gatewayOrderId", &callback.gateway_order_id),
    ("gatewayPaymentId", &callback.gateway_payment_id),
    ("clientSignature", &callback.client_signature),
  ]
  .iter()
  .filter(|(_, value)| value.trim().is_empty())
  .map(|(field, _)| *field)
  .collect();
  if !absent.is_empty() {
    return Err(OrderError::Validation(format!(
      "Missing payment callback fields: {}",
      absent.join(", ")
    )));
  }

  if !parts.verifier.verify(
    &callback.gateway_order_id,
    &callback.gateway_payment_id,
    &callback.client_signature,
  ) {
    warn!(
      gateway_order_id = %callback.gateway_order_id,
      gateway_payment_id = %callback.gateway_payment_id,
      "Payment callback signature mismatch; possible tampering."
    );
    return Err(OrderError::SignatureInvalid);
  }
  Ok(StepControl::Continue)
}

async fn claim_payment(ctx: StepContext<VerificationCtx>) -> OrderResult<StepControl> {
  let (parts, callback) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.callback.clone())
  };
  let capture = GatewayCapture {
    payment_id: callback.gateway_payment_id.trim().to_string(),
    signature: callback.client_signature.trim().to_ascii_lowercase(),
  };

  match parts.ledger.claim_payment(&callback.gateway_order_id, &capture).await? {
    PaymentClaim::Claimed(order) => {
      info!(order_number = %order.order_number, payment_id = %capture.payment_id, "Gateway payment recorded.");
      ctx.write().order = Some(order);
      Ok(StepControl::Continue)
    }
    PaymentClaim::AlreadyPaid(order) => {
      info!(order_number = %order.order_number, "Duplicate payment callback; payment already recorded.");
      let mut guard = ctx.write();
      guard.order = Some(order);
      guard.already_processed = true;
      Ok(StepControl::Stop)
    }
    PaymentClaim::NotPending(order) => {
      warn!(
        order_number = %order.order_number,
        payment_status = %order.payment_status,
        "Verified callback for an order that is no longer awaiting payment."
      );
      Err(OrderError::PaymentNotPending {
        order_number: order.order_number.to_string(),
        status: order.payment_status,
      })
    }
    PaymentClaim::Missing => {
      warn!(gateway_order_id = %callback.gateway_order_id, "Verified callback for an unknown gateway order.");
      Err(OrderError::OrderNotFound(format!(
        "gateway order {}",
        callback.gateway_order_id
      )))
    }
  }
}

async fn settle_paid_order(ctx: StepContext<VerificationCtx>) -> OrderResult<StepControl> {
  let (parts, order) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.order.clone())
  };
  let order = order.ok_or_else(|| missing_order(SETTLE_PAID_ORDER))?;

  let outcome = settlement::settle(&parts, &order).await?;
  if let SettleOutcome::Short(shortfall) = outcome {
    // The payment stays recorded and the settlement stays owed; redrive retries it.
    return Err(shortfall.into_settlement_error(&order));
  }
  let refreshed = settlement::reload(&parts, order).await?;

  let mut guard = ctx.write();
  guard.settled_here = outcome == SettleOutcome::Settled;
  guard.order = Some(refreshed);
  Ok(StepControl::Continue)
}

async fn send_confirmation(ctx: StepContext<VerificationCtx>) -> OrderResult<StepControl> {
  let (parts, order, settled_here) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.order.clone(), guard.settled_here)
  };
  if !settled_here {
    return Ok(StepControl::Continue);
  }
  let order = order.ok_or_else(|| missing_order(SEND_CONFIRMATION))?;
  settlement::send_confirmation(&parts, &order).await;
  Ok(StepControl::Continue)
}
