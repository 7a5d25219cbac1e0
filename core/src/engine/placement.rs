// core/src/engine/placement.rs

use super::settlement::{self, SettleOutcome, Shortfall};
use super::{EngineParts, StockPolicy, TotalCheck};
use crate::domain::{
  FulfillmentStatus, NewOrder, Order, OrderNumber, Payment, PaymentMode, PaymentStatus, ProductId, SettlementState,
};
use crate::error::{OrderError, OrderResult, StoreError};
use crate::ports::{PaymentIntent, ORDER_NUMBER_CONSTRAINT};
use crate::workflow::{SkipCondition, StepContext, StepControl, Workflow, WorkflowError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const VALIDATE_CHECKOUT: &str = "validate_checkout";
const CHECK_TOTALS: &str = "check_totals";
const OPEN_GATEWAY_INTENT: &str = "open_gateway_intent";
const RECORD_ORDER: &str = "record_order";
const SETTLE_CASH_ORDER: &str = "settle_cash_order";
const SEND_CONFIRMATION: &str = "send_confirmation";

/// Fresh order numbers tried before a collision is reported as a store conflict.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 5;

pub(crate) struct PlacementCtx {
  parts: Arc<EngineParts>,
  request: NewOrder,
  /// Assigned up front so the gateway receipt survives order number retries.
  order_id: Uuid,
  pub(crate) intent: Option<PaymentIntent>,
  pub(crate) order: Option<Order>,
  settled_here: bool,
}

impl PlacementCtx {
  pub(crate) fn new(parts: Arc<EngineParts>, request: NewOrder) -> Self {
    Self {
      parts,
      request,
      order_id: Uuid::new_v4(),
      intent: None,
      order: None,
      settled_here: false,
    }
  }
}

pub(crate) fn build_workflow() -> Workflow<PlacementCtx, OrderError> {
  let is_cod: SkipCondition<PlacementCtx> = Arc::new(|ctx| ctx.request.payment_mode == PaymentMode::Cod);
  let is_gateway: SkipCondition<PlacementCtx> = Arc::new(|ctx| ctx.request.payment_mode == PaymentMode::Gateway);

  let mut workflow = Workflow::new(
    "place_order",
    &[
      (VALIDATE_CHECKOUT, false, None),
      (CHECK_TOTALS, false, None),
      (OPEN_GATEWAY_INTENT, false, Some(is_cod)),
      (RECORD_ORDER, false, None),
      (SETTLE_CASH_ORDER, false, Some(is_gateway.clone())),
      (SEND_CONFIRMATION, true, Some(is_gateway)),
    ],
  );

  workflow.on(VALIDATE_CHECKOUT, validate_checkout);
  workflow.on(CHECK_TOTALS, check_totals);
  workflow.on(OPEN_GATEWAY_INTENT, open_gateway_intent);
  workflow.on(RECORD_ORDER, record_order);
  workflow.on(SETTLE_CASH_ORDER, settle_cash_order);
  workflow.on(SEND_CONFIRMATION, send_confirmation);
  workflow
}

fn missing(step_name: &str, what: &str) -> OrderError {
  WorkflowError::MissingState {
    step_name: step_name.to_string(),
    missing: what.to_string(),
  }
  .into()
}

async fn validate_checkout(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, request) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.request.clone())
  };
  request.validate()?;

  // The same product may appear on several lines; availability is checked per product.
  let mut wanted: Vec<(ProductId, u64)> = Vec::with_capacity(request.items.len());
  for item in &request.items {
    match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
      Some((_, quantity)) => *quantity += u64::from(item.quantity),
      None => wanted.push((item.product_id, u64::from(item.quantity))),
    }
  }

  for (product_id, quantity) in wanted {
    let product = parts
      .catalog
      .get_product(product_id)
      .await?
      .ok_or_else(|| OrderError::Validation(format!("Product {} does not exist", product_id)))?;

    if parts.policy.stock == StockPolicy::Strict && !product.can_supply(quantity) {
      warn!(%product_id, requested = quantity, available = product.stock_qty, "Checkout rejected: not enough stock.");
      return Err(OrderError::InsufficientStock {
        product_id,
        requested: i64::try_from(quantity).unwrap_or(i64::MAX),
        available: product.stock_qty.max(0),
      });
    }
  }

  debug!(items = request.items.len(), "Checkout validated.");
  Ok(StepControl::Continue)
}

async fn check_totals(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, request) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.request.clone())
  };
  let subtotal = crate::domain::order::sum_line_items(&request.items)
    .ok_or_else(|| OrderError::Validation("Item totals overflow".to_string()))?;
  let fee = parts.policy.shipping.fee_for(&request.shipping_method);

  match parts.policy.total_check {
    TotalCheck::Trust => {
      match fee.and_then(|fee| subtotal.checked_add(fee)) {
        Some(expected) if expected != request.total => {
          warn!(%expected, submitted = %request.total, "Submitted total differs from items plus shipping; keeping the submitted total.");
        }
        None => {
          debug!(shipping_method = %request.shipping_method, "No shipping rate configured; total not cross-checked.");
        }
        _ => {}
      }
      Ok(StepControl::Continue)
    }
    TotalCheck::MatchLineItems => {
      let fee = fee.ok_or_else(|| {
        OrderError::Validation(format!("Unknown shipping method '{}'", request.shipping_method.trim()))
      })?;
      let expected = subtotal
        .checked_add(fee)
        .ok_or_else(|| OrderError::Validation("Order total overflows".to_string()))?;
      if expected != request.total {
        return Err(OrderError::Validation(format!(
          "Order total {} does not match items plus shipping ({})",
          request.total, expected
        )));
      }
      Ok(StepControl::Continue)
    }
  }
}

async fn open_gateway_intent(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, total, order_id) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.request.total, guard.order_id)
  };

  let receipt = order_id.to_string();
  let intent = parts
    .gateway
    .create_intent(total.minor(), &parts.policy.currency, &receipt)
    .await
    .map_err(|e| {
      warn!(error = %e, %receipt, "Gateway refused to open a payment intent; nothing was recorded.");
      OrderError::from(e)
    })?;

  info!(intent_id = %intent.id, amount_minor = intent.amount_minor, "Gateway payment intent opened.");
  ctx.write().intent = Some(intent);
  Ok(StepControl::Continue)
}

async fn record_order(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, request, order_id, intent) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.request.clone(), guard.order_id, guard.intent.clone())
  };

  let (payment, fulfillment_status, settlement) = match request.payment_mode {
    PaymentMode::Cod => (Payment::CashOnDelivery, FulfillmentStatus::Confirmed, SettlementState::Due),
    PaymentMode::Gateway => {
      let intent = intent.ok_or_else(|| missing(RECORD_ORDER, "payment intent"))?;
      (
        Payment::Gateway {
          gateway_order_id: intent.id,
          capture: None,
        },
        FulfillmentStatus::Pending,
        SettlementState::NotDue,
      )
    }
  };

  let now = Utc::now();
  let mut order = Order {
    id: order_id,
    order_number: OrderNumber::generate(),
    customer: request.customer,
    items: request.items,
    shipping_method: request.shipping_method.trim().to_string(),
    total: request.total,
    currency: parts.policy.currency.clone(),
    fulfillment_status,
    payment,
    payment_status: PaymentStatus::Pending,
    settlement,
    settled_at: None,
    created_at: now,
    updated_at: now,
  };

  let mut attempt = 1;
  loop {
    match parts.ledger.insert(&order).await {
      Ok(()) => break,
      Err(StoreError::Conflict { constraint })
        if constraint == ORDER_NUMBER_CONSTRAINT && attempt < MAX_ORDER_NUMBER_ATTEMPTS =>
      {
        warn!(attempt, order_number = %order.order_number, "Order number already taken, retrying with a fresh one.");
        order.order_number = OrderNumber::generate();
        attempt += 1;
      }
      Err(e) => return Err(e.into()),
    }
  }

  info!(
    order_id = %order.id,
    order_number = %order.order_number,
    payment_mode = %order.payment_mode(),
    "Order recorded."
  );
  ctx.write().order = Some(order);
  Ok(StepControl::Continue)
}

async fn settle_cash_order(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, order) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.order.clone())
  };
  let order = order.ok_or_else(|| missing(SETTLE_CASH_ORDER, "order"))?;

  let outcome = settlement::settle(&parts, &order).await?;
  if let SettleOutcome::Short(shortfall) = outcome {
    if void_cash_order(&parts, &order, shortfall).await? {
      return Err(shortfall.into_rejection());
    }
  }
  let refreshed = settlement::reload(&parts, order).await?;

  let mut guard = ctx.write();
  guard.settled_here = outcome == SettleOutcome::Settled;
  guard.order = Some(refreshed);
  Ok(StepControl::Continue)
}

/// Takes a cash order that lost the race for stock out of circulation: settlement is no
/// longer owed and both statuses become `failed`, so it never ships or counts as revenue.
/// Returns false when something else took the settlement over first.
async fn void_cash_order(parts: &EngineParts, order: &Order, shortfall: Shortfall) -> OrderResult<bool> {
  let voided = parts
    .ledger
    .transition_settlement(order.id, SettlementState::Due, SettlementState::NotDue)
    .await?;
  if !voided {
    warn!(order_number = %order.order_number, "Short cash order was picked up by another settlement; keeping it.");
    return Ok(false);
  }

  parts
    .ledger
    .set_fulfillment_status(order.id, Some(FulfillmentStatus::Confirmed), FulfillmentStatus::Failed)
    .await?;
  parts
    .ledger
    .set_payment_status(order.id, Some(PaymentStatus::Pending), PaymentStatus::Failed)
    .await?;
  warn!(
    order_number = %order.order_number,
    product_id = %shortfall.product_id,
    requested = shortfall.requested,
    available = shortfall.available,
    "Cash order failed: stock ran out before it could be settled."
  );
  Ok(true)
}

async fn send_confirmation(ctx: StepContext<PlacementCtx>) -> OrderResult<StepControl> {
  let (parts, order, settled_here) = {
    let guard = ctx.read();
    (guard.parts.clone(), guard.order.clone(), guard.settled_here)
  };
  if !settled_here {
    return Ok(StepControl::Continue);
  }
  let order = order.ok_or_else(|| missing(SEND_CONFIRMATION, "order"))?;
  settlement::send_confirmation(&parts, &order).await;
  Ok(StepControl::Continue)
}
