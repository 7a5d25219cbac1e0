// core/src/engine/mod.rs

//! The order lifecycle engine: placement, payment verification, settlement and
//! operator status edits.
//!
//! Placement and verification run as [`Workflow`]s whose context carries a handle to the
//! engine's collaborators. Both converge on settlement, which decrements stock at most
//! once per order.

mod placement;
mod settlement;
mod verification;

pub use settlement::RedriveReport;

use crate::domain::{
  FulfillmentStatus, Money, NewOrder, Order, OrderNumber, ParseStatusError, PaymentStatus, TransitionPolicy,
};
use crate::error::{OrderError, OrderResult};
use crate::ports::{CatalogStore, Notifier, OrderLedger, OrderQuery, PaymentGateway, StockFloor};
use crate::signature::SignatureVerifier;
use crate::workflow::{RunOutcome, StepContext, Workflow, WorkflowError};
use chrono::{DateTime, Duration, Utc};
use placement::PlacementCtx;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use verification::VerificationCtx;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;

/// How stock availability is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
  /// Placement checks availability and settlement never takes stock below zero.
  #[default]
  Strict,
  /// No availability check at placement; settlement may leave negative stock.
  Permissive,
}

impl StockPolicy {
  pub fn floor(self) -> StockFloor {
    match self {
      StockPolicy::Strict => StockFloor::Zero,
      StockPolicy::Permissive => StockFloor::Unbounded,
    }
  }
}

impl FromStr for StockPolicy {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "strict" => Ok(StockPolicy::Strict),
      "permissive" => Ok(StockPolicy::Permissive),
      other => Err(ParseStatusError {
        kind: "stock policy",
        value: other.to_string(),
      }),
    }
  }
}

/// How the caller-supplied order total is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalCheck {
  /// Accept the checkout total; log when it disagrees with items plus shipping.
  #[default]
  Trust,
  /// Reject totals that differ from items plus the configured shipping fee.
  MatchLineItems,
}

impl FromStr for TotalCheck {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "trust" => Ok(TotalCheck::Trust),
      "line-items" | "line_items" => Ok(TotalCheck::MatchLineItems),
      other => Err(ParseStatusError {
        kind: "total check",
        value: other.to_string(),
      }),
    }
  }
}

/// Flat shipping fees keyed by shipping method (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ShippingRates {
  rates: HashMap<String, Money>,
}

impl ShippingRates {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_rate(mut self, method: impl Into<String>, fee: Money) -> Self {
    self.rates.insert(method.into().trim().to_ascii_lowercase(), fee);
    self
  }

  pub fn fee_for(&self, method: &str) -> Option<Money> {
    self.rates.get(&method.trim().to_ascii_lowercase()).copied()
  }
}

#[derive(Debug, Clone)]
pub struct EnginePolicy {
  pub stock: StockPolicy,
  pub total_check: TotalCheck,
  pub transitions: TransitionPolicy,
  pub currency: String,
  pub shipping: ShippingRates,
  /// Redrive skips orders whose marker moved more recently than this; the request that
  /// moved it is still settling.
  pub redrive_grace: Duration,
}

pub const DEFAULT_REDRIVE_GRACE_SECS: i64 = 60;

impl Default for EnginePolicy {
  fn default() -> Self {
    Self {
      stock: StockPolicy::default(),
      total_check: TotalCheck::default(),
      transitions: TransitionPolicy::default(),
      currency: "INR".to_string(),
      shipping: ShippingRates::new()
        .with_rate("standard", Money::ZERO)
        .with_rate("express", Money::from_minor(15_000)),
      redrive_grace: Duration::seconds(DEFAULT_REDRIVE_GRACE_SECS),
    }
  }
}

/// The external collaborators the engine drives.
pub struct Collaborators {
  pub ledger: Arc<dyn OrderLedger>,
  pub catalog: Arc<dyn CatalogStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub notifier: Arc<dyn Notifier>,
  pub verifier: SignatureVerifier,
}

/// Everything a workflow step needs, shared through the step contexts.
pub(crate) struct EngineParts {
  pub(crate) ledger: Arc<dyn OrderLedger>,
  pub(crate) catalog: Arc<dyn CatalogStore>,
  pub(crate) gateway: Arc<dyn PaymentGateway>,
  pub(crate) notifier: Arc<dyn Notifier>,
  pub(crate) verifier: SignatureVerifier,
  pub(crate) policy: EnginePolicy,
}

/// What the storefront needs to hand the customer to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
  pub intent_id: String,
  pub public_key: String,
  pub amount_minor: i64,
  pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Placement {
  pub order: Order,
  /// Present for gateway orders only.
  pub gateway: Option<GatewayCheckout>,
}

/// The gateway's payment callback as relayed by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
  pub gateway_order_id: String,
  pub gateway_payment_id: String,
  pub client_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAck {
  pub order_id: Uuid,
  pub order_number: OrderNumber,
  /// The payment had already been recorded by an earlier callback.
  pub already_processed: bool,
}

pub struct OrderEngine {
  parts: Arc<EngineParts>,
  placement: Workflow<PlacementCtx, OrderError>,
  verification: Workflow<VerificationCtx, OrderError>,
}

impl OrderEngine {
  pub fn new(collaborators: Collaborators, policy: EnginePolicy) -> Self {
    let Collaborators {
      ledger,
      catalog,
      gateway,
      notifier,
      verifier,
    } = collaborators;
    info!(
      stock_policy = ?policy.stock,
      total_check = ?policy.total_check,
      transitions = ?policy.transitions,
      currency = %policy.currency,
      redrive_grace_secs = policy.redrive_grace.num_seconds(),
      "Order engine configured."
    );
    Self {
      parts: Arc::new(EngineParts {
        ledger,
        catalog,
        gateway,
        notifier,
        verifier,
        policy,
      }),
      placement: placement::build_workflow(),
      verification: verification::build_workflow(),
    }
  }

  pub fn policy(&self) -> &EnginePolicy {
    &self.parts.policy
  }

  pub fn gateway_public_key(&self) -> &str {
    self.parts.gateway.public_key()
  }

  /// Places an order. COD orders are confirmed and settled before this returns; gateway
  /// orders come back pending with the intent the customer must pay. A COD order that
  /// runs short of stock at settlement is failed and reported as insufficient stock.
  #[instrument(
    name = "OrderEngine::place_order",
    skip_all,
    fields(payment_mode = %request.payment_mode, items = request.items.len(), total = %request.total)
  )]
  pub async fn place_order(&self, request: NewOrder) -> OrderResult<Placement> {
    let ctx = StepContext::new(PlacementCtx::new(self.parts.clone(), request));
    if self.placement.run(ctx.clone()).await? == RunOutcome::Stopped {
      return Err(
        WorkflowError::UnexpectedStop {
          workflow: self.placement.name().to_string(),
        }
        .into(),
      );
    }

    let guard = ctx.read();
    let order = guard.order.clone().ok_or_else(|| WorkflowError::MissingState {
      step_name: self.placement.name().to_string(),
      missing: "order".to_string(),
    })?;
    let gateway = guard.intent.as_ref().map(|intent| GatewayCheckout {
      intent_id: intent.id.clone(),
      public_key: self.parts.gateway.public_key().to_string(),
      amount_minor: intent.amount_minor,
      currency: intent.currency.clone(),
    });
    Ok(Placement { order, gateway })
  }

  /// Verifies a gateway callback and, the first time, records the payment and settles.
  /// Replays of an already-recorded payment succeed without side effects.
  #[instrument(
    name = "OrderEngine::verify_payment",
    skip_all,
    fields(gateway_order_id = %callback.gateway_order_id, gateway_payment_id = %callback.gateway_payment_id)
  )]
  pub async fn verify_payment(&self, callback: PaymentCallback) -> OrderResult<PaymentAck> {
    let ctx = StepContext::new(VerificationCtx::new(self.parts.clone(), callback));
    // A stop here means the payment was already recorded.
    self.verification.run(ctx.clone()).await?;

    let guard = ctx.read();
    let order = guard.order.as_ref().ok_or_else(|| WorkflowError::MissingState {
      step_name: self.verification.name().to_string(),
      missing: "order".to_string(),
    })?;
    Ok(PaymentAck {
      order_id: order.id,
      order_number: order.order_number.clone(),
      already_processed: guard.already_processed,
    })
  }

  /// Looks an order up by storage id or by order number.
  #[instrument(name = "OrderEngine::get_order", skip(self))]
  pub async fn get_order(&self, reference: &str) -> OrderResult<Order> {
    let reference = reference.trim();
    if reference.is_empty() {
      return Err(OrderError::Validation("Order reference is required".to_string()));
    }
    let by_id = match Uuid::parse_str(reference) {
      Ok(id) => self.parts.ledger.find_by_id(id).await?,
      Err(_) => None,
    };
    let found = match by_id {
      Some(order) => Some(order),
      None => self.parts.ledger.find_by_number(reference).await?,
    };
    found.ok_or_else(|| OrderError::OrderNotFound(reference.to_string()))
  }

  /// Newest orders first; with `since`, only orders created after it.
  #[instrument(name = "OrderEngine::list_orders", skip(self))]
  pub async fn list_orders(&self, since: Option<DateTime<Utc>>, limit: Option<usize>) -> OrderResult<Vec<Order>> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let query = OrderQuery {
      created_after: since,
      limit: Some(limit),
      ..OrderQuery::default()
    };
    Ok(self.parts.ledger.list(&query).await?)
  }

  /// Operator edit of the fulfillment status. Never settles, never touches the total.
  #[instrument(name = "OrderEngine::update_fulfillment_status", skip(self), fields(status = %status))]
  pub async fn update_fulfillment_status(&self, reference: &str, status: FulfillmentStatus) -> OrderResult<Order> {
    let current = self.get_order(reference).await?;
    let policy = self.parts.policy.transitions;
    if !policy.allows_fulfillment(current.fulfillment_status, status) {
      return Err(OrderError::InvalidTransition {
        field: "fulfillmentStatus",
        from: current.fulfillment_status.to_string(),
        to: status.to_string(),
      });
    }
    let expected = match policy {
      TransitionPolicy::Permissive => None,
      TransitionPolicy::Strict => Some(current.fulfillment_status),
    };

    match self.parts.ledger.set_fulfillment_status(current.id, expected, status).await? {
      Some(updated) => {
        info!(order_number = %updated.order_number, from = %current.fulfillment_status, "Fulfillment status updated.");
        Ok(updated)
      }
      None => Err(self.lost_update(current.id, "fulfillmentStatus", status.to_string()).await),
    }
  }

  /// Operator edit of the payment status. Marking an order paid here does not settle it.
  #[instrument(name = "OrderEngine::update_payment_status", skip(self), fields(status = %status))]
  pub async fn update_payment_status(&self, reference: &str, status: PaymentStatus) -> OrderResult<Order> {
    let current = self.get_order(reference).await?;
    let policy = self.parts.policy.transitions;
    if !policy.allows_payment(current.payment_status, status) {
      return Err(OrderError::InvalidTransition {
        field: "paymentStatus",
        from: current.payment_status.to_string(),
        to: status.to_string(),
      });
    }
    let expected = match policy {
      TransitionPolicy::Permissive => None,
      TransitionPolicy::Strict => Some(current.payment_status),
    };

    match self.parts.ledger.set_payment_status(current.id, expected, status).await? {
      Some(updated) => {
        info!(order_number = %updated.order_number, from = %current.payment_status, "Payment status updated.");
        Ok(updated)
      }
      None => Err(self.lost_update(current.id, "paymentStatus", status.to_string()).await),
    }
  }

  /// A conditional status write matched nothing: the order vanished or changed underneath.
  async fn lost_update(&self, id: Uuid, field: &'static str, to: String) -> OrderError {
    match self.parts.ledger.find_by_id(id).await {
      Ok(Some(latest)) => {
        let from = match field {
          "fulfillmentStatus" => latest.fulfillment_status.to_string(),
          _ => latest.payment_status.to_string(),
        };
        OrderError::InvalidTransition { field, from, to }
      }
      Ok(None) => OrderError::OrderNotFound(id.to_string()),
      Err(e) => e.into(),
    }
  }

  /// Settles every order whose settlement is due and reports orders stuck mid-settlement.
  #[instrument(name = "OrderEngine::redrive_settlements", skip(self))]
  pub async fn redrive_settlements(&self) -> OrderResult<RedriveReport> {
    settlement::redrive(&self.parts).await
  }

  /// Fails gateway orders left unpaid for longer than `older_than`.
  #[instrument(name = "OrderEngine::expire_stale_pending_orders", skip(self))]
  pub async fn expire_stale_pending_orders(&self, older_than: Duration) -> OrderResult<Vec<Order>> {
    let cutoff = Utc::now() - older_than;
    let expired = self.parts.ledger.expire_pending_gateway_orders(cutoff).await?;
    for order in &expired {
      info!(order_number = %order.order_number, created_at = %order.created_at, "Expired abandoned gateway order.");
    }
    Ok(expired)
  }
}
