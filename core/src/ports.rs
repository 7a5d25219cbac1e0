// core/src/ports.rs

//! Contracts the order core consumes: the order ledger, the catalog store, the payment
//! gateway and the notifier. Backends live elsewhere (`memory` here, Postgres and the
//! mock adapters in the server crate).

use crate::domain::{
  FulfillmentStatus, GatewayCapture, Order, PaymentStatus, ProductId, ProductSnapshot, SettlementState,
};
use crate::error::{GatewayError, NotifyError, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Name of the unique constraint on order numbers. Backends report it in
/// [`StoreError::Conflict`] so placement knows a retry with a fresh number is safe.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";
pub const GATEWAY_ORDER_ID_CONSTRAINT: &str = "orders_gateway_order_id_key";

/// Result of the conditional `pending -> paid` transition.
#[derive(Debug, Clone)]
pub enum PaymentClaim {
  /// This call performed the transition; settlement is now due.
  Claimed(Order),
  AlreadyPaid(Order),
  /// The order exists but its payment status is neither pending nor paid.
  NotPending(Order),
  Missing,
}

/// Filter for ledger listings. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
  /// Inclusive lower bound on `created_at`.
  pub created_from: Option<DateTime<Utc>>,
  /// Exclusive lower bound on `created_at`, for "new since" polling.
  pub created_after: Option<DateTime<Utc>>,
  pub settlement: Option<SettlementState>,
  pub limit: Option<usize>,
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
  /// Persists a new order. Duplicate order numbers or gateway order ids fail with
  /// [`StoreError::Conflict`].
  async fn insert(&self, order: &Order) -> Result<(), StoreError>;

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

  async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

  async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, StoreError>;

  /// Atomically moves the order with `gateway_order_id` from payment `pending` to `paid`,
  /// recording `capture` and marking settlement due, all in one conditional write.
  async fn claim_payment(&self, gateway_order_id: &str, capture: &GatewayCapture) -> Result<PaymentClaim, StoreError>;

  /// Writes the fulfillment status. With `expected` set, the write only happens if the
  /// current value matches. `None` when the order is missing or the expectation failed.
  async fn set_fulfillment_status(
    &self,
    id: Uuid,
    expected: Option<FulfillmentStatus>,
    status: FulfillmentStatus,
  ) -> Result<Option<Order>, StoreError>;

  /// Payment status counterpart of [`OrderLedger::set_fulfillment_status`].
  async fn set_payment_status(
    &self,
    id: Uuid,
    expected: Option<PaymentStatus>,
    status: PaymentStatus,
  ) -> Result<Option<Order>, StoreError>;

  /// Compare-and-set on the settlement marker. Stamps `settled_at` when moving to
  /// [`SettlementState::Settled`]. Returns whether this call made the change.
  async fn transition_settlement(&self, id: Uuid, from: SettlementState, to: SettlementState)
    -> Result<bool, StoreError>;

  async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError>;

  /// Marks gateway orders created before `cutoff` that are still payment `pending` as
  /// payment and fulfillment `failed`. Conditional on still being pending, so it cannot
  /// overwrite a verified payment. Returns the expired orders.
  async fn expire_pending_gateway_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}

/// Lower bound enforced by [`CatalogStore::adjust_stock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockFloor {
  /// Reject adjustments that would leave negative stock.
  Zero,
  Unbounded,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
  async fn get_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError>;

  /// Applies `delta` to the product's stock as one atomic operation and returns the new
  /// quantity. `in_stock` follows `stock_qty > 0` afterwards.
  ///
  /// Fails with [`StoreError::Missing`] for unknown products and
  /// [`StoreError::InsufficientStock`] when `floor` would be violated.
  async fn adjust_stock(&self, id: ProductId, delta: i64, floor: StockFloor) -> Result<i64, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
  pub id: String,
  pub amount_minor: i64,
  pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_intent(&self, amount_minor: i64, currency: &str, receipt: &str)
    -> Result<PaymentIntent, GatewayError>;

  /// Key material the storefront needs to open the gateway's checkout.
  fn public_key(&self) -> &str;
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError>;
}
