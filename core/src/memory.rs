// core/src/memory.rs

//! In-process [`OrderLedger`] and [`CatalogStore`] backed by `parking_lot` locks.
//!
//! Every conditional write happens under a single write lock, so the compare-and-set
//! guarantees hold across tasks and threads exactly as the SQL backend's conditional
//! updates do. Used by tests and by the server when no database is configured.

use crate::domain::{
  FulfillmentStatus, GatewayCapture, Order, Payment, PaymentMode, PaymentStatus, ProductId, ProductSnapshot,
  SettlementState,
};
use crate::error::StoreError;
use crate::ports::{
  CatalogStore, OrderLedger, OrderQuery, PaymentClaim, StockFloor, GATEWAY_ORDER_ID_CONSTRAINT,
  ORDER_NUMBER_CONSTRAINT,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
  orders: HashMap<Uuid, Order>,
  by_number: HashMap<String, Uuid>,
  by_gateway_order: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
  products: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts or replaces a catalog product. `in_stock` is derived from the quantity.
  pub fn upsert_product(&self, mut product: ProductSnapshot) {
    product.in_stock = product.stock_qty > 0;
    self.products.write().insert(product.id, product);
  }

  pub fn product(&self, id: ProductId) -> Option<ProductSnapshot> {
    self.products.read().get(&id).cloned()
  }

  pub fn products(&self) -> Vec<ProductSnapshot> {
    self.products.read().values().cloned().collect()
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }
}

#[async_trait]
impl OrderLedger for MemoryStore {
  async fn insert(&self, order: &Order) -> Result<(), StoreError> {
    let mut tables = self.tables.write();
    if tables.orders.contains_key(&order.id) {
      return Err(StoreError::Conflict {
        constraint: "orders_pkey".to_string(),
      });
    }
    if tables.by_number.contains_key(order.order_number.as_str()) {
      return Err(StoreError::Conflict {
        constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
      });
    }
    if let Some(gateway_order_id) = order.payment.gateway_order_id() {
      if tables.by_gateway_order.contains_key(gateway_order_id) {
        return Err(StoreError::Conflict {
          constraint: GATEWAY_ORDER_ID_CONSTRAINT.to_string(),
        });
      }
      tables.by_gateway_order.insert(gateway_order_id.to_string(), order.id);
    }
    tables.by_number.insert(order.order_number.to_string(), order.id);
    tables.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
    Ok(self.tables.read().orders.get(&id).cloned())
  }

  async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
    let tables = self.tables.read();
    Ok(tables.by_number.get(order_number).and_then(|id| tables.orders.get(id)).cloned())
  }

  async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, StoreError> {
    let tables = self.tables.read();
    Ok(
      tables
        .by_gateway_order
        .get(gateway_order_id)
        .and_then(|id| tables.orders.get(id))
        .cloned(),
    )
  }

  async fn claim_payment(&self, gateway_order_id: &str, capture: &GatewayCapture) -> Result<PaymentClaim, StoreError> {
    let mut tables = self.tables.write();
    let Some(id) = tables.by_gateway_order.get(gateway_order_id).copied() else {
      return Ok(PaymentClaim::Missing);
    };
    let Some(order) = tables.orders.get_mut(&id) else {
      return Ok(PaymentClaim::Missing);
    };

    match order.payment_status {
      PaymentStatus::Paid => Ok(PaymentClaim::AlreadyPaid(order.clone())),
      PaymentStatus::Failed => Ok(PaymentClaim::NotPending(order.clone())),
      PaymentStatus::Pending => {
        if let Payment::Gateway { capture: slot, .. } = &mut order.payment {
          *slot = Some(capture.clone());
        }
        order.payment_status = PaymentStatus::Paid;
        if order.fulfillment_status == FulfillmentStatus::Pending {
          order.fulfillment_status = FulfillmentStatus::Confirmed;
        }
        if order.settlement == SettlementState::NotDue && !order.fulfillment_status.is_withdrawn() {
          order.settlement = SettlementState::Due;
        }
        order.updated_at = Utc::now();
        Ok(PaymentClaim::Claimed(order.clone()))
      }
    }
  }

  async fn set_fulfillment_status(
    &self,
    id: Uuid,
    expected: Option<FulfillmentStatus>,
    status: FulfillmentStatus,
  ) -> Result<Option<Order>, StoreError> {
    let mut tables = self.tables.write();
    let Some(order) = tables.orders.get_mut(&id) else {
      return Ok(None);
    };
    if expected.is_some_and(|expected| expected != order.fulfillment_status) {
      return Ok(None);
    }
    order.fulfillment_status = status;
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }

  async fn set_payment_status(
    &self,
    id: Uuid,
    expected: Option<PaymentStatus>,
    status: PaymentStatus,
  ) -> Result<Option<Order>, StoreError> {
    let mut tables = self.tables.write();
    let Some(order) = tables.orders.get_mut(&id) else {
      return Ok(None);
    };
    if expected.is_some_and(|expected| expected != order.payment_status) {
      return Ok(None);
    }
    order.payment_status = status;
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }

  async fn transition_settlement(
    &self,
    id: Uuid,
    from: SettlementState,
    to: SettlementState,
  ) -> Result<bool, StoreError> {
    let mut tables = self.tables.write();
    let Some(order) = tables.orders.get_mut(&id) else {
      return Ok(false);
    };
    if order.settlement != from {
      return Ok(false);
    }
    let now = Utc::now();
    order.settlement = to;
    if to == SettlementState::Settled {
      order.settled_at = Some(now);
    }
    order.updated_at = now;
    Ok(true)
  }

  async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
    let tables = self.tables.read();
    let mut orders: Vec<Order> = tables
      .orders
      .values()
      .filter(|o| query.created_from.map_or(true, |from| o.created_at >= from))
      .filter(|o| query.created_after.map_or(true, |after| o.created_at > after))
      .filter(|o| query.settlement.map_or(true, |state| o.settlement == state))
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    if let Some(limit) = query.limit {
      orders.truncate(limit);
    }
    Ok(orders)
  }

  async fn expire_pending_gateway_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
    let mut tables = self.tables.write();
    let now = Utc::now();
    let mut expired = Vec::new();
    for order in tables.orders.values_mut() {
      if order.payment_mode() == PaymentMode::Gateway
        && order.payment_status == PaymentStatus::Pending
        && order.created_at < cutoff
      {
        order.payment_status = PaymentStatus::Failed;
        order.fulfillment_status = FulfillmentStatus::Failed;
        order.updated_at = now;
        expired.push(order.clone());
      }
    }
    Ok(expired)
  }
}

#[async_trait]
impl CatalogStore for MemoryStore {
  async fn get_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
    Ok(self.products.read().get(&id).cloned())
  }

  async fn adjust_stock(&self, id: ProductId, delta: i64, floor: StockFloor) -> Result<i64, StoreError> {
    let mut products = self.products.write();
    let product = products
      .get_mut(&id)
      .ok_or_else(|| StoreError::Missing(format!("product {}", id)))?;

    let next = product.stock_qty.saturating_add(delta);
    if floor == StockFloor::Zero && next < 0 {
      return Err(StoreError::InsufficientStock {
        product_id: id,
        requested: delta.saturating_neg(),
        available: product.stock_qty.max(0),
      });
    }
    product.stock_qty = next;
    product.in_stock = next > 0;
    Ok(next)
  }
}
