// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every fixture.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kilnworks_core::domain::{GatewayCapture, SettlementState};
use kilnworks_core::ports::{OrderQuery, PaymentClaim, ORDER_NUMBER_CONSTRAINT};
use kilnworks_core::{
  CatalogStore, Collaborators, CustomerSnapshot, EnginePolicy, FulfillmentStatus, GatewayError, LineItem, MemoryStore,
  Money, NewOrder, Notifier, NotifyError, Order, OrderEngine, OrderLedger, OrderNumber, Payment, PaymentCallback,
  PaymentGateway, PaymentIntent, PaymentMode, PaymentStatus, ProductId, ProductSnapshot, Reporter, SignatureVerifier,
  StockFloor, StoreError,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

pub const GATEWAY_SECRET: &str = "test_gateway_secret";
pub const GATEWAY_PUBLIC_KEY: &str = "rzp_test_public";

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Collaborator doubles ---

/// Records every confirmation it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
  sent: Mutex<Vec<OrderNumber>>,
  pub fail: AtomicBool,
}

impl RecordingNotifier {
  pub fn sent(&self) -> Vec<OrderNumber> {
    self.sent.lock().clone()
  }

  pub fn sent_for(&self, number: &OrderNumber) -> usize {
    self.sent.lock().iter().filter(|n| *n == number).count()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(NotifyError("smtp relay down".to_string()));
    }
    self.sent.lock().push(order.order_number.clone());
    Ok(())
  }
}

/// Hands out sequential intent ids, or refuses when told to.
#[derive(Default)]
pub struct ScriptedGateway {
  next: AtomicUsize,
  pub fail: AtomicBool,
  intents: Mutex<Vec<(PaymentIntent, String)>>,
}

impl ScriptedGateway {
  /// `(intent, receipt)` pairs in creation order.
  pub fn intents(&self) -> Vec<(PaymentIntent, String)> {
    self.intents.lock().clone()
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  async fn create_intent(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<PaymentIntent, GatewayError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(GatewayError::Unavailable("connection reset".to_string()));
    }
    let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
    let intent = PaymentIntent {
      id: format!("order_test_{:06}", n),
      amount_minor,
      currency: currency.to_string(),
    };
    self.intents.lock().push((intent.clone(), receipt.to_string()));
    Ok(intent)
  }

  fn public_key(&self) -> &str {
    GATEWAY_PUBLIC_KEY
  }
}

/// Catalog that refuses stock adjustments for one product and otherwise defers to the
/// memory store. With `fail_restores`, positive adjustments fail too.
pub struct FailingCatalog {
  pub inner: Arc<MemoryStore>,
  pub fail_for: ProductId,
  pub fail_restores: bool,
}

#[async_trait]
impl CatalogStore for FailingCatalog {
  async fn get_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
    self.inner.get_product(id).await
  }

  async fn adjust_stock(&self, id: ProductId, delta: i64, floor: StockFloor) -> Result<i64, StoreError> {
    if id == self.fail_for || (self.fail_restores && delta > 0) {
      return Err(StoreError::Backend {
        source: anyhow::anyhow!("catalog write timed out"),
      });
    }
    self.inner.adjust_stock(id, delta, floor).await
  }
}

/// Catalog whose reads always report `reported_stock`, as a lagging replica would, while
/// stock adjustments go to the memory store.
pub struct StaleCatalog {
  pub inner: Arc<MemoryStore>,
  pub reported_stock: i64,
}

#[async_trait]
impl CatalogStore for StaleCatalog {
  async fn get_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
    Ok(self.inner.get_product(id).await?.map(|mut product| {
      product.stock_qty = self.reported_stock;
      product.in_stock = self.reported_stock > 0;
      product
    }))
  }

  async fn adjust_stock(&self, id: ProductId, delta: i64, floor: StockFloor) -> Result<i64, StoreError> {
    self.inner.adjust_stock(id, delta, floor).await
  }
}

/// Ledger that reports an order-number collision for the first `collisions` inserts.
pub struct CollidingLedger {
  pub inner: Arc<MemoryStore>,
  pub collisions: AtomicUsize,
  pub attempted_numbers: Mutex<Vec<OrderNumber>>,
}

#[async_trait]
impl OrderLedger for CollidingLedger {
  async fn insert(&self, order: &Order) -> Result<(), StoreError> {
    self.attempted_numbers.lock().push(order.order_number.clone());
    let remaining = self.collisions.load(Ordering::SeqCst);
    if remaining > 0 {
      self.collisions.store(remaining - 1, Ordering::SeqCst);
      return Err(StoreError::Conflict {
        constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
      });
    }
    self.inner.insert(order).await
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
    self.inner.find_by_id(id).await
  }

  async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
    self.inner.find_by_number(order_number).await
  }

  async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, StoreError> {
    self.inner.find_by_gateway_order_id(gateway_order_id).await
  }

  async fn claim_payment(&self, gateway_order_id: &str, capture: &GatewayCapture) -> Result<PaymentClaim, StoreError> {
    self.inner.claim_payment(gateway_order_id, capture).await
  }

  async fn set_fulfillment_status(
    &self,
    id: Uuid,
    expected: Option<FulfillmentStatus>,
    status: FulfillmentStatus,
  ) -> Result<Option<Order>, StoreError> {
    self.inner.set_fulfillment_status(id, expected, status).await
  }

  async fn set_payment_status(
    &self,
    id: Uuid,
    expected: Option<PaymentStatus>,
    status: PaymentStatus,
  ) -> Result<Option<Order>, StoreError> {
    self.inner.set_payment_status(id, expected, status).await
  }

  async fn transition_settlement(
    &self,
    id: Uuid,
    from: SettlementState,
    to: SettlementState,
  ) -> Result<bool, StoreError> {
    self.inner.transition_settlement(id, from, to).await
  }

  async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
    self.inner.list(query).await
  }

  async fn expire_pending_gateway_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
    self.inner.expire_pending_gateway_orders(cutoff).await
  }
}

// --- Harness ---

pub struct Harness {
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<ScriptedGateway>,
  pub notifier: Arc<RecordingNotifier>,
  pub verifier: SignatureVerifier,
  pub engine: OrderEngine,
  pub reporter: Reporter,
}

impl Harness {
  pub fn new(policy: EnginePolicy) -> Self {
    let store = Arc::new(MemoryStore::new());
    Self::assemble(store.clone(), store.clone(), store, policy)
  }

  /// Same memory store underneath, but with the given ledger and catalog in front of it.
  pub fn assemble(
    store: Arc<MemoryStore>,
    ledger: Arc<dyn OrderLedger>,
    catalog: Arc<dyn CatalogStore>,
    policy: EnginePolicy,
  ) -> Self {
    setup_tracing();
    let gateway = Arc::new(ScriptedGateway::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let verifier = SignatureVerifier::new(GATEWAY_SECRET).unwrap();
    let engine = OrderEngine::new(
      Collaborators {
        ledger: ledger.clone(),
        catalog: catalog.clone(),
        gateway: gateway.clone(),
        notifier: notifier.clone(),
        verifier: verifier.clone(),
      },
      policy,
    );
    let reporter = Reporter::new(ledger, catalog);
    Self {
      store,
      gateway,
      notifier,
      verifier,
      engine,
      reporter,
    }
  }

  pub fn seed_product(&self, name: &str, category: &str, price_minor: i64, stock: i64) -> ProductId {
    let id = Uuid::new_v4();
    self.store.upsert_product(ProductSnapshot {
      id,
      name: name.to_string(),
      category: category.to_string(),
      price: Money::from_minor(price_minor),
      stock_qty: stock,
      in_stock: stock > 0,
    });
    id
  }

  pub fn stock(&self, id: ProductId) -> i64 {
    self.store.product(id).map(|p| p.stock_qty).unwrap_or_default()
  }

  /// A correctly signed callback for the given gateway order.
  pub fn signed_callback(&self, gateway_order_id: &str, payment_id: &str) -> PaymentCallback {
    PaymentCallback {
      gateway_order_id: gateway_order_id.to_string(),
      gateway_payment_id: payment_id.to_string(),
      client_signature: self.verifier.sign(gateway_order_id, payment_id),
    }
  }
}

// --- Fixtures ---

pub fn customer() -> CustomerSnapshot {
  CustomerSnapshot {
    email: "meera@example.com".to_string(),
    name: "Meera Rao".to_string(),
    phone: Some("+91 98450 00000".to_string()),
    address_line1: "4 Kiln Street".to_string(),
    address_line2: None,
    city: "Bengaluru".to_string(),
    state: Some("KA".to_string()),
    postal_code: "560001".to_string(),
    country: "IN".to_string(),
  }
}

/// A checkout with `(product, quantity, unit price in minor units)` lines, standard
/// shipping, and a total equal to the item subtotal.
pub fn checkout(mode: PaymentMode, lines: &[(ProductId, u32, i64)]) -> NewOrder {
  let items: Vec<LineItem> = lines
    .iter()
    .map(|(product_id, quantity, price)| LineItem {
      product_id: *product_id,
      name: None,
      quantity: *quantity,
      unit_price: Money::from_minor(*price),
    })
    .collect();
  let total = lines.iter().map(|(_, q, p)| Money::from_minor(p * i64::from(*q))).sum();
  NewOrder {
    customer: customer(),
    items,
    total,
    shipping_method: "standard".to_string(),
    payment_mode: mode,
  }
}

/// A settled COD order stamped with `created_at`, for inserting straight into a ledger.
pub fn historical_order(created_at: DateTime<Utc>, lines: &[(ProductId, u32, i64)], status: FulfillmentStatus) -> Order {
  let request = checkout(PaymentMode::Cod, lines);
  Order {
    id: Uuid::new_v4(),
    order_number: OrderNumber::generate(),
    customer: request.customer,
    items: request.items,
    shipping_method: request.shipping_method,
    total: request.total,
    currency: "INR".to_string(),
    fulfillment_status: status,
    payment: Payment::CashOnDelivery,
    payment_status: PaymentStatus::Pending,
    settlement: SettlementState::Settled,
    settled_at: Some(created_at),
    created_at,
    updated_at: created_at,
  }
}
