// tests/placement_tests.rs
mod common;

use common::*;
use kilnworks_core::{
  CatalogStore, EnginePolicy, FulfillmentStatus, MemoryStore, Money, OrderError, OrderLedger, Payment, PaymentMode,
  PaymentStatus, RedriveReport, SettlementState, StockFloor, StockPolicy, TotalCheck,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn cash_order_settles_and_confirms_before_returning() {
  let h = Harness::new(EnginePolicy::default());
  let vase = h.seed_product("Celadon vase", "Vases", 250_000, 10);

  let placement = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(vase, 2, 250_000)]))
    .await
    .unwrap();

  let order = &placement.order;
  assert!(placement.gateway.is_none());
  assert_eq!(order.payment, Payment::CashOnDelivery);
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(order.fulfillment_status, FulfillmentStatus::Confirmed);
  assert_eq!(order.settlement, SettlementState::Settled);
  assert!(order.settled_at.is_some());
  assert_eq!(order.total, Money::from_minor(500_000));
  assert_eq!(h.stock(vase), 8);
  assert_eq!(h.notifier.sent(), vec![order.order_number.clone()]);
}

#[tokio::test]
async fn gateway_order_waits_for_payment_without_touching_stock() {
  let h = Harness::new(EnginePolicy::default());
  let mug = h.seed_product("Speckled mug", "Mugs", 10_000, 5);

  let placement = h
    .engine
    .place_order(checkout(PaymentMode::Gateway, &[(mug, 3, 10_000)]))
    .await
    .unwrap();

  let checkout_details = placement.gateway.expect("gateway orders return checkout details");
  assert_eq!(checkout_details.amount_minor, 30_000);
  assert_eq!(checkout_details.currency, "INR");
  assert_eq!(checkout_details.public_key, GATEWAY_PUBLIC_KEY);

  let order = placement.order;
  assert_eq!(order.payment.gateway_order_id(), Some(checkout_details.intent_id.as_str()));
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(order.fulfillment_status, FulfillmentStatus::Pending);
  assert_eq!(order.settlement, SettlementState::NotDue);
  assert_eq!(h.stock(mug), 5);
  assert!(h.notifier.sent().is_empty());

  let intents = h.gateway.intents();
  assert_eq!(intents.len(), 1);
  assert_eq!(intents[0].1, order.id.to_string(), "receipt is the order's storage id");
}

#[tokio::test]
async fn failed_intent_persists_nothing() {
  let h = Harness::new(EnginePolicy::default());
  let mug = h.seed_product("Speckled mug", "Mugs", 10_000, 5);
  h.gateway.fail.store(true, Ordering::SeqCst);

  let err = h
    .engine
    .place_order(checkout(PaymentMode::Gateway, &[(mug, 1, 10_000)]))
    .await
    .unwrap_err();

  assert!(matches!(err, OrderError::Gateway { .. }));
  assert_eq!(h.store.order_count(), 0);
  assert_eq!(h.stock(mug), 5);
}

#[tokio::test]
async fn strict_stock_policy_rejects_oversell_at_placement() {
  let h = Harness::new(EnginePolicy::default());
  let plate = h.seed_product("Dinner plate", "Plates", 80_000, 2);

  // Two lines for the same product add up past what is on hand.
  let err = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(plate, 2, 80_000), (plate, 1, 80_000)]))
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    OrderError::InsufficientStock { requested: 3, available: 2, .. }
  ));
  assert_eq!(h.store.order_count(), 0);
  assert_eq!(h.stock(plate), 2);
}

#[tokio::test]
async fn cash_order_that_runs_short_at_settlement_is_failed_not_left_live() {
  let store = Arc::new(MemoryStore::new());

  // Reads claim plenty of stock, so placement gets past validation and fails at settlement.
  let catalog = Arc::new(StaleCatalog {
    inner: store.clone(),
    reported_stock: 10,
  });
  let h = Harness::assemble(
    store.clone(),
    store.clone(),
    catalog,
    EnginePolicy {
      redrive_grace: chrono::Duration::zero(),
      ..EnginePolicy::default()
    },
  );
  let vase = h.seed_product("Celadon vase", "Vases", 250_000, 0);

  let err = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(vase, 1, 250_000)]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    OrderError::InsufficientStock {
      requested: 1,
      available: 0,
      ..
    }
  ));

  let orders = store.list(&Default::default()).await.unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0].fulfillment_status, FulfillmentStatus::Failed);
  assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
  assert_eq!(orders[0].settlement, SettlementState::NotDue);
  let today = h.reporter.revenue_series(1).await.unwrap();
  assert_eq!(today[0].total, Money::ZERO);

  // Restocking later does not resurrect it.
  store.adjust_stock(vase, 5, StockFloor::Unbounded).await.unwrap();
  assert_eq!(h.engine.redrive_settlements().await.unwrap(), RedriveReport::default());
  assert_eq!(h.stock(vase), 5);
  assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn permissive_stock_policy_lets_stock_go_negative() {
  let h = Harness::new(EnginePolicy {
    stock: StockPolicy::Permissive,
    ..EnginePolicy::default()
  });
  let plate = h.seed_product("Dinner plate", "Plates", 80_000, 1);

  let placement = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(plate, 3, 80_000)]))
    .await
    .unwrap();

  assert_eq!(placement.order.settlement, SettlementState::Settled);
  assert_eq!(h.stock(plate), -2);
  assert!(!h.store.product(plate).unwrap().in_stock);
}

#[tokio::test]
async fn unknown_products_and_empty_carts_are_validation_errors() {
  let h = Harness::new(EnginePolicy::default());

  let err = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(Uuid::new_v4(), 1, 1_000)]))
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::Validation(ref m) if m.contains("does not exist")));

  let err = h.engine.place_order(checkout(PaymentMode::Cod, &[])).await.unwrap_err();
  assert!(matches!(err, OrderError::Validation(_)));

  let mut missing_email = checkout(PaymentMode::Cod, &[(Uuid::new_v4(), 1, 1_000)]);
  missing_email.customer.email = String::new();
  let err = h.engine.place_order(missing_email).await.unwrap_err();
  assert!(matches!(err, OrderError::Validation(ref m) if m.contains("email")));
  assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn submitted_total_is_trusted_by_default() {
  let h = Harness::new(EnginePolicy::default());
  let bowl = h.seed_product("Rice bowl", "Bowls", 45_000, 4);

  let mut request = checkout(PaymentMode::Cod, &[(bowl, 1, 45_000)]);
  request.total = Money::from_minor(1_000);
  let placement = h.engine.place_order(request).await.unwrap();

  assert_eq!(placement.order.total, Money::from_minor(1_000));
}

#[tokio::test]
async fn line_item_total_check_rejects_mismatches() {
  let h = Harness::new(EnginePolicy {
    total_check: TotalCheck::MatchLineItems,
    ..EnginePolicy::default()
  });
  let bowl = h.seed_product("Rice bowl", "Bowls", 45_000, 4);

  let mut tampered = checkout(PaymentMode::Cod, &[(bowl, 2, 45_000)]);
  tampered.total = Money::from_minor(45_000);
  let err = h.engine.place_order(tampered).await.unwrap_err();
  assert!(matches!(err, OrderError::Validation(ref m) if m.contains("does not match")));

  // Express shipping adds the configured 150.00 fee.
  let mut express = checkout(PaymentMode::Cod, &[(bowl, 2, 45_000)]);
  express.shipping_method = "Express".to_string();
  express.total = Money::from_minor(90_000 + 15_000);
  let placement = h.engine.place_order(express).await.unwrap();
  assert_eq!(placement.order.total, Money::from_minor(105_000));
  assert_eq!(placement.order.shipping_method, "Express");

  let mut unknown = checkout(PaymentMode::Cod, &[(bowl, 1, 45_000)]);
  unknown.shipping_method = "carrier pigeon".to_string();
  let err = h.engine.place_order(unknown).await.unwrap_err();
  assert!(matches!(err, OrderError::Validation(ref m) if m.contains("shipping method")));
}

#[tokio::test]
async fn order_number_collisions_are_retried_with_fresh_numbers() {
  let store = Arc::new(kilnworks_core::MemoryStore::new());
  let ledger = Arc::new(CollidingLedger {
    inner: store.clone(),
    collisions: AtomicUsize::new(2),
    attempted_numbers: Default::default(),
  });
  let h = Harness::assemble(store.clone(), ledger.clone(), store, EnginePolicy::default());
  let cup = h.seed_product("Yunomi", "Cups", 30_000, 3);

  let placement = h
    .engine
    .place_order(checkout(PaymentMode::Gateway, &[(cup, 1, 30_000)]))
    .await
    .unwrap();

  let attempts = ledger.attempted_numbers.lock().clone();
  assert_eq!(attempts.len(), 3);
  assert_eq!(attempts.last(), Some(&placement.order.order_number));
  assert_ne!(attempts[0], attempts[1]);
  // One intent, reused across every attempt.
  assert_eq!(h.gateway.intents().len(), 1);
  assert!(ledger.find_by_number(placement.order.order_number.as_str()).await.unwrap().is_some());
}

#[tokio::test]
async fn persistent_collisions_surface_as_store_conflicts() {
  let store = Arc::new(kilnworks_core::MemoryStore::new());
  let ledger = Arc::new(CollidingLedger {
    inner: store.clone(),
    collisions: AtomicUsize::new(100),
    attempted_numbers: Default::default(),
  });
  let h = Harness::assemble(store.clone(), ledger.clone(), store, EnginePolicy::default());
  let cup = h.seed_product("Yunomi", "Cups", 30_000, 3);

  let err = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(cup, 1, 30_000)]))
    .await
    .unwrap_err();

  assert!(matches!(err, OrderError::Store { .. }));
  assert_eq!(ledger.attempted_numbers.lock().len(), 5);
  assert_eq!(h.stock(cup), 3);
}

#[tokio::test]
async fn notifier_failure_does_not_fail_placement() {
  let h = Harness::new(EnginePolicy::default());
  let vase = h.seed_product("Celadon vase", "Vases", 250_000, 1);
  h.notifier.fail.store(true, Ordering::SeqCst);

  let placement = h
    .engine
    .place_order(checkout(PaymentMode::Cod, &[(vase, 1, 250_000)]))
    .await
    .unwrap();

  assert_eq!(placement.order.settlement, SettlementState::Settled);
  assert_eq!(h.stock(vase), 0);
}
