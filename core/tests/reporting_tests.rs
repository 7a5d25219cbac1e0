// tests/reporting_tests.rs
mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use common::*;
use kilnworks_core::reporting::UNCATEGORIZED;
use kilnworks_core::{EnginePolicy, FulfillmentStatus, Money, OrderError, OrderLedger};
use uuid::Uuid;

fn at(day: u32, hour: u32) -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn revenue_series_fills_empty_days_with_zero() {
  let h = Harness::new(EnginePolicy::default());
  let cup = h.seed_product("Yunomi", "Cups", 30_000, 100);
  let orders = [
    historical_order(at(1, 9), &[(cup, 1, 30_000)], FulfillmentStatus::Delivered),
    historical_order(at(1, 22), &[(cup, 2, 30_000)], FulfillmentStatus::Confirmed),
    historical_order(at(5, 12), &[(cup, 1, 30_000)], FulfillmentStatus::Shipped),
    // Excluded by status.
    historical_order(at(5, 13), &[(cup, 9, 30_000)], FulfillmentStatus::Cancelled),
    historical_order(at(6, 8), &[(cup, 9, 30_000)], FulfillmentStatus::Pending),
    historical_order(at(6, 9), &[(cup, 9, 30_000)], FulfillmentStatus::Failed),
    // Outside the window.
    historical_order(Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap(), &[(cup, 1, 30_000)], FulfillmentStatus::Delivered),
  ];
  for order in &orders {
    h.store.insert(order).await.unwrap();
  }

  let last_day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
  let series = h.reporter.revenue_series_ending(7, last_day).await.unwrap();

  assert_eq!(series.len(), 7);
  assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
  assert_eq!(series[6].date, last_day);
  let totals: Vec<i64> = series.iter().map(|p| p.total.minor()).collect();
  assert_eq!(totals, vec![90_000, 0, 0, 0, 30_000, 0, 0]);

  let json = serde_json::to_value(&series[0]).unwrap();
  assert_eq!(json, serde_json::json!({"date": "2024-03-01", "total": 900.0}));
}

#[tokio::test]
async fn revenue_series_rejects_out_of_range_windows() {
  let h = Harness::new(EnginePolicy::default());
  assert!(matches!(h.reporter.revenue_series(0).await, Err(OrderError::Validation(_))));
  assert!(matches!(h.reporter.revenue_series(367).await, Err(OrderError::Validation(_))));
  assert_eq!(h.reporter.revenue_series(366).await.unwrap().len(), 366);
  assert!(h.reporter.revenue_series(1).await.unwrap()[0].total == Money::ZERO);
}

#[tokio::test]
async fn sales_are_grouped_by_current_category_with_top_products() {
  let h = Harness::new(EnginePolicy::default());
  let bowl = h.seed_product("Rice bowl", "Bowls", 45_000, 100);
  let mug = h.seed_product("Speckled mug", "Mugs", 10_000, 100);
  let vase = h.seed_product("Celadon vase", "Vases", 250_000, 100);
  let plate = h.seed_product("Dinner plate", "Plates", 80_000, 100);
  let jar = h.seed_product("Salt jar", "Storage", 60_000, 100);
  let cup = h.seed_product("Yunomi", "Cups", 30_000, 100);
  let retired = Uuid::new_v4();

  let orders = [
    historical_order(at(2, 10), &[(bowl, 2, 45_000), (mug, 3, 10_000)], FulfillmentStatus::Delivered),
    historical_order(at(3, 10), &[(vase, 1, 250_000)], FulfillmentStatus::Confirmed),
    historical_order(at(3, 11), &[(plate, 1, 80_000), (jar, 1, 60_000)], FulfillmentStatus::Shipped),
    historical_order(at(4, 10), &[(cup, 1, 30_000), (retired, 1, 5_000)], FulfillmentStatus::Delivered),
    historical_order(at(4, 11), &[(mug, 50, 10_000)], FulfillmentStatus::Cancelled),
  ];
  for order in &orders {
    h.store.insert(order).await.unwrap();
  }

  let breakdown = h.reporter.sales_by_category().await.unwrap();

  let categories: Vec<(&str, i64, u64)> = breakdown
    .category_totals
    .iter()
    .map(|c| (c.category.as_str(), c.revenue.minor(), c.quantity))
    .collect();
  assert_eq!(
    categories,
    vec![
      ("Vases", 250_000, 1),
      ("Bowls", 90_000, 2),
      ("Plates", 80_000, 1),
      ("Storage", 60_000, 1),
      ("Cups", 30_000, 1),
      ("Mugs", 30_000, 3),
      (UNCATEGORIZED, 5_000, 1),
    ]
  );

  let top: Vec<&str> = breakdown.top_products.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(top.len(), 5);
  assert_eq!(&top[..4], &["Celadon vase", "Rice bowl", "Dinner plate", "Salt jar"]);
  // Cup and mug tie on revenue; the tie is broken by product id.
  let expected_fifth = if cup < mug { "Yunomi" } else { "Speckled mug" };
  assert_eq!(top[4], expected_fifth);

  // Re-categorising a product reassigns its history.
  let mut renamed = h.store.product(vase).unwrap();
  renamed.category = "Vessels".to_string();
  h.store.upsert_product(renamed);
  let again = h.reporter.sales_by_category().await.unwrap();
  assert_eq!(again.category_totals[0].category, "Vessels");
}

#[tokio::test]
async fn reports_are_deterministic_for_a_fixed_ledger() {
  let h = Harness::new(EnginePolicy::default());
  let a = h.seed_product("A", "Same", 10_000, 10);
  let b = h.seed_product("B", "Same", 10_000, 10);
  for (day, product) in [(2, a), (3, b), (4, a)] {
    h.store
      .insert(&historical_order(at(day, 10), &[(product, 1, 10_000)], FulfillmentStatus::Delivered))
      .await
      .unwrap();
  }

  let first = h.reporter.sales_by_category().await.unwrap();
  let second = h.reporter.sales_by_category().await.unwrap();
  assert_eq!(first, second);
  assert_eq!(first.category_totals.len(), 1);
  assert_eq!(first.category_totals[0].quantity, 3);
}
