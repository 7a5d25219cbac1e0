// core/src/reporting.rs

//! Read-only revenue and sales rollups over the order ledger.

use crate::domain::{Money, Order, ProductId, ProductSnapshot};
use crate::error::{OrderError, OrderResult};
use crate::ports::{CatalogStore, OrderLedger, OrderQuery};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const MAX_REVENUE_DAYS: u32 = 366;
pub const TOP_PRODUCT_COUNT: usize = 5;
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenuePoint {
  /// Calendar day in UTC, serialized as `YYYY-MM-DD`.
  pub date: NaiveDate,
  pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
  pub category: String,
  pub revenue: Money,
  pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
  pub product_id: ProductId,
  pub name: String,
  pub category: String,
  pub revenue: Money,
  pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesBreakdown {
  pub category_totals: Vec<CategoryTotal>,
  pub top_products: Vec<ProductSales>,
}

/// Aggregates over orders that count as revenue: anything not pending, failed or cancelled.
#[derive(Clone)]
pub struct Reporter {
  ledger: Arc<dyn OrderLedger>,
  catalog: Arc<dyn CatalogStore>,
}

impl Reporter {
  pub fn new(ledger: Arc<dyn OrderLedger>, catalog: Arc<dyn CatalogStore>) -> Self {
    Self { ledger, catalog }
  }

  /// Revenue per day for the `days` days ending today (UTC), oldest first.
  pub async fn revenue_series(&self, days: u32) -> OrderResult<Vec<RevenuePoint>> {
    self.revenue_series_ending(days, Utc::now().date_naive()).await
  }

  /// Revenue per day for the `days` days ending on `last_day`. Always exactly `days`
  /// entries; days without revenue are zero.
  #[instrument(name = "Reporter::revenue_series", skip(self))]
  pub async fn revenue_series_ending(&self, days: u32, last_day: NaiveDate) -> OrderResult<Vec<RevenuePoint>> {
    if days == 0 || days > MAX_REVENUE_DAYS {
      return Err(OrderError::Validation(format!(
        "days must be between 1 and {}, got {}",
        MAX_REVENUE_DAYS, days
      )));
    }
    let first_day = last_day
      .checked_sub_days(Days::new(u64::from(days - 1)))
      .ok_or_else(|| OrderError::Validation("Revenue window starts before the calendar does".to_string()))?;

    let mut buckets: BTreeMap<NaiveDate, Money> = first_day
      .iter_days()
      .take(days as usize)
      .map(|day| (day, Money::ZERO))
      .collect();

    let orders = self
      .ledger
      .list(&OrderQuery {
        created_from: first_day.and_hms_opt(0, 0, 0).map(|start| start.and_utc()),
        ..OrderQuery::default()
      })
      .await?;

    for order in orders.iter().filter(|o| o.fulfillment_status.counts_as_revenue()) {
      if let Some(total) = buckets.get_mut(&order.created_at.date_naive()) {
        *total = *total + order.total;
      }
    }

    debug!(orders = orders.len(), "Revenue series computed.");
    Ok(
      buckets
        .into_iter()
        .map(|(date, total)| RevenuePoint { date, total })
        .collect(),
    )
  }

  /// Revenue and quantity per current product category, plus the best-selling products.
  #[instrument(name = "Reporter::sales_by_category", skip(self))]
  pub async fn sales_by_category(&self) -> OrderResult<SalesBreakdown> {
    let orders = self.ledger.list(&OrderQuery::default()).await?;
    let mut catalog_cache: HashMap<ProductId, Option<ProductSnapshot>> = HashMap::new();
    let mut categories: HashMap<String, CategoryTotal> = HashMap::new();
    let mut products: HashMap<ProductId, ProductSales> = HashMap::new();

    for item in revenue_items(&orders) {
      let product = match catalog_cache.get(&item.product_id) {
        Some(cached) => cached.clone(),
        None => {
          let fetched = self.catalog.get_product(item.product_id).await?;
          catalog_cache.insert(item.product_id, fetched.clone());
          fetched
        }
      };
      let category = product
        .as_ref()
        .map(|p| p.category.clone())
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());
      let name = product
        .as_ref()
        .map(|p| p.name.clone())
        .or_else(|| item.name.clone())
        .unwrap_or_else(|| item.product_id.to_string());
      let revenue = item.line_total().unwrap_or(Money::ZERO);
      let quantity = u64::from(item.quantity);

      let cat = categories.entry(category.clone()).or_insert_with(|| CategoryTotal {
        category: category.clone(),
        revenue: Money::ZERO,
        quantity: 0,
      });
      cat.revenue = cat.revenue + revenue;
      cat.quantity += quantity;

      let prod = products.entry(item.product_id).or_insert_with(|| ProductSales {
        product_id: item.product_id,
        name,
        category,
        revenue: Money::ZERO,
        quantity: 0,
      });
      prod.revenue = prod.revenue + revenue;
      prod.quantity += quantity;
    }

    let mut category_totals: Vec<CategoryTotal> = categories.into_values().collect();
    category_totals.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.category.cmp(&b.category)));

    let mut top_products: Vec<ProductSales> = products.into_values().collect();
    top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.product_id.cmp(&b.product_id)));
    top_products.truncate(TOP_PRODUCT_COUNT);

    Ok(SalesBreakdown {
      category_totals,
      top_products,
    })
  }
}

fn revenue_items(orders: &[Order]) -> impl Iterator<Item = &crate::domain::LineItem> {
  orders
    .iter()
    .filter(|o| o.fulfillment_status.counts_as_revenue())
    .flat_map(|o| o.items.iter())
}
