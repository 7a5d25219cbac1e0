// server/src/db/products.rs

use super::{store_error, PgStore};
use async_trait::async_trait;
use kilnworks_core::{CatalogStore, Money, ProductId, ProductSnapshot, StockFloor, StoreError};
use sqlx::FromRow;
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct ProductRow {
  id: ProductId,
  name: String,
  category: String,
  price_minor: i64,
  stock_qty: i64,
  in_stock: bool,
}

impl From<ProductRow> for ProductSnapshot {
  fn from(row: ProductRow) -> Self {
    ProductSnapshot {
      id: row.id,
      name: row.name,
      category: row.category,
      price: Money::from_minor(row.price_minor),
      stock_qty: row.stock_qty,
      in_stock: row.in_stock,
    }
  }
}

impl PgStore {
  /// Inserts or replaces a catalog entry. `in_stock` is derived from the quantity.
  pub async fn upsert_product(&self, product: &ProductSnapshot) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO products (id, name, category, price_minor, stock_qty, in_stock) \
       VALUES ($1, $2, $3, $4, $5, $5 > 0) \
       ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, category = EXCLUDED.category, \
       price_minor = EXCLUDED.price_minor, stock_qty = EXCLUDED.stock_qty, in_stock = EXCLUDED.in_stock, \
       updated_at = NOW()",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.category)
    .bind(product.price.minor())
    .bind(product.stock_qty)
    .execute(self.pool())
    .await
    .map_err(store_error)?;
    Ok(())
  }
}

#[async_trait]
impl CatalogStore for PgStore {
  async fn get_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
    let row: Option<ProductRow> =
      sqlx::query_as("SELECT id, name, category, price_minor, stock_qty, in_stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(store_error)?;
    Ok(row.map(ProductSnapshot::from))
  }

  #[instrument(name = "PgStore::adjust_stock", skip(self), err(Display))]
  async fn adjust_stock(&self, id: ProductId, delta: i64, floor: StockFloor) -> Result<i64, StoreError> {
    // SET expressions see the pre-update row, so both columns use the old quantity.
    let updated: Option<i64> = sqlx::query_scalar(
      "UPDATE products SET stock_qty = stock_qty + $2, in_stock = (stock_qty + $2) > 0, updated_at = NOW() \
       WHERE id = $1 AND (NOT $3 OR stock_qty + $2 >= 0) \
       RETURNING stock_qty",
    )
    .bind(id)
    .bind(delta)
    .bind(floor == StockFloor::Zero)
    .fetch_optional(self.pool())
    .await
    .map_err(store_error)?;

    if let Some(remaining) = updated {
      debug!(remaining, "Stock adjusted.");
      return Ok(remaining);
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = $1")
      .bind(id)
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    match available {
      None => Err(StoreError::Missing(format!("product {}", id))),
      Some(available) => Err(StoreError::InsufficientStock {
        product_id: id,
        requested: delta.saturating_neg(),
        available: available.max(0),
      }),
    }
  }
}
