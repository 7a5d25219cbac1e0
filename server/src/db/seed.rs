// server/src/db/seed.rs

//! Demo catalog used when `SEED_DB=true`. Ids are fixed so repeated seeding is idempotent.

use super::PgStore;
use kilnworks_core::{MemoryStore, Money, ProductSnapshot, StoreError};
use tracing::info;
use uuid::Uuid;

pub fn demo_products() -> Vec<ProductSnapshot> {
  [
    (0x01, "Speckled stoneware mug", "Mugs", 120_000, 40),
    (0x02, "Ash-glaze tea bowl", "Bowls", 185_000, 25),
    (0x03, "Celadon bud vase", "Vases", 240_000, 12),
    (0x04, "Tenmoku dinner plate", "Plates", 165_000, 30),
    (0x05, "Salt-fired storage jar", "Storage", 310_000, 8),
    (0x06, "Shino yunomi", "Cups", 95_000, 0),
  ]
  .into_iter()
  .map(|(n, name, category, price_minor, stock_qty)| ProductSnapshot {
    id: Uuid::from_u128(0x6b696c6e_0000_4000_8000_000000000000 | n),
    name: name.to_string(),
    category: category.to_string(),
    price: Money::from_minor(price_minor),
    stock_qty,
    in_stock: stock_qty > 0,
  })
  .collect()
}

pub async fn seed_postgres(store: &PgStore) -> Result<usize, StoreError> {
  let products = demo_products();
  for product in &products {
    store.upsert_product(product).await?;
  }
  info!(count = products.len(), "Seeded demo catalog into Postgres.");
  Ok(products.len())
}

pub fn seed_memory(store: &MemoryStore) -> usize {
  let products = demo_products();
  let count = products.len();
  for product in products {
    store.upsert_product(product);
  }
  info!(count, "Seeded demo catalog into the in-memory store.");
  count
}
