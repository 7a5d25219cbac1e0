// core/src/domain/product.rs

use super::money::Money;
use super::order::ProductId;
use serde::{Deserialize, Serialize};

/// What the order core needs to know about a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
  pub id: ProductId,
  pub name: String,
  pub category: String,
  pub price: Money,
  pub stock_qty: i64,
  pub in_stock: bool,
}

impl ProductSnapshot {
  /// Whether `quantity` more units can be taken without going below zero.
  pub fn can_supply(&self, quantity: u64) -> bool {
    self.in_stock && self.stock_qty >= 0 && (self.stock_qty as u64) >= quantity
  }
}
