// server/src/db/mod.rs

//! Postgres backends for the order ledger and the catalog.
//!
//! Every state change the order core relies on for exactly-once behaviour is a single
//! conditional `UPDATE ... WHERE`, so concurrent requests serialize on the row lock.

mod orders;
mod products;
pub mod seed;

use anyhow::anyhow;
use kilnworks_core::StoreError;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

/// Unique violations become [`StoreError::Conflict`] carrying the constraint name; the
/// order number retry in placement depends on it.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
  if let sqlx::Error::Database(db_err) = &err {
    if db_err.is_unique_violation() {
      return StoreError::Conflict {
        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
      };
    }
  }
  StoreError::Backend { source: err.into() }
}

pub(crate) fn corrupt_row(what: impl std::fmt::Display) -> StoreError {
  StoreError::Backend {
    source: anyhow!("Stored row could not be decoded: {}", what),
  }
}
