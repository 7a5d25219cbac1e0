// core/src/engine/settlement.rs

//! Stock settlement driven by the order's settlement marker.
//!
//! `Due -> Settling` is a compare-and-set, so of any number of concurrent attempts only
//! one decrements stock. Each line is an atomic stock adjustment; if one fails, the lines
//! already applied are added back and the marker returns to `Due` so a later redrive can
//! retry. An order found at rest in `Settling` means a settlement died halfway and needs
//! an operator. Redrive leaves recently touched orders alone so it never races the
//! request that is settling them.

use super::EngineParts;
use crate::domain::{Order, OrderNumber, ProductId, SettlementState};
use crate::error::{OrderError, OrderResult, StoreError};
use crate::ports::{OrderQuery, StockFloor};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// How long an order may sit in `Settling` before a redrive reports it.
const STALL_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettleOutcome {
  Settled,
  /// The marker was not `Due`: someone else settled, or settlement was never owed.
  Skipped,
  /// A line hit the stock floor. Every applied line was restored and the marker is back at `Due`.
  Short(Shortfall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shortfall {
  pub(crate) product_id: ProductId,
  pub(crate) requested: i64,
  pub(crate) available: i64,
}

impl Shortfall {
  /// For callers that still owe the settlement and keep the order live.
  pub(crate) fn into_settlement_error(self, order: &Order) -> OrderError {
    OrderError::Settlement {
      order_number: order.order_number.to_string(),
      message: StoreError::InsufficientStock {
        product_id: self.product_id,
        requested: self.requested,
        available: self.available,
      }
      .to_string(),
    }
  }

  pub(crate) fn into_rejection(self) -> OrderError {
    OrderError::InsufficientStock {
      product_id: self.product_id,
      requested: self.requested,
      available: self.available,
    }
  }
}

/// Result of one pass over outstanding settlements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedriveReport {
  pub settled: Vec<OrderNumber>,
  pub failed: Vec<OrderNumber>,
  /// Orders stuck in `Settling`. Stock may or may not have moved for them.
  pub stalled: Vec<OrderNumber>,
}

pub(crate) async fn settle(parts: &EngineParts, order: &Order) -> OrderResult<SettleOutcome> {
  let claimed = parts
    .ledger
    .transition_settlement(order.id, SettlementState::Due, SettlementState::Settling)
    .await?;
  if !claimed {
    debug!(order_number = %order.order_number, "Settlement not due for this caller; nothing to do.");
    return Ok(SettleOutcome::Skipped);
  }

  let floor = parts.policy.stock.floor();
  let mut applied: Vec<(ProductId, i64)> = Vec::with_capacity(order.items.len());
  for item in &order.items {
    let quantity = i64::from(item.quantity);
    match parts.catalog.adjust_stock(item.product_id, -quantity, floor).await {
      Ok(remaining) => {
        if remaining < 0 {
          warn!(product_id = %item.product_id, remaining, "Stock went negative under the permissive stock policy.");
        } else {
          debug!(product_id = %item.product_id, quantity, remaining, "Stock decremented.");
        }
        applied.push((item.product_id, quantity));
      }
      Err(cause) => {
        release(parts, order, &applied, &cause).await?;
        return match cause {
          StoreError::InsufficientStock {
            product_id,
            requested,
            available,
          } => Ok(SettleOutcome::Short(Shortfall {
            product_id,
            requested,
            available,
          })),
          other => Err(OrderError::Settlement {
            order_number: order.order_number.to_string(),
            message: other.to_string(),
          }),
        };
      }
    }
  }

  match parts
    .ledger
    .transition_settlement(order.id, SettlementState::Settling, SettlementState::Settled)
    .await
  {
    Ok(true) => {
      info!(order_number = %order.order_number, lines = applied.len(), "Order settled.");
      Ok(SettleOutcome::Settled)
    }
    Ok(false) => {
      error!(order_number = %order.order_number, "Stock decremented but the settlement marker moved underneath; manual reconciliation required.");
      Err(OrderError::Settlement {
        order_number: order.order_number.to_string(),
        message: "stock was decremented but the settlement marker had changed".to_string(),
      })
    }
    Err(e) => {
      error!(order_number = %order.order_number, error = %e, "Stock decremented but the order could not be marked settled; order left settling.");
      Err(OrderError::Settlement {
        order_number: order.order_number.to_string(),
        message: format!("stock was decremented but the order could not be marked settled: {}", e),
      })
    }
  }
}

/// Undoes the stock changes already applied and hands the claim back. Fails when the
/// order could not be returned cleanly to `Due`.
async fn release(
  parts: &EngineParts,
  order: &Order,
  applied: &[(ProductId, i64)],
  cause: &StoreError,
) -> OrderResult<()> {
  let order_number = order.order_number.to_string();
  warn!(%order_number, error = %cause, applied = applied.len(), "Settlement failed; restoring stock already taken.");

  for (product_id, quantity) in applied.iter().rev() {
    if let Err(e) = parts.catalog.adjust_stock(*product_id, *quantity, StockFloor::Unbounded).await {
      error!(%order_number, %product_id, error = %e, "Could not restore stock; order left settling. Manual reconciliation required.");
      return Err(OrderError::Settlement {
        order_number,
        message: format!("{}; restoring stock for product {} also failed: {}", cause, product_id, e),
      });
    }
  }

  match parts
    .ledger
    .transition_settlement(order.id, SettlementState::Settling, SettlementState::Due)
    .await
  {
    Ok(true) => {
      debug!(%order_number, "Settlement claim released.");
      Ok(())
    }
    Ok(false) => {
      error!(%order_number, "Settlement claim was no longer held when releasing it.");
      Err(OrderError::Settlement {
        order_number,
        message: format!("{}; the settlement claim was no longer held", cause),
      })
    }
    Err(e) => {
      error!(%order_number, error = %e, "Could not release settlement claim; order left settling.");
      Err(OrderError::Settlement {
        order_number,
        message: format!("{}; releasing the settlement claim failed: {}", cause, e),
      })
    }
  }
}

/// Re-reads an order after settlement so callers see the stored marker and timestamps.
pub(crate) async fn reload(parts: &EngineParts, order: Order) -> OrderResult<Order> {
  Ok(parts.ledger.find_by_id(order.id).await?.unwrap_or(order))
}

/// Delivery problems are logged and swallowed; the order is already committed.
pub(crate) async fn send_confirmation(parts: &EngineParts, order: &Order) -> bool {
  match parts.notifier.send_order_confirmation(order).await {
    Ok(()) => {
      info!(order_number = %order.order_number, email = %order.customer.email, "Order confirmation sent.");
      true
    }
    Err(e) => {
      warn!(order_number = %order.order_number, error = %e, "Order confirmation could not be sent.");
      false
    }
  }
}

pub(crate) async fn redrive(parts: &EngineParts) -> OrderResult<RedriveReport> {
  let mut report = RedriveReport::default();

  let due = parts
    .ledger
    .list(&OrderQuery {
      settlement: Some(SettlementState::Due),
      ..OrderQuery::default()
    })
    .await?;
  let settle_cutoff = Utc::now() - parts.policy.redrive_grace;
  for order in due.into_iter().filter(|o| o.updated_at <= settle_cutoff) {
    match settle(parts, &order).await {
      Ok(SettleOutcome::Settled) => {
        let refreshed = reload(parts, order).await?;
        send_confirmation(parts, &refreshed).await;
        report.settled.push(refreshed.order_number);
      }
      Ok(SettleOutcome::Skipped) => {}
      Ok(SettleOutcome::Short(shortfall)) => {
        let e = shortfall.into_settlement_error(&order);
        warn!(order_number = %order.order_number, error = %e, "Redriven settlement is still short of stock.");
        report.failed.push(order.order_number);
      }
      Err(e) => {
        warn!(order_number = %order.order_number, error = %e, "Redriven settlement failed.");
        report.failed.push(order.order_number);
      }
    }
  }

  let stalled = parts
    .ledger
    .list(&OrderQuery {
      settlement: Some(SettlementState::Settling),
      ..OrderQuery::default()
    })
    .await?;
  let stall_cutoff = Utc::now() - Duration::minutes(STALL_GRACE_MINUTES);
  for order in stalled.into_iter().filter(|o| o.updated_at < stall_cutoff) {
    error!(order_number = %order.order_number, updated_at = %order.updated_at, "Order stuck mid-settlement; manual reconciliation required.");
    report.stalled.push(order.order_number);
  }

  if !report.settled.is_empty() || !report.failed.is_empty() {
    info!(settled = report.settled.len(), failed = report.failed.len(), stalled = report.stalled.len(), "Settlement redrive finished.");
  }
  Ok(report)
}
