// core/src/domain/status.rs

//! The two operator-visible status fields, the settlement marker, and the transition
//! table that governs operator edits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
  pub kind: &'static str,
  pub value: String,
}

/// Operational lifecycle of an order, independent of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
  Pending,
  Confirmed,
  Shipped,
  Delivered,
  Cancelled,
  Failed,
}

impl FulfillmentStatus {
  pub const ALL: [FulfillmentStatus; 6] = [
    FulfillmentStatus::Pending,
    FulfillmentStatus::Confirmed,
    FulfillmentStatus::Shipped,
    FulfillmentStatus::Delivered,
    FulfillmentStatus::Cancelled,
    FulfillmentStatus::Failed,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      FulfillmentStatus::Pending => "pending",
      FulfillmentStatus::Confirmed => "confirmed",
      FulfillmentStatus::Shipped => "shipped",
      FulfillmentStatus::Delivered => "delivered",
      FulfillmentStatus::Cancelled => "cancelled",
      FulfillmentStatus::Failed => "failed",
    }
  }

  /// Cancelled or failed: the order will not ship, so no stock is owed for it.
  pub fn is_withdrawn(self) -> bool {
    matches!(self, FulfillmentStatus::Cancelled | FulfillmentStatus::Failed)
  }

  /// Whether an order in this status contributes to revenue reports.
  pub fn counts_as_revenue(self) -> bool {
    !matches!(
      self,
      FulfillmentStatus::Pending | FulfillmentStatus::Failed | FulfillmentStatus::Cancelled
    )
  }
}

impl fmt::Display for FulfillmentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FulfillmentStatus {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    FulfillmentStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| ParseStatusError {
        kind: "fulfillment status",
        value: s.to_string(),
      })
  }
}

/// Settlement of the order's money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
}

impl PaymentStatus {
  pub const ALL: [PaymentStatus; 3] = [PaymentStatus::Pending, PaymentStatus::Paid, PaymentStatus::Failed];

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
    }
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    PaymentStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| ParseStatusError {
        kind: "payment status",
        value: s.to_string(),
      })
  }
}

/// Progress of the stock-decrement side effect.
///
/// `NotDue -> Due` happens once: at COD placement, or when a gateway callback is
/// verified for an order that has not been cancelled or failed. `Due -> Settling -> Settled`
/// is driven only by settlement. A cash order that runs short of stock at placement goes
/// back from `Due` to `NotDue` and is failed. Operator status
/// edits never touch this field, which is what keeps settlement from re-triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
  NotDue,
  Due,
  /// Claimed by a settlement in flight. Seen at rest only after a crash mid-settlement.
  Settling,
  Settled,
}

impl SettlementState {
  pub const ALL: [SettlementState; 4] = [
    SettlementState::NotDue,
    SettlementState::Due,
    SettlementState::Settling,
    SettlementState::Settled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      SettlementState::NotDue => "not_due",
      SettlementState::Due => "due",
      SettlementState::Settling => "settling",
      SettlementState::Settled => "settled",
    }
  }
}

impl fmt::Display for SettlementState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SettlementState {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SettlementState::ALL
      .into_iter()
      .find(|state| state.as_str() == s)
      .ok_or_else(|| ParseStatusError {
        kind: "settlement state",
        value: s.to_string(),
      })
  }
}

/// Which operator status edits are accepted.
///
/// `Permissive` accepts any status after any other and is the default, matching how the
/// storefront's dashboard has always behaved. `Strict` enforces the table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
  #[default]
  Permissive,
  Strict,
}

impl TransitionPolicy {
  pub fn allows_fulfillment(self, from: FulfillmentStatus, to: FulfillmentStatus) -> bool {
    use FulfillmentStatus::*;
    if self == TransitionPolicy::Permissive || from == to {
      return true;
    }
    matches!(
      (from, to),
      (Pending, Confirmed)
        | (Pending, Cancelled)
        | (Pending, Failed)
        | (Confirmed, Shipped)
        | (Confirmed, Cancelled)
        | (Shipped, Delivered)
        | (Failed, Pending)
    )
  }

  pub fn allows_payment(self, from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    if self == TransitionPolicy::Permissive || from == to {
      return true;
    }
    matches!(
      (from, to),
      (Pending, Paid) | (Pending, Failed) | (Failed, Pending) | (Failed, Paid)
    )
  }
}

impl FromStr for TransitionPolicy {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "permissive" => Ok(TransitionPolicy::Permissive),
      "strict" => Ok(TransitionPolicy::Strict),
      other => Err(ParseStatusError {
        kind: "transition policy",
        value: other.to_string(),
      }),
    }
  }
}
