// core/src/domain/order.rs

use super::money::Money;
use super::status::{FulfillmentStatus, PaymentStatus, SettlementState};
use crate::error::OrderError;
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type ProductId = Uuid;

const ORDER_NUMBER_PREFIX: &str = "ORD-";
const ORDER_NUMBER_SUFFIX_LEN: usize = 8;

/// Human-readable order identity, distinct from the storage id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
  /// `ORD-` followed by eight random uppercase alphanumerics.
  ///
  /// Randomness alone is not trusted for uniqueness: the ledger's unique constraint is
  /// the authority and placement retries with a fresh number on conflict.
  pub fn generate() -> Self {
    let suffix: String = rand::rng()
      .sample_iter(&Alphanumeric)
      .take(ORDER_NUMBER_SUFFIX_LEN)
      .map(|b| char::from(b).to_ascii_uppercase())
      .collect();
    OrderNumber(format!("{}{}", ORDER_NUMBER_PREFIX, suffix))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<String> for OrderNumber {
  fn from(value: String) -> Self {
    OrderNumber(value)
  }
}

impl fmt::Display for OrderNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Contact and shipping details copied onto the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
  pub email: String,
  pub name: String,
  #[serde(default)]
  pub phone: Option<String>,
  pub address_line1: String,
  #[serde(default)]
  pub address_line2: Option<String>,
  pub city: String,
  #[serde(default)]
  pub state: Option<String>,
  pub postal_code: String,
  pub country: String,
}

impl CustomerSnapshot {
  pub fn validate(&self) -> Result<(), OrderError> {
    let required = [
      ("email", &self.email),
      ("name", &self.name),
      ("addressLine1", &self.address_line1),
      ("city", &self.city),
      ("postalCode", &self.postal_code),
      ("country", &self.country),
    ];
    let missing: Vec<&str> = required
      .iter()
      .filter(|(_, value)| value.trim().is_empty())
      .map(|(field, _)| *field)
      .collect();
    if !missing.is_empty() {
      return Err(OrderError::Validation(format!(
        "Missing customer fields: {}",
        missing.join(", ")
      )));
    }
    if !self.email.contains('@') {
      return Err(OrderError::Validation(format!(
        "Customer email '{}' is not a valid address",
        self.email
      )));
    }
    Ok(())
  }
}

/// One ordered product. `unit_price` is frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  pub product_id: ProductId,
  #[serde(default)]
  pub name: Option<String>,
  pub quantity: u32,
  pub unit_price: Money,
}

impl LineItem {
  pub fn line_total(&self) -> Option<Money> {
    self.unit_price.checked_mul(self.quantity)
  }
}

/// The payment mode a customer picks at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
  #[serde(rename = "COD", alias = "cod")]
  Cod,
  #[serde(rename = "GATEWAY", alias = "gateway")]
  Gateway,
}

impl PaymentMode {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMode::Cod => "COD",
      PaymentMode::Gateway => "GATEWAY",
    }
  }
}

impl fmt::Display for PaymentMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Proof of a verified gateway payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCapture {
  pub payment_id: String,
  pub signature: String,
}

/// Payment mode together with the data only that mode may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum Payment {
  #[serde(rename = "COD")]
  CashOnDelivery,
  #[serde(rename = "GATEWAY", rename_all = "camelCase")]
  Gateway {
    gateway_order_id: String,
    /// Set once, by the verified callback.
    capture: Option<GatewayCapture>,
  },
}

impl Payment {
  pub fn mode(&self) -> PaymentMode {
    match self {
      Payment::CashOnDelivery => PaymentMode::Cod,
      Payment::Gateway { .. } => PaymentMode::Gateway,
    }
  }

  pub fn gateway_order_id(&self) -> Option<&str> {
    match self {
      Payment::CashOnDelivery => None,
      Payment::Gateway { gateway_order_id, .. } => Some(gateway_order_id),
    }
  }

  pub fn capture(&self) -> Option<&GatewayCapture> {
    match self {
      Payment::CashOnDelivery => None,
      Payment::Gateway { capture, .. } => capture.as_ref(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: OrderNumber,
  pub customer: CustomerSnapshot,
  pub items: Vec<LineItem>,
  pub shipping_method: String,
  pub total: Money,
  pub currency: String,
  pub fulfillment_status: FulfillmentStatus,
  pub payment: Payment,
  pub payment_status: PaymentStatus,
  pub settlement: SettlementState,
  pub settled_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn payment_mode(&self) -> PaymentMode {
    self.payment.mode()
  }

  pub fn item_subtotal(&self) -> Option<Money> {
    sum_line_items(&self.items)
  }
}

/// A checkout submission: everything the caller supplies to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  pub customer: CustomerSnapshot,
  pub items: Vec<LineItem>,
  pub total: Money,
  pub shipping_method: String,
  pub payment_mode: PaymentMode,
}

impl NewOrder {
  /// Shape checks that need no store access.
  pub fn validate(&self) -> Result<(), OrderError> {
    self.customer.validate()?;
    if self.items.is_empty() {
      return Err(OrderError::Validation("Order must contain at least one item".to_string()));
    }
    for (idx, item) in self.items.iter().enumerate() {
      if item.quantity == 0 {
        return Err(OrderError::Validation(format!(
          "Item {} (product {}) must have a quantity of at least 1",
          idx, item.product_id
        )));
      }
      if item.unit_price.is_negative() {
        return Err(OrderError::Validation(format!(
          "Item {} (product {}) has a negative unit price",
          idx, item.product_id
        )));
      }
    }
    if sum_line_items(&self.items).is_none() {
      return Err(OrderError::Validation("Item totals overflow".to_string()));
    }
    if !self.total.is_positive() {
      return Err(OrderError::Validation("Order total must be greater than zero".to_string()));
    }
    if self.shipping_method.trim().is_empty() {
      return Err(OrderError::Validation("Shipping method is required".to_string()));
    }
    Ok(())
  }
}

pub(crate) fn sum_line_items(items: &[LineItem]) -> Option<Money> {
  items
    .iter()
    .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn customer() -> CustomerSnapshot {
    CustomerSnapshot {
      email: "potter@example.com".to_string(),
      name: "Ada Potter".to_string(),
      phone: None,
      address_line1: "12 Wheel Lane".to_string(),
      address_line2: None,
      city: "Jaipur".to_string(),
      state: Some("RJ".to_string()),
      postal_code: "302001".to_string(),
      country: "IN".to_string(),
    }
  }

  #[test]
  fn order_numbers_have_the_expected_shape() {
    let number = OrderNumber::generate();
    let suffix = number.as_str().strip_prefix("ORD-").unwrap();
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
  }

  #[test]
  fn missing_customer_fields_are_listed() {
    let mut c = customer();
    c.city = " ".to_string();
    c.postal_code = String::new();
    let err = c.validate().unwrap_err();
    assert!(matches!(err, OrderError::Validation(ref m) if m.contains("city") && m.contains("postalCode")));
  }

  #[test]
  fn zero_quantity_is_rejected() {
    let order = NewOrder {
      customer: customer(),
      items: vec![LineItem {
        product_id: Uuid::new_v4(),
        name: None,
        quantity: 0,
        unit_price: Money::from_minor(100),
      }],
      total: Money::from_minor(100),
      shipping_method: "standard".to_string(),
      payment_mode: PaymentMode::Cod,
    };
    assert!(matches!(order.validate(), Err(OrderError::Validation(_))));
  }

  #[test]
  fn payment_variant_serializes_with_mode_tag() {
    let payment = Payment::Gateway {
      gateway_order_id: "order_abc".to_string(),
      capture: None,
    };
    let json = serde_json::to_value(&payment).unwrap();
    assert_eq!(json["mode"], "GATEWAY");
    assert_eq!(json["gatewayOrderId"], "order_abc");

    let cod = serde_json::to_value(Payment::CashOnDelivery).unwrap();
    assert_eq!(cod, serde_json::json!({"mode": "COD"}));
  }
}
