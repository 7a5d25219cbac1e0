// server/src/services/payment_mock.rs

//! A stand-in for the hosted payment gateway. Intents are minted locally with the same id
//! shape the real gateway uses; callbacks are signed with the configured secret by
//! whoever plays the gateway in a demo or test.

use async_trait::async_trait;
use kilnworks_core::{GatewayError, PaymentGateway, PaymentIntent};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const GATEWAY_ORDER_ID_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct MockGateway {
  key_id: String,
  latency: Duration,
}

impl MockGateway {
  pub fn new(key_id: impl Into<String>) -> Self {
    Self {
      key_id: key_id.into(),
      latency: Duration::from_millis(20),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  #[instrument(name = "MockGateway::create_intent", skip(self), err(Display))]
  async fn create_intent(
    &self,
    amount_minor: i64,
    currency: &str,
    receipt: &str,
  ) -> Result<PaymentIntent, GatewayError> {
    if amount_minor <= 0 {
      return Err(GatewayError::Rejected("Amount must be greater than zero".to_string()));
    }
    if currency.trim().is_empty() {
      return Err(GatewayError::Rejected("Currency is required".to_string()));
    }
    tokio::time::sleep(self.latency).await;

    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(GATEWAY_ORDER_ID_LEN).collect();
    let intent = PaymentIntent {
      id: format!("order_{}", suffix),
      amount_minor,
      currency: currency.to_string(),
    };
    info!(intent_id = %intent.id, "Mock payment intent created.");
    Ok(intent)
  }

  fn public_key(&self) -> &str {
    &self.key_id
  }
}
