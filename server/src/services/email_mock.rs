// server/src/services/email_mock.rs
use async_trait::async_trait;
use kilnworks_core::{Notifier, NotifyError, Order};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Logs order confirmations instead of sending them. Recipients on `.invalid` domains
/// fail, which is how demos exercise the "confirmation failed, order still placed" path.
#[derive(Debug, Clone)]
pub struct MockMailer {
  sender: String,
}

impl MockMailer {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }
}

fn confirmation_subject(order: &Order) -> String {
  format!("Your Kilnworks order {} is confirmed", order.order_number)
}

#[async_trait]
impl Notifier for MockMailer {
  #[instrument(
    name = "MockMailer::send_order_confirmation",
    skip(self, order),
    fields(order_number = %order.order_number),
    err(Display)
  )]
  async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
    let to = order.customer.email.trim();
    tokio::time::sleep(Duration::from_millis(5)).await;

    if to.to_ascii_lowercase().ends_with(".invalid") {
      warn!(%to, "Simulated email failure for undeliverable address.");
      return Err(NotifyError(format!("mailbox {} is undeliverable", to)));
    }

    info!(
      from = %self.sender,
      %to,
      subject = %confirmation_subject(order),
      items = order.items.len(),
      total = %order.total,
      "Mock confirmation email sent."
    );
    Ok(())
  }
}
