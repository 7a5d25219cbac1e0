// server/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use kilnworks_core::{
  CatalogStore, Collaborators, Notifier, OrderEngine, OrderLedger, PaymentGateway, Reporter, SignatureVerifier,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub engine: Arc<OrderEngine>,
  pub reporter: Reporter,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the order engine and the reporter over the given backends.
  pub fn build(
    config: Arc<AppConfig>,
    ledger: Arc<dyn OrderLedger>,
    catalog: Arc<dyn CatalogStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
  ) -> Result<Self> {
    let verifier = SignatureVerifier::new(&config.gateway_key_secret)
      .map_err(|e| AppError::Config(format!("GATEWAY_KEY_SECRET: {}", e)))?;
    let engine = OrderEngine::new(
      Collaborators {
        ledger: ledger.clone(),
        catalog: catalog.clone(),
        gateway,
        notifier,
        verifier,
      },
      config.engine_policy(),
    );
    Ok(Self {
      engine: Arc::new(engine),
      reporter: Reporter::new(ledger, catalog),
      config,
    })
  }
}
