// server/src/maintenance.rs

//! Periodic upkeep: finishing settlements that were interrupted and expiring gateway
//! orders the customer never paid for.

use crate::state::AppState;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

/// One maintenance pass. Errors are logged; the next tick tries again.
#[instrument(name = "maintenance::run_once", skip(state))]
pub async fn run_once(state: &AppState) {
  match state.engine.redrive_settlements().await {
    Ok(report) => {
      if !report.settled.is_empty() || !report.failed.is_empty() {
        info!(settled = report.settled.len(), failed = report.failed.len(), "Settlement redrive finished.");
      }
      if !report.stalled.is_empty() {
        let stalled: Vec<&str> = report.stalled.iter().map(|n| n.as_str()).collect();
        warn!(?stalled, "Orders stuck mid-settlement need an operator.");
      }
    }
    Err(e) => error!(error = %e, "Settlement redrive failed."),
  }

  if let Some(ttl) = state.config.pending_order_ttl {
    match state.engine.expire_stale_pending_orders(ttl).await {
      Ok(expired) if !expired.is_empty() => info!(count = expired.len(), "Expired unpaid gateway orders."),
      Ok(_) => {}
      Err(e) => error!(error = %e, "Expiring unpaid gateway orders failed."),
    }
  }
}

/// Runs [`run_once`] every `maintenance_interval` until the runtime shuts down.
pub fn spawn(state: AppState) -> actix_rt::task::JoinHandle<()> {
  let every = state.config.maintenance_interval;
  actix_rt::spawn(async move {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      run_once(&state).await;
    }
  })
}
