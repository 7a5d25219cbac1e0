// server/src/main.rs

use kilnworks_core::{CatalogStore, MemoryStore, OrderLedger};
use kilnworks_server::config::{AppConfig, LogFormat};
use kilnworks_server::db::{seed, PgStore};
use kilnworks_server::services::{MockGateway, MockMailer};
use kilnworks_server::state::AppState;
use kilnworks_server::web::configure_app_routes;
use kilnworks_server::{maintenance, telemetry};

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

fn startup_error(context: &str, err: impl Display) -> io::Error {
  tracing::error!(error = %err, "{}", context);
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  // The subscriber has to exist before configuration loading logs anything.
  dotenvy::dotenv().ok();
  let log_format = std::env::var("LOG_FORMAT")
    .ok()
    .and_then(|raw| raw.parse::<LogFormat>().ok())
    .unwrap_or_default();
  telemetry::init_tracing(log_format);

  tracing::info!("Starting Kilnworks order server...");

  let app_config = Arc::new(AppConfig::from_env().map_err(|e| startup_error("Failed to load configuration", e))?);
  tracing::debug!(config = ?app_config, "Configuration in effect.");

  let (ledger, catalog): (Arc<dyn OrderLedger>, Arc<dyn CatalogStore>) = match &app_config.database_url {
    Some(database_url) => {
      let pool = PgPoolOptions::new()
        .max_connections(app_config.database_max_connections)
        .connect(database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to the database", e))?;
      tracing::info!("Successfully connected to the database.");

      sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| startup_error("Failed to apply database migrations", e))?;

      let store = Arc::new(PgStore::new(pool));
      if app_config.seed_db {
        seed::seed_postgres(&store)
          .await
          .map_err(|e| startup_error("Failed to seed database", e))?;
      }
      let ledger: Arc<dyn OrderLedger> = store.clone();
      let catalog: Arc<dyn CatalogStore> = store;
      (ledger, catalog)
    }
    None => {
      tracing::warn!("DATABASE_URL not set; orders and stock live in memory and vanish on restart.");
      let store = Arc::new(MemoryStore::new());
      if app_config.seed_db {
        seed::seed_memory(&store);
      }
      let ledger: Arc<dyn OrderLedger> = store.clone();
      let catalog: Arc<dyn CatalogStore> = store;
      (ledger, catalog)
    }
  };

  let app_state = AppState::build(
    app_config.clone(),
    ledger,
    catalog,
    Arc::new(MockGateway::new(app_config.gateway_key_id.clone())),
    Arc::new(MockMailer::new(app_config.mail_sender.clone())),
  )
  .map_err(|e| startup_error("Failed to build application state", e))?;

  maintenance::spawn(app_state.clone());
  tracing::info!(every = ?app_config.maintenance_interval, "Background maintenance scheduled.");

  let server_address = app_config.server_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
