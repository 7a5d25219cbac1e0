// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use kilnworks_core::{
  EnginePolicy, Money, ShippingRates, StockPolicy, TotalCheck, TransitionPolicy, DEFAULT_REDRIVE_GRACE_SECS,
};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Used only when no database is configured, so local demo runs work out of the box.
const DEV_GATEWAY_SECRET: &str = "kilnworks_dev_secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
  #[default]
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(format!("unknown log format '{}'", other)),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Absent means in-memory stores.
  pub database_url: Option<String>,
  pub database_max_connections: u32,

  pub gateway_key_id: String,
  pub gateway_key_secret: String,
  pub currency: String,
  pub shipping_fee_standard: Money,
  pub shipping_fee_express: Money,

  pub stock_policy: StockPolicy,
  pub total_check: TotalCheck,
  pub transition_policy: TransitionPolicy,

  /// When set, operator routes require a matching `X-Operator-Token` header.
  pub operator_token: Option<String>,
  pub mail_sender: String,

  /// Gateway orders still unpaid after this long are expired. `None` disables the reaper.
  pub pending_order_ttl: Option<chrono::Duration>,
  pub maintenance_interval: Duration,
  /// Redrive leaves orders alone until their settlement marker has been idle this long.
  pub settlement_grace: chrono::Duration,

  pub seed_db: bool,
  pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("database_max_connections", &self.database_max_connections)
      .field("gateway_key_id", &self.gateway_key_id)
      .field("gateway_key_secret", &"[REDACTED]")
      .field("currency", &self.currency)
      .field("stock_policy", &self.stock_policy)
      .field("total_check", &self.total_check)
      .field("transition_policy", &self.transition_policy)
      .field("operator_token", &self.operator_token.as_ref().map(|_| "[REDACTED]"))
      .field("pending_order_ttl", &self.pending_order_ttl)
      .field("maintenance_interval", &self.maintenance_interval)
      .field("settlement_grace", &self.settlement_grace)
      .field("seed_db", &self.seed_db)
      .field("log_format", &self.log_format)
      .finish()
  }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  match lookup(name).filter(|v| !v.trim().is_empty()) {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    None => Ok(default),
  }
}

fn parse_fee(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Money) -> Result<Money> {
  let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
    return Ok(default);
  };
  let major: f64 = raw
    .trim()
    .parse()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))?;
  Money::from_major(major)
    .filter(|fee| !fee.is_negative())
    .ok_or_else(|| AppError::Config(format!("Invalid {}: '{}' is not a valid fee", name, raw.trim())))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source. `from_env` passes the process
  /// environment; tests pass a map.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let server_host = var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_var(&lookup, "SERVER_PORT", 8080u16)?;
    let database_url = var("DATABASE_URL");
    let database_max_connections = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;

    let gateway_key_id = var("GATEWAY_KEY_ID").unwrap_or_else(|| "rzp_test_kilnworks".to_string());
    let gateway_key_secret = match (var("GATEWAY_KEY_SECRET"), &database_url) {
      (Some(secret), _) => secret,
      (None, None) => {
        tracing::warn!("GATEWAY_KEY_SECRET not set; using the development secret for in-memory mode.");
        DEV_GATEWAY_SECRET.to_string()
      }
      (None, Some(_)) => {
        return Err(AppError::Config(
          "GATEWAY_KEY_SECRET is required when DATABASE_URL is set".to_string(),
        ))
      }
    };
    let currency = var("CURRENCY").unwrap_or_else(|| "INR".to_string()).to_ascii_uppercase();
    let shipping_fee_standard = parse_fee(&lookup, "SHIPPING_FEE_STANDARD", Money::ZERO)?;
    let shipping_fee_express = parse_fee(&lookup, "SHIPPING_FEE_EXPRESS", Money::from_minor(15_000))?;

    let stock_policy = parse_var(&lookup, "STOCK_POLICY", StockPolicy::default())?;
    let total_check = parse_var(&lookup, "TOTAL_CHECK", TotalCheck::default())?;
    let transition_policy = parse_var(&lookup, "TRANSITION_POLICY", TransitionPolicy::default())?;

    let operator_token = var("OPERATOR_TOKEN");
    let mail_sender = var("MAIL_SENDER").unwrap_or_else(|| "orders@kilnworks.example".to_string());

    let pending_order_ttl = match var("PENDING_ORDER_TTL_MINUTES") {
      Some(_) => {
        let minutes = parse_var(&lookup, "PENDING_ORDER_TTL_MINUTES", 0i64)?;
        if minutes <= 0 {
          return Err(AppError::Config(
            "Invalid PENDING_ORDER_TTL_MINUTES: must be a positive number of minutes".to_string(),
          ));
        }
        Some(chrono::Duration::minutes(minutes))
      }
      None => None,
    };
    let maintenance_secs = parse_var(&lookup, "MAINTENANCE_INTERVAL_SECS", 300u64)?;
    if maintenance_secs == 0 {
      return Err(AppError::Config("Invalid MAINTENANCE_INTERVAL_SECS: must be at least 1".to_string()));
    }

    let grace_secs = parse_var(&lookup, "SETTLEMENT_GRACE_SECS", DEFAULT_REDRIVE_GRACE_SECS)?;
    if grace_secs < 0 {
      return Err(AppError::Config("Invalid SETTLEMENT_GRACE_SECS: must not be negative".to_string()));
    }

    let seed_db = parse_var(&lookup, "SEED_DB", false)?;
    let log_format = parse_var(&lookup, "LOG_FORMAT", LogFormat::default())?;

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      gateway_key_id,
      gateway_key_secret,
      currency,
      shipping_fee_standard,
      shipping_fee_express,
      stock_policy,
      total_check,
      transition_policy,
      operator_token,
      mail_sender,
      pending_order_ttl,
      maintenance_interval: Duration::from_secs(maintenance_secs),
      settlement_grace: chrono::Duration::seconds(grace_secs),
      seed_db,
      log_format,
    })
  }

  pub fn engine_policy(&self) -> EnginePolicy {
    EnginePolicy {
      stock: self.stock_policy,
      total_check: self.total_check,
      transitions: self.transition_policy,
      currency: self.currency.clone(),
      shipping: ShippingRates::new()
        .with_rate("standard", self.shipping_fee_standard)
        .with_rate("express", self.shipping_fee_express),
      redrive_grace: self.settlement_grace,
    }
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
