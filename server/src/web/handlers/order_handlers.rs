// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use kilnworks_core::{FulfillmentStatus, GatewayCheckout, NewOrder, Order, PaymentStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::web::extractors::OperatorAccess;

/// `{order}` for cash orders; gateway orders also carry what the storefront needs to open
/// the gateway's checkout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacementResponse {
  order: Order,
  #[serde(flatten)]
  gateway: Option<GatewayCheckout>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
  /// RFC 3339 timestamp; only orders created strictly after it are returned.
  pub since: Option<DateTime<Utc>>,
  pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
  pub status: String,
}

fn parse_status<T>(raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw.trim().to_ascii_lowercase().parse::<T>().map_err(|e| AppError::Validation(e.to_string()))
}

#[instrument(
    name = "handler::create_order",
    skip(app_state, payload),
    fields(payment_mode = %payload.payment_mode, items = payload.items.len())
)]
pub async fn create_order_handler(app_state: web::Data<AppState>, payload: web::Json<NewOrder>) -> Result<HttpResponse> {
  let placement = app_state.engine.place_order(payload.into_inner()).await?;
  info!(
    order_number = %placement.order.order_number,
    payment_status = %placement.order.payment_status,
    "Order placed."
  );
  Ok(HttpResponse::Created().json(PlacementResponse {
    order: placement.order,
    gateway: placement.gateway,
  }))
}

#[instrument(name = "handler::get_order", skip(app_state, path), fields(reference = %path.as_ref()))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let order = app_state.engine.get_order(&path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::list_orders", skip(app_state, _operator))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  _operator: OperatorAccess,
  query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse> {
  let ListOrdersQuery { since, limit } = query.into_inner();
  let orders = app_state.engine.list_orders(since, limit).await?;
  Ok(HttpResponse::Ok().json(json!({ "count": orders.len(), "orders": orders })))
}

#[instrument(
    name = "handler::update_status",
    skip(app_state, _operator, path, payload),
    fields(reference = %path.as_ref(), status = %payload.status)
)]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  _operator: OperatorAccess,
  path: web::Path<String>,
  payload: web::Json<StatusUpdate>,
) -> Result<HttpResponse> {
  let status: FulfillmentStatus = parse_status(&payload.status)?;
  let order = app_state.engine.update_fulfillment_status(&path.into_inner(), status).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(
    name = "handler::update_payment_status",
    skip(app_state, _operator, path, payload),
    fields(reference = %path.as_ref(), status = %payload.status)
)]
pub async fn update_payment_status_handler(
  app_state: web::Data<AppState>,
  _operator: OperatorAccess,
  path: web::Path<String>,
  payload: web::Json<StatusUpdate>,
) -> Result<HttpResponse> {
  let status: PaymentStatus = parse_status(&payload.status)?;
  let order = app_state.engine.update_payment_status(&path.into_inner(), status).await?;
  Ok(HttpResponse::Ok().json(order))
}
