// server/src/web/handlers/report_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::Result;
use crate::state::AppState;
use crate::web::extractors::OperatorAccess;

const DEFAULT_REVENUE_DAYS: u32 = 7;

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
  pub days: Option<u32>,
}

#[instrument(name = "handler::revenue", skip(app_state, _operator))]
pub async fn revenue_handler(
  app_state: web::Data<AppState>,
  _operator: OperatorAccess,
  query: web::Query<RevenueQuery>,
) -> Result<HttpResponse> {
  let days = query.days.unwrap_or(DEFAULT_REVENUE_DAYS);
  let series = app_state.reporter.revenue_series(days).await?;
  Ok(HttpResponse::Ok().json(series))
}

#[instrument(name = "handler::analytics", skip(app_state, _operator))]
pub async fn analytics_handler(app_state: web::Data<AppState>, _operator: OperatorAccess) -> Result<HttpResponse> {
  let breakdown = app_state.reporter.sales_by_category().await?;
  Ok(HttpResponse::Ok().json(breakdown))
}
