// server/src/web/routes.rs

use crate::errors::AppError;
use crate::web::handlers::{order_handlers, payment_handlers, report_handlers};
use actix_web::{web, HttpResponse};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed bodies and query strings answer with the same `{error}` shape as every
/// other client error.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
  web::QueryConfig::default()
    .error_handler(|err, _req| AppError::Validation(format!("Invalid query string: {}", err)).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .app_data(json_config())
      .app_data(query_config())
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/verify-payment", web::post().to(payment_handlers::verify_payment_handler))
          // Fixed segments go before `/{id}` so they are not taken for order references.
          .route("/revenue", web::get().to(report_handlers::revenue_handler))
          .route("/analytics", web::get().to(report_handlers::analytics_handler))
          .route("/{id}", web::get().to(order_handlers::get_order_handler))
          .route("/{id}/status", web::patch().to(order_handlers::update_status_handler))
          .route(
            "/{id}/payment-status",
            web::patch().to(order_handlers::update_payment_status_handler),
          ),
      ),
  );
}
