// server/src/lib.rs

//! HTTP service for the Kilnworks storefront's order core: configuration, Postgres
//! stores, mock gateway and mailer adapters, background maintenance and the actix-web
//! routes. `main.rs` wires these together; integration tests use them directly.

pub mod config;
pub mod db;
pub mod errors;
pub mod maintenance;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod web;
