// src/lib.rs

//! Kilnworks order core: order placement, gateway payment verification, exactly-once
//! stock settlement, operator status edits and read-only sales reporting.
//!
//! The engine is written against a handful of async traits (see [`ports`]) so it can run
//! over Postgres in production and over [`memory::MemoryStore`] in tests:
//!  - [`OrderEngine::place_order`] validates a checkout and records the order. Cash orders
//!    settle immediately; gateway orders wait for a verified callback.
//!  - [`OrderEngine::verify_payment`] checks the callback's HMAC signature and claims the
//!    payment with a conditional `pending -> paid` write, so duplicates never settle twice.
//!  - Settlement is guarded by a `due -> settling -> settled` marker on the order.
//!  - [`Reporter`] derives revenue series and category rollups at query time.
//!
//! Multi-step procedures run on the small named-step runner in [`workflow`].

pub mod domain;
pub mod engine;
pub mod error;
pub mod memory;
pub mod ports;
pub mod reporting;
pub mod signature;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::domain::{
  CustomerSnapshot, FulfillmentStatus, GatewayCapture, LineItem, Money, NewOrder, Order, OrderNumber, Payment,
  PaymentMode, PaymentStatus, ProductId, ProductSnapshot, SettlementState, TransitionPolicy,
};
pub use crate::engine::{
  Collaborators, EnginePolicy, GatewayCheckout, OrderEngine, PaymentAck, PaymentCallback, Placement, RedriveReport,
  ShippingRates, StockPolicy, TotalCheck, DEFAULT_REDRIVE_GRACE_SECS,
};
pub use crate::error::{GatewayError, NotifyError, OrderError, OrderResult, StoreError};
pub use crate::memory::MemoryStore;
pub use crate::ports::{CatalogStore, Notifier, OrderLedger, PaymentGateway, PaymentIntent, StockFloor};
pub use crate::reporting::{CategoryTotal, ProductSales, Reporter, RevenuePoint, SalesBreakdown};
pub use crate::signature::SignatureVerifier;
pub use crate::workflow::{RunOutcome, StepContext, StepControl, Workflow, WorkflowError};
