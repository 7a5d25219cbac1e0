// core/src/domain/mod.rs

//! Order ledger data model.

pub mod money;
pub mod order;
pub mod product;
pub mod status;

pub use money::Money;
pub use order::{
  CustomerSnapshot, GatewayCapture, LineItem, NewOrder, Order, OrderNumber, Payment, PaymentMode, ProductId,
};
pub use product::ProductSnapshot;
pub use status::{FulfillmentStatus, ParseStatusError, PaymentStatus, SettlementState, TransitionPolicy};
