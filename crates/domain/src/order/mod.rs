//! Order lifecycle: creation, item addition, and the RESERVED → CONFIRMED /
//! CANCELLED state machine with its ledger side effects.

mod commands;
mod service;

pub use commands::{AddOrderItems, CreateOrder, OrderItemInput};
pub use service::OrderService;
