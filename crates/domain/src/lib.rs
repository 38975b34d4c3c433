//! Business rules for the timed-slot food sale.
//!
//! - [`ProductService`]: the product catalog
//! - [`InventoryLedger`] and [`SalesSlotService`]: slots and their per-product stock
//! - [`OrderService`]: the order state machine and its ledger side effects
//!
//! Services are generic over [`store::Store`] and are cheap to clone.

pub mod catalog;
pub mod error;
pub mod inventory;
pub mod order;
pub mod slot;

pub use catalog::ProductService;
pub use error::DomainError;
pub use inventory::InventoryLedger;
pub use order::{AddOrderItems, CreateOrder, OrderItemInput, OrderService};
pub use slot::SalesSlotService;
