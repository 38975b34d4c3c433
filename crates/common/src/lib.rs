//! Entity types shared by the store, domain, and API layers.

pub mod inventory;
pub mod money;
pub mod order;
pub mod product;
pub mod slot;
pub mod types;

pub use inventory::{InventoryDelta, LedgerOp, LedgerViolation, ProductInventory};
pub use money::Money;
pub use order::{Order, OrderItem, OrderStatus, ParseEnumError, PaymentMethod};
pub use product::Product;
pub use slot::SalesSlot;
pub use types::{InventoryId, OrderId, OrderItemId, ProductId, SalesSlotId};
