//! Persistence for products, sales slots, the inventory ledger, and orders.
//!
//! The repository traits are implemented twice: [`InMemoryStore`] for tests
//! and database-less runs, and [`PostgresStore`] for production. Both apply
//! [`OrderCommit`]s atomically.

pub mod commit;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use commit::{OrderCommit, OrderWrite, validate_commit};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    INVENTORY_SLOT_PRODUCT_KEY, InventoryRepository, ORDER_TICKET_KEY, OrderRepository,
    ProductRepository, SalesSlotRepository, Store,
};
