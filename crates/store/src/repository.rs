use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    InventoryId, Order, OrderId, OrderStatus, Product, ProductId, ProductInventory, SalesSlot,
    SalesSlotId,
};

use crate::{OrderCommit, Result};

/// Name of the uniqueness constraint on (slot, product) ledger rows.
pub const INVENTORY_SLOT_PRODUCT_KEY: &str = "product_inventories_slot_product_key";

/// Name of the uniqueness constraint on order ticket numbers.
pub const ORDER_TICKET_KEY: &str = "orders_ticket_number_key";

/// Persistence for the product catalog.
///
/// Deletion is soft: deleted products keep their row (and any order lines
/// referencing them) but are no longer returned by lookups or listings.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: Product) -> Result<Product>;

    /// Returns `None` for unknown and soft-deleted products alike.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>>;

    /// Lists live products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Replaces name and price. Fails with `NotFound` for unknown or deleted ids.
    async fn update_product(&self, product: Product) -> Result<Product>;

    async fn delete_product(&self, id: ProductId) -> Result<()>;
}

/// Persistence for sales slots.
#[async_trait]
pub trait SalesSlotRepository: Send + Sync {
    async fn insert_slot(&self, slot: SalesSlot) -> Result<SalesSlot>;

    async fn find_slot(&self, id: SalesSlotId) -> Result<Option<SalesSlot>>;

    /// Lists all slots ordered by start time.
    async fn list_slots(&self) -> Result<Vec<SalesSlot>>;

    async fn list_active_slots(&self) -> Result<Vec<SalesSlot>>;

    /// Lists slots intersecting the half-open range `[start, end)`.
    async fn find_slots_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SalesSlot>>;

    /// Sets the activation flag and returns the updated slot.
    async fn set_slot_active(&self, id: SalesSlotId, active: bool) -> Result<SalesSlot>;
}

/// Persistence for ledger rows outside of order commits.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Inserts a new row. A second row for the same (slot, product) fails
    /// with `UniqueViolation` on [`INVENTORY_SLOT_PRODUCT_KEY`].
    async fn insert_inventory(&self, inventory: ProductInventory) -> Result<ProductInventory>;

    async fn find_inventory(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
    ) -> Result<Option<ProductInventory>>;

    async fn list_inventory_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<ProductInventory>>;

    async fn list_inventory_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductInventory>>;

    /// Overwrites the reserved and sold counters of one row, refusing any
    /// pair whose sum exceeds the initial quantity.
    async fn set_inventory_quantities(
        &self,
        id: InventoryId,
        reserved: u32,
        sold: u32,
    ) -> Result<ProductInventory>;
}

/// Persistence for orders.
///
/// Every write that moves stock goes through [`OrderRepository::commit_order`],
/// which applies the order change and its ledger deltas atomically.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_ticket(&self, ticket_number: &str) -> Result<Option<Order>>;

    /// Lists all orders, oldest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    async fn list_orders_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<Order>>;

    /// Applies a commit all-or-nothing and returns the order as stored afterwards.
    async fn commit_order(&self, commit: OrderCommit) -> Result<Order>;

    /// Marks an order paid and records the payment reference.
    async fn mark_paid(&self, id: OrderId, transaction_id: String) -> Result<Order>;

    async fn mark_delivered(&self, id: OrderId) -> Result<Order>;
}

/// Everything the services need from a backend.
pub trait Store:
    ProductRepository
    + SalesSlotRepository
    + InventoryRepository
    + OrderRepository
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: ProductRepository
        + SalesSlotRepository
        + InventoryRepository
        + OrderRepository
        + Clone
        + 'static
{
}
