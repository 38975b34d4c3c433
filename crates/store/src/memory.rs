use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    InventoryId, Order, OrderId, OrderStatus, Product, ProductId, ProductInventory, SalesSlot,
    SalesSlotId,
};
use tokio::sync::RwLock;

use crate::{
    INVENTORY_SLOT_PRODUCT_KEY, InventoryRepository, ORDER_TICKET_KEY, OrderCommit,
    OrderRepository, OrderWrite, ProductRepository, Result, SalesSlotRepository, StoreError,
    commit::validate_commit,
};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    slots: HashMap<SalesSlotId, SalesSlot>,
    inventory: HashMap<InventoryId, ProductInventory>,
    inventory_keys: HashMap<(SalesSlotId, ProductId), InventoryId>,
    orders: HashMap<OrderId, Order>,
    tickets: HashMap<String, OrderId>,
}

impl Tables {
    fn inventory_at(&self, slot_id: SalesSlotId, product_id: ProductId) -> Option<&ProductInventory> {
        self.inventory_keys
            .get(&(slot_id, product_id))
            .and_then(|id| self.inventory.get(id))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    /// Computes the order row a commit would leave behind, without writing it.
    fn stage_order(&self, write: &OrderWrite, now: DateTime<Utc>) -> Result<Order> {
        match write {
            OrderWrite::Create(order) => {
                if !self.slots.contains_key(&order.sales_slot_id) {
                    return Err(StoreError::not_found("sales slot", order.sales_slot_id));
                }
                if self.orders.contains_key(&order.id) {
                    return Err(StoreError::UniqueViolation {
                        constraint: "orders_pkey".to_string(),
                    });
                }
                if self.tickets.contains_key(&order.ticket_number) {
                    return Err(StoreError::UniqueViolation {
                        constraint: ORDER_TICKET_KEY.to_string(),
                    });
                }
                Ok(order.clone())
            }
            OrderWrite::AppendItems {
                order_id,
                expected,
                items,
                amount,
            } => {
                let mut order = self.stored_order(*order_id, *expected)?;
                order.items.extend(items.iter().cloned());
                order.total_amount = order
                    .total_amount
                    .checked_add(*amount)
                    .ok_or(StoreError::AmountOverflow {
                        order_id: *order_id,
                    })?;
                order.updated_at = now;
                Ok(order)
            }
            OrderWrite::Transition { order_id, from, to } => {
                let mut order = self.stored_order(*order_id, *from)?;
                order.status = *to;
                order.updated_at = now;
                Ok(order)
            }
        }
    }

    fn stored_order(&self, id: OrderId, expected: OrderStatus) -> Result<Order> {
        let order = self
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual: order.status,
            });
        }
        Ok(order.clone())
    }
}

/// In-memory store used by tests and by the server when no database is
/// configured.
///
/// All tables sit behind one lock, so a commit observes and replaces the
/// ledger rows it touches in a single critical section.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "products_pkey".to_string(),
            });
        }
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| !p.is_deleted() && p.name == name)
            .min_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let rows = tables
            .products
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        Ok(sorted_by(rows, |p: &Product| (p.created_at, p.id)))
    }

    async fn update_product(&self, product: Product) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .products
            .get_mut(&product.id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| StoreError::not_found("product", product.id))?;
        stored.name = product.name;
        stored.price = product.price;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .products
            .get_mut(&id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| StoreError::not_found("product", id))?;
        let now = Utc::now();
        stored.deleted_at = Some(now);
        stored.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl SalesSlotRepository for InMemoryStore {
    async fn insert_slot(&self, slot: SalesSlot) -> Result<SalesSlot> {
        let mut tables = self.tables.write().await;
        if tables.slots.contains_key(&slot.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "sales_slots_pkey".to_string(),
            });
        }
        tables.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn find_slot(&self, id: SalesSlotId) -> Result<Option<SalesSlot>> {
        Ok(self.tables.read().await.slots.get(&id).cloned())
    }

    async fn list_slots(&self) -> Result<Vec<SalesSlot>> {
        let tables = self.tables.read().await;
        let rows = tables.slots.values().cloned().collect();
        Ok(sorted_by(rows, |s: &SalesSlot| (s.start_time, s.id)))
    }

    async fn list_active_slots(&self) -> Result<Vec<SalesSlot>> {
        let tables = self.tables.read().await;
        let rows = tables
            .slots
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        Ok(sorted_by(rows, |s: &SalesSlot| (s.start_time, s.id)))
    }

    async fn find_slots_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SalesSlot>> {
        let tables = self.tables.read().await;
        let rows = tables
            .slots
            .values()
            .filter(|s| s.overlaps(start, end))
            .cloned()
            .collect();
        Ok(sorted_by(rows, |s: &SalesSlot| (s.start_time, s.id)))
    }

    async fn set_slot_active(&self, id: SalesSlotId, active: bool) -> Result<SalesSlot> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .slots
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("sales slot", id))?;
        slot.is_active = active;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn insert_inventory(&self, inventory: ProductInventory) -> Result<ProductInventory> {
        let mut tables = self.tables.write().await;
        if !tables.slots.contains_key(&inventory.sales_slot_id) {
            return Err(StoreError::not_found("sales slot", inventory.sales_slot_id));
        }
        if !tables.products.contains_key(&inventory.product_id) {
            return Err(StoreError::not_found("product", inventory.product_id));
        }

        let key = (inventory.sales_slot_id, inventory.product_id);
        match tables.inventory_keys.entry(key) {
            Entry::Occupied(_) => {
                return Err(StoreError::UniqueViolation {
                    constraint: INVENTORY_SLOT_PRODUCT_KEY.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(inventory.id);
            }
        }
        tables.inventory.insert(inventory.id, inventory.clone());
        Ok(inventory)
    }

    async fn find_inventory(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
    ) -> Result<Option<ProductInventory>> {
        let tables = self.tables.read().await;
        Ok(tables.inventory_at(slot_id, product_id).cloned())
    }

    async fn list_inventory_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<ProductInventory>> {
        let tables = self.tables.read().await;
        let rows = tables
            .inventory
            .values()
            .filter(|i| i.sales_slot_id == slot_id)
            .cloned()
            .collect();
        Ok(sorted_by(rows, |i: &ProductInventory| {
            (i.created_at, i.id)
        }))
    }

    async fn list_inventory_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductInventory>> {
        let tables = self.tables.read().await;
        let rows = tables
            .inventory
            .values()
            .filter(|i| i.product_id == product_id)
            .cloned()
            .collect();
        Ok(sorted_by(rows, |i: &ProductInventory| {
            (i.created_at, i.id)
        }))
    }

    async fn set_inventory_quantities(
        &self,
        id: InventoryId,
        reserved: u32,
        sold: u32,
    ) -> Result<ProductInventory> {
        let mut tables = self.tables.write().await;
        let row = tables
            .inventory
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("inventory", id))?;
        row.set_quantities(reserved, sold)
            .map_err(|v| StoreError::ledger(row.sales_slot_id, row.product_id, v))?;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_ticket(&self, ticket_number: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tickets
            .get(ticket_number)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables.orders.values().cloned().collect();
        Ok(sorted_by(rows, |o: &Order| (o.created_at, o.id)))
    }

    async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        Ok(sorted_by(rows, |o: &Order| (o.created_at, o.id)))
    }

    async fn list_orders_for_slot(&self, slot_id: SalesSlotId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables
            .orders
            .values()
            .filter(|o| o.sales_slot_id == slot_id)
            .cloned()
            .collect();
        Ok(sorted_by(rows, |o: &Order| (o.created_at, o.id)))
    }

    async fn commit_order(&self, commit: OrderCommit) -> Result<Order> {
        validate_commit(&commit)?;

        let mut tables = self.tables.write().await;
        let now = Utc::now();

        // Stage everything against copies first; nothing is written until
        // every check has passed.
        let order = tables.stage_order(&commit.write, now)?;

        let mut staged: HashMap<InventoryId, ProductInventory> = HashMap::new();
        for delta in &commit.ledger {
            let row = tables
                .inventory_at(delta.sales_slot_id, delta.product_id)
                .ok_or_else(|| {
                    StoreError::not_found(
                        "inventory",
                        format!("{}/{}", delta.sales_slot_id, delta.product_id),
                    )
                })?;
            let row = match staged.entry(row.id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(row.clone()),
            };
            row.apply(delta.op)
                .map_err(|v| StoreError::ledger(delta.sales_slot_id, delta.product_id, v))?;
            row.updated_at = now;
        }

        tables.inventory.extend(staged);
        if matches!(commit.write, OrderWrite::Create(_)) {
            tables.tickets.insert(order.ticket_number.clone(), order.id);
        }
        tables.orders.insert(order.id, order.clone());

        metrics::counter!("store_commits_total", "kind" => commit.write.kind()).increment(1);
        Ok(order)
    }

    async fn mark_paid(&self, id: OrderId, transaction_id: String) -> Result<Order> {
        let mut tables = self.tables.write().await;
        let order = tables.order_mut(id)?;
        order.is_paid = true;
        order.transaction_id = Some(transaction_id);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn mark_delivered(&self, id: OrderId) -> Result<Order> {
        let mut tables = self.tables.write().await;
        let order = tables.order_mut(id)?;
        order.is_delivered = true;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}
