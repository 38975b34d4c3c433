//! Order service: the order state machine over an atomic store.

use std::collections::HashMap;
use std::time::Instant;

use common::{
    InventoryDelta, LedgerOp, Money, Order, OrderId, OrderItem, OrderStatus, ProductId,
    SalesSlotId,
};
use store::{OrderCommit, OrderWrite, Store};

use crate::error::DomainError;

use super::{AddOrderItems, CreateOrder, OrderItemInput};

/// Service for managing orders.
///
/// Every stock-moving operation is computed here as one [`OrderCommit`] and
/// handed to the store, which applies the order write and all of its ledger
/// deltas together or not at all. The availability checks done here give
/// early, descriptive errors; the store re-checks each delta under its own
/// lock, so concurrent orders can never oversell a row.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places a `RESERVED` order and reserves stock for every line.
    #[tracing::instrument(skip(self), fields(ticket = %cmd.ticket_number))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let slot = self
            .store
            .find_slot(cmd.sales_slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("sales slot", cmd.sales_slot_id))?;
        if !slot.is_active {
            tracing::warn!(slot_id = %slot.id, "order rejected: slot not active");
            return Err(DomainError::SlotNotActive { slot_id: slot.id });
        }

        let mut order = Order::new(slot.id, cmd.ticket_number, cmd.payment_method);
        order.items = self.price_items(slot.id, order.id, &cmd.items).await?;
        order.total_amount = order
            .items_total()
            .ok_or(DomainError::AmountOverflow { order_id: order.id })?;

        let ledger = reserve_deltas(slot.id, &order.items);
        let order = self
            .commit(OrderCommit::new(OrderWrite::Create(order)).with_ledger(ledger))
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            items = order.item_count(),
            total = %order.total_amount,
            "order created"
        );
        Ok(order)
    }

    /// Appends lines to a `RESERVED` order, reserving their stock and adding
    /// their subtotal to the order total.
    #[tracing::instrument(skip(self))]
    pub async fn add_items(&self, cmd: AddOrderItems) -> Result<Order, DomainError> {
        let order = self.get_order(cmd.order_id).await?;
        if !order.status.can_add_items() {
            tracing::warn!(status = %order.status, "item addition rejected");
            return Err(DomainError::InvalidOrderStatus {
                order_id: order.id,
                status: order.status,
                action: "add items to",
            });
        }
        if cmd.items.is_empty() {
            return Ok(order);
        }

        let items = self
            .price_items(order.sales_slot_id, order.id, &cmd.items)
            .await?;
        // The store adds `amount` to the stored total, so both must fit.
        let amount = items
            .iter()
            .map(OrderItem::subtotal)
            .collect::<Option<Vec<Money>>>()
            .and_then(Money::checked_sum)
            .filter(|amount| order.total_amount.checked_add(*amount).is_some())
            .ok_or(DomainError::AmountOverflow { order_id: order.id })?;
        let ledger = reserve_deltas(order.sales_slot_id, &items);
        let added = items.len() as u64;

        let order = self
            .commit(
                OrderCommit::new(OrderWrite::AppendItems {
                    order_id: order.id,
                    expected: order.status,
                    items,
                    amount,
                })
                .with_ledger(ledger),
            )
            .await?;

        metrics::counter!("order_items_added_total").increment(added);
        tracing::info!(order_id = %order.id, added, total = %order.total_amount, "items added");
        Ok(order)
    }

    /// Moves a `RESERVED` order to `CONFIRMED` (reserved stock becomes sold)
    /// or `CANCELLED` (reserved stock is released).
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, DomainError> {
        let order = self.get_order(order_id).await?;
        if !order.status.can_transition_to(target) {
            tracing::warn!(from = %order.status, to = %target, "status change rejected");
            return Err(DomainError::InvalidOrderStatus {
                order_id,
                status: order.status,
                action: transition_action(target),
            });
        }

        let ledger = order
            .items
            .iter()
            .map(|item| {
                let op = match target {
                    OrderStatus::Confirmed => LedgerOp::Fulfill(item.quantity),
                    _ => LedgerOp::Release(item.quantity),
                };
                InventoryDelta::new(order.sales_slot_id, item.product_id, op)
            })
            .collect();

        let order = self
            .commit(
                OrderCommit::new(OrderWrite::Transition {
                    order_id,
                    from: order.status,
                    to: target,
                })
                .with_ledger(ledger),
            )
            .await?;

        match target {
            OrderStatus::Confirmed => metrics::counter!("orders_confirmed_total").increment(1),
            _ => metrics::counter!("orders_cancelled_total").increment(1),
        }
        tracing::info!(%order_id, status = %order.status, "order status updated");
        Ok(order)
    }

    pub async fn confirm(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.update_status(order_id, OrderStatus::Confirmed).await
    }

    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.update_status(order_id, OrderStatus::Cancelled).await
    }

    /// Records a payment reference and marks the order paid. Applies in any
    /// status.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment(
        &self,
        order_id: OrderId,
        transaction_id: String,
    ) -> Result<Order, DomainError> {
        let order = self.store.mark_paid(order_id, transaction_id).await?;
        tracing::info!(%order_id, "payment recorded");
        Ok(order)
    }

    /// Marks the order handed over. Applies in any status.
    #[tracing::instrument(skip(self))]
    pub async fn update_delivery(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let order = self.store.mark_delivered(order_id).await?;
        tracing::info!(%order_id, "delivery recorded");
        Ok(order)
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_ticket_number(&self, ticket_number: &str) -> Result<Order, DomainError> {
        self.store
            .find_order_by_ticket(ticket_number)
            .await?
            .ok_or_else(|| DomainError::not_found("order", ticket_number))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders().await?)
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders_by_status(status).await?)
    }

    pub async fn list_by_slot(&self, slot_id: SalesSlotId) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders_for_slot(slot_id).await?)
    }

    /// Validates the requested lines in input order and snapshots each
    /// product's current price.
    ///
    /// Quantities for the same product are summed before comparing against
    /// availability, so two lines of 3 against 5 available fail here rather
    /// than in the store.
    async fn price_items(
        &self,
        slot_id: SalesSlotId,
        order_id: OrderId,
        inputs: &[OrderItemInput],
    ) -> Result<Vec<OrderItem>, DomainError> {
        let mut requested: HashMap<ProductId, u32> = HashMap::new();
        let mut items = Vec::with_capacity(inputs.len());

        for input in inputs {
            if input.quantity == 0 {
                return Err(DomainError::InvalidQuantity { quantity: 0 });
            }

            let product = self
                .store
                .find_product(input.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", input.product_id))?;
            let inventory = self
                .store
                .find_inventory(slot_id, product.id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found("inventory", format!("{slot_id}/{}", product.id))
                })?;

            let total = requested.entry(product.id).or_default();
            *total = total.saturating_add(input.quantity);
            let available = inventory.available_quantity();
            if *total > available {
                metrics::counter!("inventory_rejections_total").increment(1);
                tracing::warn!(product_id = %product.id, requested = *total, available, "insufficient inventory");
                return Err(DomainError::InsufficientInventory {
                    product_id: product.id,
                    requested: *total,
                    available,
                });
            }

            items.push(OrderItem::new(
                order_id,
                product.id,
                input.quantity,
                product.price,
            ));
        }

        Ok(items)
    }

    async fn commit(&self, commit: OrderCommit) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.store.commit_order(commit).await;
        metrics::histogram!("order_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result.map_err(|e| {
            let err = DomainError::from(e);
            if matches!(err, DomainError::InsufficientInventory { .. }) {
                metrics::counter!("inventory_rejections_total").increment(1);
                tracing::warn!(error = %err, "commit rejected by ledger");
            }
            err
        })
    }
}

fn reserve_deltas(slot_id: SalesSlotId, items: &[OrderItem]) -> Vec<InventoryDelta> {
    items
        .iter()
        .map(|item| InventoryDelta::new(slot_id, item.product_id, LedgerOp::Reserve(item.quantity)))
        .collect()
}

fn transition_action(target: OrderStatus) -> &'static str {
    match target {
        OrderStatus::Confirmed => "confirm",
        OrderStatus::Cancelled => "cancel",
        OrderStatus::Reserved => "reopen",
    }
}
