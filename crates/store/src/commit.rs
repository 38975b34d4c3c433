//! Atomic order commits.
//!
//! An [`OrderCommit`] bundles one order-side write with the ledger deltas it
//! implies. Stores apply the whole commit or nothing: a failed delta rolls
//! back the order write, and a failed order write leaves every ledger row
//! untouched.

use common::{InventoryDelta, Money, Order, OrderId, OrderItem, OrderStatus};

use crate::{Result, StoreError};

/// The order-side half of a commit.
#[derive(Debug, Clone)]
pub enum OrderWrite {
    /// Insert a new order together with its items.
    Create(Order),

    /// Append items to an order that must still be in `expected` status,
    /// adding `amount` to its total.
    AppendItems {
        order_id: OrderId,
        expected: OrderStatus,
        items: Vec<OrderItem>,
        amount: Money,
    },

    /// Move an order from `from` to `to`. Fails with
    /// [`StoreError::StatusConflict`] if the stored status is not `from`.
    Transition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl OrderWrite {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderWrite::Create(order) => order.id,
            OrderWrite::AppendItems { order_id, .. } | OrderWrite::Transition { order_id, .. } => {
                *order_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrderWrite::Create(_) => "create",
            OrderWrite::AppendItems { .. } => "append_items",
            OrderWrite::Transition { .. } => "transition",
        }
    }
}

/// One all-or-nothing unit of work against orders and the inventory ledger.
#[derive(Debug, Clone)]
pub struct OrderCommit {
    pub write: OrderWrite,
    pub ledger: Vec<InventoryDelta>,
}

impl OrderCommit {
    /// Creates a commit with no ledger deltas.
    pub fn new(write: OrderWrite) -> Self {
        Self {
            write,
            ledger: Vec::new(),
        }
    }

    /// Attaches the ledger deltas to apply in the same unit.
    pub fn with_ledger(mut self, ledger: Vec<InventoryDelta>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn order_id(&self) -> OrderId {
        self.write.order_id()
    }
}

/// Validates a commit before it touches any storage.
pub fn validate_commit(commit: &OrderCommit) -> Result<()> {
    if commit.ledger.iter().any(|d| d.op.quantity() == 0) {
        return Err(StoreError::InvalidCommit(
            "ledger deltas must move a positive quantity".to_string(),
        ));
    }

    let order_id = commit.order_id();
    let items: &[OrderItem] = match &commit.write {
        OrderWrite::Create(order) => &order.items,
        OrderWrite::AppendItems { items, .. } => items,
        OrderWrite::Transition { from, to, .. } => {
            if from == to {
                return Err(StoreError::InvalidCommit(format!(
                    "transition from {from} to itself"
                )));
            }
            &[]
        }
    };

    if let Some(item) = items.iter().find(|i| i.order_id != order_id) {
        return Err(StoreError::InvalidCommit(format!(
            "item {} belongs to order {}, not {}",
            item.id, item.order_id, order_id
        )));
    }
    if items.iter().any(|i| i.quantity == 0) {
        return Err(StoreError::InvalidCommit(
            "order items must have a positive quantity".to_string(),
        ));
    }

    Ok(())
}
