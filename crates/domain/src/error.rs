//! Domain error types.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId, SalesSlotId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced product, slot, order, or inventory row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request asks for more stock than is available.
    #[error("Insufficient inventory for product {product_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order is not in a state that allows the action.
    #[error("Cannot {action} order {order_id} in {status} status")]
    InvalidOrderStatus {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// The slot ends before it starts.
    #[error("Invalid time range: end {end} is before start {start}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Orders can only be placed against active slots.
    #[error("Sales slot {slot_id} is not active")]
    SlotNotActive { slot_id: SalesSlotId },

    /// The product already has an inventory row in the slot.
    #[error("Product {product_id} is already registered in slot {slot_id}")]
    DuplicateInventory {
        slot_id: SalesSlotId,
        product_id: ProductId,
    },

    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Line subtotals or the order total do not fit in the money range.
    #[error("Order total amount overflows for order {order_id}")]
    AmountOverflow { order_id: OrderId },

    /// Opaque persistence failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::InsufficientInventory {
                product_id,
                requested,
                available,
                ..
            } => DomainError::InsufficientInventory {
                product_id,
                requested,
                available,
            },
            StoreError::LedgerUnderflow {
                product_id,
                requested,
                reserved,
                ..
            } => DomainError::InsufficientInventory {
                product_id,
                requested,
                available: reserved,
            },
            StoreError::StatusConflict {
                order_id, actual, ..
            } => DomainError::InvalidOrderStatus {
                order_id,
                status: actual,
                action: "update",
            },
            StoreError::AmountOverflow { order_id } => DomainError::AmountOverflow { order_id },
            other => DomainError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kinds_map_to_domain_kinds() {
        let err: DomainError = StoreError::not_found("order", "abc").into();
        assert!(matches!(err, DomainError::NotFound { entity: "order", .. }));

        let err: DomainError = StoreError::StatusConflict {
            order_id: OrderId::new(),
            expected: OrderStatus::Reserved,
            actual: OrderStatus::Cancelled,
        }
        .into();
        assert!(matches!(
            err,
            DomainError::InvalidOrderStatus {
                status: OrderStatus::Cancelled,
                ..
            }
        ));

        let order_id = OrderId::new();
        let err: DomainError = StoreError::AmountOverflow { order_id }.into();
        assert!(matches!(err, DomainError::AmountOverflow { order_id: id } if id == order_id));

        let err: DomainError = StoreError::InvalidCommit("bad".into()).into();
        assert!(matches!(err, DomainError::Store(_)));
    }
}
