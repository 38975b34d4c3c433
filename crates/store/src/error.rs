use common::{LedgerViolation, OrderId, OrderStatus, ProductId, SalesSlotId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A reservation would push reserved + sold past the initial quantity.
    #[error(
        "Insufficient inventory for product {product_id} in slot {slot_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        slot_id: SalesSlotId,
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A release or fulfilment asked for more than is currently reserved.
    #[error(
        "Ledger underflow for product {product_id} in slot {slot_id}: requested {requested}, reserved {reserved}"
    )]
    LedgerUnderflow {
        slot_id: SalesSlotId,
        product_id: ProductId,
        requested: u32,
        reserved: u32,
    },

    /// The order was not in the status the commit expected.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Appending lines would push the order total past `i64`.
    #[error("Total amount of order {order_id} overflows")]
    AmountOverflow { order_id: OrderId },

    /// The commit itself is malformed.
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Lifts a row-level ledger violation into a keyed store error.
    pub fn ledger(slot_id: SalesSlotId, product_id: ProductId, violation: LedgerViolation) -> Self {
        match violation {
            LedgerViolation::Insufficient {
                requested,
                available,
            } => StoreError::InsufficientInventory {
                slot_id,
                product_id,
                requested,
                available,
            },
            LedgerViolation::Underflow {
                requested,
                reserved,
            } => StoreError::LedgerUnderflow {
                slot_id,
                product_id,
                requested,
                reserved,
            },
            LedgerViolation::ExceedsInitial {
                reserved,
                sold,
                initial,
            } => StoreError::InsufficientInventory {
                slot_id,
                product_id,
                requested: reserved.saturating_add(sold),
                available: initial,
            },
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
