//! Per-(slot, product) inventory ledger rows and the deltas applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{InventoryId, ProductId, SalesSlotId};

/// Stock counters for one product within one sales slot.
///
/// Invariant: `reserved_quantity + sold_quantity <= initial_quantity`.
/// `initial_quantity` is fixed at creation; the other two counters only move
/// through [`ProductInventory::apply`] or [`ProductInventory::set_quantities`],
/// both of which refuse to break the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInventory {
    pub id: InventoryId,
    pub sales_slot_id: SalesSlotId,
    pub product_id: ProductId,
    pub initial_quantity: u32,
    pub reserved_quantity: u32,
    pub sold_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductInventory {
    /// Creates a fresh row with nothing reserved or sold.
    pub fn new(sales_slot_id: SalesSlotId, product_id: ProductId, initial_quantity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: InventoryId::new(),
            sales_slot_id,
            product_id,
            initial_quantity,
            reserved_quantity: 0,
            sold_quantity: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Units still free to reserve.
    pub fn available_quantity(&self) -> u32 {
        let committed = u64::from(self.reserved_quantity) + u64::from(self.sold_quantity);
        u64::from(self.initial_quantity).saturating_sub(committed) as u32
    }

    /// Applies a single ledger delta, leaving the row untouched on failure.
    pub fn apply(&mut self, op: LedgerOp) -> Result<(), LedgerViolation> {
        match op {
            LedgerOp::Reserve(quantity) => {
                let available = self.available_quantity();
                if quantity > available {
                    return Err(LedgerViolation::Insufficient {
                        requested: quantity,
                        available,
                    });
                }
                self.reserved_quantity += quantity;
            }
            LedgerOp::Release(quantity) => {
                self.reserved_quantity = self.take_reserved(quantity)?;
            }
            LedgerOp::Fulfill(quantity) => {
                self.reserved_quantity = self.take_reserved(quantity)?;
                self.sold_quantity += quantity;
            }
        }
        Ok(())
    }

    /// Overwrites both counters with absolute values.
    pub fn set_quantities(&mut self, reserved: u32, sold: u32) -> Result<(), LedgerViolation> {
        if u64::from(reserved) + u64::from(sold) > u64::from(self.initial_quantity) {
            return Err(LedgerViolation::ExceedsInitial {
                reserved,
                sold,
                initial: self.initial_quantity,
            });
        }
        self.reserved_quantity = reserved;
        self.sold_quantity = sold;
        Ok(())
    }

    fn take_reserved(&self, quantity: u32) -> Result<u32, LedgerViolation> {
        self.reserved_quantity
            .checked_sub(quantity)
            .ok_or(LedgerViolation::Underflow {
                requested: quantity,
                reserved: self.reserved_quantity,
            })
    }
}

/// A relative change to one ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Hold stock for a pending order: `reserved += n`.
    Reserve(u32),
    /// Drop a hold: `reserved -= n`.
    Release(u32),
    /// Turn a hold into a sale: `reserved -= n`, `sold += n`.
    Fulfill(u32),
}

impl LedgerOp {
    pub fn quantity(&self) -> u32 {
        match self {
            LedgerOp::Reserve(q) | LedgerOp::Release(q) | LedgerOp::Fulfill(q) => *q,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOp::Reserve(_) => "reserve",
            LedgerOp::Release(_) => "release",
            LedgerOp::Fulfill(_) => "fulfill",
        }
    }
}

/// A ledger delta addressed by its (slot, product) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDelta {
    pub sales_slot_id: SalesSlotId,
    pub product_id: ProductId,
    pub op: LedgerOp,
}

impl InventoryDelta {
    pub fn new(sales_slot_id: SalesSlotId, product_id: ProductId, op: LedgerOp) -> Self {
        Self {
            sales_slot_id,
            product_id,
            op,
        }
    }
}

/// Why a ledger change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerViolation {
    #[error("requested {requested}, only {available} available")]
    Insufficient { requested: u32, available: u32 },

    #[error("cannot take {requested} from {reserved} reserved")]
    Underflow { requested: u32, reserved: u32 },

    #[error("reserved {reserved} + sold {sold} exceeds initial {initial}")]
    ExceedsInitial { reserved: u32, sold: u32, initial: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(initial: u32) -> ProductInventory {
        ProductInventory::new(SalesSlotId::new(), ProductId::new(), initial)
    }

    #[test]
    fn fresh_row_is_fully_available() {
        let inv = row(10);
        assert_eq!(inv.available_quantity(), 10);
        assert_eq!(inv.reserved_quantity, 0);
        assert_eq!(inv.sold_quantity, 0);
    }

    #[test]
    fn reserve_then_fulfill_moves_stock_to_sold() {
        let mut inv = row(10);
        inv.apply(LedgerOp::Reserve(3)).unwrap();
        assert_eq!(inv.reserved_quantity, 3);
        assert_eq!(inv.available_quantity(), 7);

        inv.apply(LedgerOp::Fulfill(3)).unwrap();
        assert_eq!(inv.reserved_quantity, 0);
        assert_eq!(inv.sold_quantity, 3);
        assert_eq!(inv.available_quantity(), 7);
    }

    #[test]
    fn release_returns_stock() {
        let mut inv = row(5);
        inv.apply(LedgerOp::Reserve(5)).unwrap();
        inv.apply(LedgerOp::Release(2)).unwrap();
        assert_eq!(inv.reserved_quantity, 3);
        assert_eq!(inv.sold_quantity, 0);
        assert_eq!(inv.available_quantity(), 2);
    }

    #[test]
    fn over_reservation_is_refused_without_change() {
        let mut inv = row(10);
        inv.apply(LedgerOp::Reserve(4)).unwrap();

        let err = inv.apply(LedgerOp::Reserve(7)).unwrap_err();
        assert_eq!(
            err,
            LedgerViolation::Insufficient {
                requested: 7,
                available: 6
            }
        );
        assert_eq!(inv.reserved_quantity, 4);
    }

    #[test]
    fn release_beyond_reservation_underflows() {
        let mut inv = row(10);
        inv.apply(LedgerOp::Reserve(1)).unwrap();

        assert!(matches!(
            inv.apply(LedgerOp::Release(2)),
            Err(LedgerViolation::Underflow { .. })
        ));
        assert!(matches!(
            inv.apply(LedgerOp::Fulfill(2)),
            Err(LedgerViolation::Underflow { .. })
        ));
        assert_eq!(inv.reserved_quantity, 1);
        assert_eq!(inv.sold_quantity, 0);
    }

    #[test]
    fn set_quantities_enforces_initial() {
        let mut inv = row(10);
        inv.set_quantities(4, 6).unwrap();
        assert_eq!(inv.available_quantity(), 0);

        assert!(matches!(
            inv.set_quantities(5, 6),
            Err(LedgerViolation::ExceedsInitial { .. })
        ));
        assert_eq!(inv.reserved_quantity, 4);
        assert_eq!(inv.sold_quantity, 6);
    }
}
