//! Per-slot inventory ledger.

use common::{ProductId, ProductInventory, SalesSlotId};
use store::{INVENTORY_SLOT_PRODUCT_KEY, Store, StoreError};

use crate::error::DomainError;

/// Registers products in slots and exposes the (slot, product) ledger rows.
///
/// Reservations, sales, and releases never go through here; they are
/// applied by the order service as part of an atomic order commit.
#[derive(Clone)]
pub struct InventoryLedger<S: Store> {
    store: S,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the ledger row for `product_id` in `slot_id` with nothing
    /// reserved or sold.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
        initial_quantity: u32,
    ) -> Result<ProductInventory, DomainError> {
        if self.store.find_slot(slot_id).await?.is_none() {
            return Err(DomainError::not_found("sales slot", slot_id));
        }
        if self.store.find_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("product", product_id));
        }

        let row = ProductInventory::new(slot_id, product_id, initial_quantity);
        match self.store.insert_inventory(row).await {
            Ok(row) => {
                tracing::info!(inventory_id = %row.id, initial_quantity, "product added to slot");
                Ok(row)
            }
            Err(StoreError::UniqueViolation { constraint })
                if constraint == INVENTORY_SLOT_PRODUCT_KEY =>
            {
                tracing::warn!("product already registered in slot");
                Err(DomainError::DuplicateInventory {
                    slot_id,
                    product_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up the row every ledger mutation is keyed on. A missing row is
    /// `NotFound`, never zero stock.
    pub async fn find(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
    ) -> Result<ProductInventory, DomainError> {
        self.store
            .find_inventory(slot_id, product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("inventory", format!("{slot_id}/{product_id}")))
    }

    pub async fn available_quantity(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
    ) -> Result<u32, DomainError> {
        Ok(self.find(slot_id, product_id).await?.available_quantity())
    }

    /// Operator correction: overwrites reserved and sold with absolute values.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantities(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
        reserved: u32,
        sold: u32,
    ) -> Result<ProductInventory, DomainError> {
        let row = self.find(slot_id, product_id).await?;
        let row = self
            .store
            .set_inventory_quantities(row.id, reserved, sold)
            .await?;
        tracing::info!(inventory_id = %row.id, reserved, sold, "inventory quantities updated");
        Ok(row)
    }

    pub async fn list_for_slot(
        &self,
        slot_id: SalesSlotId,
    ) -> Result<Vec<ProductInventory>, DomainError> {
        Ok(self.store.list_inventory_for_slot(slot_id).await?)
    }

    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductInventory>, DomainError> {
        Ok(self.store.list_inventory_for_product(product_id).await?)
    }
}
