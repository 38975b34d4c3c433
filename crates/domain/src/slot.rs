//! Sales slot lifecycle.

use chrono::{DateTime, Utc};
use common::{ProductId, ProductInventory, SalesSlot, SalesSlotId};
use store::Store;

use crate::error::DomainError;
use crate::inventory::InventoryLedger;

/// Creates sales slots, toggles their activation, and registers the
/// products each slot offers.
///
/// Activation is an explicit operator switch. Nothing here looks at the
/// clock: an elapsed slot can still be activated, and an active slot stays
/// active until someone deactivates it.
#[derive(Clone)]
pub struct SalesSlotService<S: Store> {
    store: S,
    ledger: InventoryLedger<S>,
}

impl<S: Store> SalesSlotService<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Creates an inactive slot. Fails if `end_time` precedes `start_time`.
    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SalesSlot, DomainError> {
        validate_range(start_time, end_time)?;

        let slot = self
            .store
            .insert_slot(SalesSlot::new(start_time, end_time))
            .await?;
        tracing::info!(slot_id = %slot.id, "sales slot created");
        Ok(slot)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: SalesSlotId) -> Result<SalesSlot, DomainError> {
        self.store
            .find_slot(id)
            .await?
            .ok_or_else(|| DomainError::not_found("sales slot", id))
    }

    pub async fn list(&self) -> Result<Vec<SalesSlot>, DomainError> {
        Ok(self.store.list_slots().await?)
    }

    pub async fn list_active(&self) -> Result<Vec<SalesSlot>, DomainError> {
        Ok(self.store.list_active_slots().await?)
    }

    /// Returns the slots intersecting `[start, end)`. Slots that only touch
    /// a boundary are excluded.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SalesSlot>, DomainError> {
        validate_range(start, end)?;
        Ok(self.store.find_slots_overlapping(start, end).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn activate(&self, id: SalesSlotId) -> Result<SalesSlot, DomainError> {
        let slot = self.store.set_slot_active(id, true).await?;
        tracing::info!(slot_id = %id, "sales slot activated");
        Ok(slot)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: SalesSlotId) -> Result<SalesSlot, DomainError> {
        let slot = self.store.set_slot_active(id, false).await?;
        tracing::info!(slot_id = %id, "sales slot deactivated");
        Ok(slot)
    }

    pub async fn add_product(
        &self,
        slot_id: SalesSlotId,
        product_id: ProductId,
        initial_quantity: u32,
    ) -> Result<ProductInventory, DomainError> {
        self.ledger
            .add_product(slot_id, product_id, initial_quantity)
            .await
    }

    pub async fn list_inventory(
        &self,
        slot_id: SalesSlotId,
    ) -> Result<Vec<ProductInventory>, DomainError> {
        self.get(slot_id).await?;
        self.ledger.list_for_slot(slot_id).await
    }
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DomainError> {
    if end < start {
        return Err(DomainError::InvalidTimeRange { start, end });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use store::InMemoryStore;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 14, hour, 0, 0).unwrap()
    }

    fn service() -> SalesSlotService<InMemoryStore> {
        SalesSlotService::new(InMemoryStore::new())
    }

    #[tokio::test]
    async fn create_starts_inactive() {
        let slots = service();
        let slot = slots.create(at(10), at(12)).await.unwrap();
        assert!(!slot.is_active);
        assert_eq!(slots.get(slot.id).await.unwrap(), slot);
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let slots = service();
        let result = slots.create(at(12), at(10)).await;
        assert!(matches!(result, Err(DomainError::InvalidTimeRange { .. })));
        assert!(slots.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activation_toggles() {
        let slots = service();
        let slot = slots.create(at(10), at(12)).await.unwrap();

        assert!(slots.activate(slot.id).await.unwrap().is_active);
        assert_eq!(slots.list_active().await.unwrap().len(), 1);

        assert!(!slots.deactivate(slot.id).await.unwrap().is_active);
        assert!(slots.list_active().await.unwrap().is_empty());

        assert!(matches!(
            slots.activate(SalesSlotId::new()).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn elapsed_slot_can_be_activated() {
        let slots = service();
        let past = Utc.with_ymd_and_hms(2000, 1, 1, 10, 0, 0).unwrap();
        let slot = slots
            .create(past, past + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(slots.activate(slot.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn time_range_uses_overlap() {
        let slots = service();
        let morning = slots.create(at(10), at(12)).await.unwrap();
        let afternoon = slots.create(at(13), at(15)).await.unwrap();

        let found = slots.find_by_time_range(at(11), at(14)).await.unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![morning.id, afternoon.id]);

        let touching = slots.find_by_time_range(at(12), at(13)).await.unwrap();
        assert!(touching.is_empty());
    }

    #[tokio::test]
    async fn list_inventory_requires_slot() {
        let slots = service();
        assert!(matches!(
            slots.list_inventory(SalesSlotId::new()).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
