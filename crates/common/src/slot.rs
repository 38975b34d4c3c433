//! Sales slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SalesSlotId;

/// A time window during which products are sold from finite stock.
///
/// Activation is a manual operator switch. It is never derived from the
/// current time, so an elapsed slot stays orderable until someone
/// deactivates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSlot {
    pub id: SalesSlotId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesSlot {
    /// Creates an inactive slot. The caller validates the time range.
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: SalesSlotId::new(),
            start_time,
            end_time,
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the slot intersects the half-open range `[start, end)`.
    ///
    /// The slot itself is treated as `[start_time, end_time)`, so slots that
    /// merely touch the range boundary do not match, and a zero-length slot
    /// never matches.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}
