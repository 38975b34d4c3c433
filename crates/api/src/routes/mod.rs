//! HTTP handlers, grouped by resource.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod sales_slots;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path or body identifier, mapping failures to 400.
pub(crate) fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID format: {e}")))
}
