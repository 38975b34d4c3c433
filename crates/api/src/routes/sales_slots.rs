//! Sales slot and per-slot inventory endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ProductId, ProductInventory, SalesSlot, SalesSlotId};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;

use super::parse_id;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    pub product_id: String,
    pub initial_quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryRequest {
    pub reserved_quantity: u32,
    pub sold_quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SalesSlot> for SlotResponse {
    fn from(slot: SalesSlot) -> Self {
        Self {
            id: slot.id.to_string(),
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_active: slot.is_active,
            created_at: slot.created_at,
            updated_at: slot.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub id: String,
    pub sales_slot_id: String,
    pub product_id: String,
    pub initial_quantity: u32,
    pub reserved_quantity: u32,
    pub sold_quantity: u32,
    pub available_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductInventory> for InventoryResponse {
    fn from(row: ProductInventory) -> Self {
        Self {
            available_quantity: row.available_quantity(),
            id: row.id.to_string(),
            sales_slot_id: row.sales_slot_id.to_string(),
            product_id: row.product_id.to_string(),
            initial_quantity: row.initial_quantity,
            reserved_quantity: row.reserved_quantity,
            sold_quantity: row.sold_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_time(raw: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field} timestamp: {e}")))
}

fn slots_response(slots: Vec<SalesSlot>) -> Json<Vec<SlotResponse>> {
    Json(slots.into_iter().map(Into::into).collect())
}

// -- Slot handlers --

/// POST /sales-slots
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<SlotResponse>), ApiError> {
    let slot = state.slots.create(req.start_time, req.end_time).await?;
    Ok((StatusCode::CREATED, Json(slot.into())))
}

/// GET /sales-slots
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SlotResponse>>, ApiError> {
    Ok(slots_response(state.slots.list().await?))
}

/// GET /sales-slots/active
pub async fn list_active<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SlotResponse>>, ApiError> {
    Ok(slots_response(state.slots.list_active().await?))
}

/// GET /sales-slots/range?start=..&end=..
#[tracing::instrument(skip(state, query))]
pub async fn range<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<SlotResponse>>, ApiError> {
    let start = parse_time(&query.start, "start")?;
    let end = parse_time(&query.end, "end")?;
    Ok(slots_response(
        state.slots.find_by_time_range(start, end).await?,
    ))
}

/// GET /sales-slots/{id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SlotResponse>, ApiError> {
    let id: SalesSlotId = parse_id(&id, "sales slot")?;
    Ok(Json(state.slots.get(id).await?.into()))
}

/// PUT /sales-slots/{id}/activate
#[tracing::instrument(skip(state))]
pub async fn activate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SlotResponse>, ApiError> {
    let id: SalesSlotId = parse_id(&id, "sales slot")?;
    Ok(Json(state.slots.activate(id).await?.into()))
}

/// PUT /sales-slots/{id}/deactivate
#[tracing::instrument(skip(state))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SlotResponse>, ApiError> {
    let id: SalesSlotId = parse_id(&id, "sales slot")?;
    Ok(Json(state.slots.deactivate(id).await?.into()))
}

// -- Inventory handlers --

/// POST /sales-slots/{id}/products
#[tracing::instrument(skip(state, req))]
pub async fn add_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddProductRequest>,
) -> Result<(StatusCode, Json<InventoryResponse>), ApiError> {
    let slot_id: SalesSlotId = parse_id(&id, "sales slot")?;
    let product_id: ProductId = parse_id(&req.product_id, "product")?;
    let row = state
        .slots
        .add_product(slot_id, product_id, req.initial_quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /sales-slots/{id}/products
pub async fn list_products<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<InventoryResponse>>, ApiError> {
    let slot_id: SalesSlotId = parse_id(&id, "sales slot")?;
    let rows = state.slots.list_inventory(slot_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// PUT /sales-slots/{id}/products/{product_id}
#[tracing::instrument(skip(state, req))]
pub async fn update_inventory<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, product_id)): Path<(String, String)>,
    Json(req): Json<UpdateInventoryRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let slot_id: SalesSlotId = parse_id(&id, "sales slot")?;
    let product_id: ProductId = parse_id(&product_id, "product")?;
    let row = state
        .slots
        .ledger()
        .update_quantities(slot_id, product_id, req.reserved_quantity, req.sold_quantity)
        .await?;
    Ok(Json(row.into()))
}
