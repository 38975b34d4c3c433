//! Order placement, lifecycle, and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Order, OrderId, OrderItem, OrderStatus, PaymentMethod, SalesSlotId};
use domain::{AddOrderItems, CreateOrder, OrderItemInput};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;

use super::parse_id;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub sales_slot_id: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub ticket_number: String,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    pub transaction_id: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price: i64,
    /// Absent only if `price * quantity` leaves the money range, which
    /// order placement already rules out.
    pub subtotal: Option<i64>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            subtotal: item.subtotal().map(|m| m.amount()),
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            price: item.price.amount(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub sales_slot_id: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub ticket_number: String,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub is_paid: bool,
    pub is_delivered: bool,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            sales_slot_id: order.sales_slot_id.to_string(),
            status: order.status,
            total_amount: order.total_amount.amount(),
            ticket_number: order.ticket_number,
            payment_method: order.payment_method,
            transaction_id: order.transaction_id,
            is_paid: order.is_paid,
            is_delivered: order.is_delivered,
            items: order.items.into_iter().map(Into::into).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn parse_items(items: &[OrderItemRequest]) -> Result<Vec<OrderItemInput>, ApiError> {
    items
        .iter()
        .map(|item| {
            Ok(OrderItemInput::new(
                parse_id(&item.product_id, "product")?,
                item.quantity,
            ))
        })
        .collect()
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|e: common::ParseEnumError| ApiError::BadRequest(e.to_string()))
}

fn orders_response(orders: Vec<Order>) -> Json<Vec<OrderResponse>> {
    Json(orders.into_iter().map(Into::into).collect())
}

// -- Handlers --

/// POST /orders: reserves stock and places a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let slot_id: SalesSlotId = parse_id(&req.sales_slot_id, "sales slot")?;
    let items = parse_items(&req.items)?;
    let payment_method = match req.payment_method.as_deref() {
        Some(raw) => raw
            .parse::<PaymentMethod>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => PaymentMethod::default(),
    };

    let cmd = CreateOrder::new(slot_id, items, req.ticket_number)
        .with_payment_method(payment_method);
    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(orders_response(state.orders.list_orders().await?))
}

/// GET /orders/status?status=CONFIRMED
pub async fn list_by_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let status = parse_status(&query.status)?;
    Ok(orders_response(state.orders.list_by_status(status).await?))
}

/// GET /orders/number/{ticket}
pub async fn get_by_ticket<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(ticket): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    Ok(Json(state.orders.get_by_ticket_number(&ticket).await?.into()))
}

/// GET /orders/{id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.get_order(id).await?.into()))
}

/// POST /orders/{id}/items
#[tracing::instrument(skip(state, req))]
pub async fn add_items<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddItemsRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let items = parse_items(&req.items)?;
    let order = state.orders.add_items(AddOrderItems::new(id, items)).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let status = parse_status(&req.status)?;
    Ok(Json(state.orders.update_status(id, status).await?.into()))
}

/// PUT /orders/{id}/confirm
#[tracing::instrument(skip(state))]
pub async fn confirm<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.confirm(id).await?.into()))
}

/// PUT /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.cancel(id).await?.into()))
}

/// PUT /orders/{id}/payment
#[tracing::instrument(skip(state, req))]
pub async fn update_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state
        .orders
        .update_payment(id, req.transaction_id)
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/delivery
#[tracing::instrument(skip(state))]
pub async fn update_delivery<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.update_delivery(id).await?.into()))
}
