//! Orders, order lines, and the closed enums attached to them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Money, OrderId, OrderItemId, ProductId, SalesSlotId};

/// Error returned when a string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// The status of an order.
///
/// State transitions:
/// ```text
/// Reserved ──┬──► Confirmed
///            └──► Cancelled
/// ```
/// Both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stock is held for the order; items may still be added.
    #[default]
    Reserved,

    /// The held stock has been sold (terminal state).
    Confirmed,

    /// The held stock has been released (terminal state).
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Reserved,
        OrderStatus::Confirmed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if items can be appended in this state.
    pub fn can_add_items(&self) -> bool {
        matches!(self, OrderStatus::Reserved)
    }

    /// Returns true if the order may move from this state to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        matches!(
            (self, target),
            (
                OrderStatus::Reserved,
                OrderStatus::Confirmed | OrderStatus::Cancelled
            )
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Reserved => "RESERVED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Total conversion used when decoding stored values: anything
    /// unrecognized falls back to `RESERVED`.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RESERVED" => Ok(OrderStatus::Reserved),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// How the customer pays. Only recorded, never processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "CASH")]
    Cash,
    #[serde(rename = "PAYPAY")]
    PayPay,
    #[serde(rename = "SQUARE")]
    Square,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::PayPay => "PAYPAY",
            PaymentMethod::Square => "SQUARE",
        }
    }

    /// Total conversion used when decoding stored values: anything
    /// unrecognized falls back to `CASH`.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "PAYPAY" => Ok(PaymentMethod::PayPay),
            "SQUARE" => Ok(PaymentMethod::Square),
            other => Err(ParseEnumError {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

/// One line of an order.
///
/// `price` is the product's unit price copied when the line was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItem {
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32, price: Money) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
            price,
        }
    }

    /// Returns `price * quantity`, or `None` if it does not fit in `i64`.
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// An order placed against one sales slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub sales_slot_id: SalesSlotId,
    pub status: OrderStatus,
    pub total_amount: Money,
    /// Caller-supplied, globally unique.
    pub ticket_number: String,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub is_paid: bool,
    pub is_delivered: bool,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty `RESERVED` order.
    pub fn new(
        sales_slot_id: SalesSlotId,
        ticket_number: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            sales_slot_id,
            status: OrderStatus::Reserved,
            total_amount: Money::zero(),
            ticket_number: ticket_number.into(),
            payment_method,
            transaction_id: None,
            is_paid: false,
            is_delivered: false,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Recomputes the total from the line subtotals. `None` if any
    /// subtotal or the running sum overflows.
    pub fn items_total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.subtotal()?))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
