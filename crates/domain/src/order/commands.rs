//! Order commands.

use common::{OrderId, PaymentMethod, ProductId, SalesSlotId};

/// One requested order line: which product and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderItemInput {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place a new order against a sales slot.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The slot the order is placed in. Must be active.
    pub sales_slot_id: SalesSlotId,

    /// Initial lines. May be empty.
    pub items: Vec<OrderItemInput>,

    /// Caller-supplied, globally unique ticket number.
    pub ticket_number: String,

    pub payment_method: PaymentMethod,
}

impl CreateOrder {
    /// Creates a new CreateOrder command paid in cash.
    pub fn new(
        sales_slot_id: SalesSlotId,
        items: Vec<OrderItemInput>,
        ticket_number: impl Into<String>,
    ) -> Self {
        Self {
            sales_slot_id,
            items,
            ticket_number: ticket_number.into(),
            payment_method: PaymentMethod::default(),
        }
    }

    pub fn with_payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }
}

/// Command to append lines to a `RESERVED` order.
#[derive(Debug, Clone)]
pub struct AddOrderItems {
    pub order_id: OrderId,
    pub items: Vec<OrderItemInput>,
}

impl AddOrderItems {
    pub fn new(order_id: OrderId, items: Vec<OrderItemInput>) -> Self {
        Self { order_id, items }
    }
}
