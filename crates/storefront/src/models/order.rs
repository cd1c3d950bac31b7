//! Order ledger domain types.
//!
//! Order items carry a snapshot of the product as it was at purchase time.
//! They never follow later catalog edits, and `product_id` becomes `None`
//! once the product is deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use emporium_core::{
    OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity, UserId, round_for_display,
};

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Exact sum of line totals.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Largest order total, the range of a `NUMERIC(14, 2)` column.
    /// 99_999_999_999_999 is `0x5AF3_107A_3FFF`, split into its low and middle words.
    pub const MAX_TOTAL: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);
}

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_description: Option<String>,
    pub quantity: Quantity,
    pub price_at_purchase: Price,
}

impl OrderItem {
    /// `quantity * price_at_purchase`, rounded to cents for display.
    ///
    /// Stored lines passed the order total check at checkout, so the product
    /// always fits.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price_at_purchase
            .line_total(self.quantity)
            .map_or(Order::MAX_TOTAL, round_for_display)
    }
}

/// Snapshot of a cart line, ready to be written as an order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_description: Option<String>,
    pub quantity: Quantity,
    pub price_at_purchase: Price,
}

impl NewOrderItem {
    /// Exact line total, `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price_at_purchase.line_total(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
