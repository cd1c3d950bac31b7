//! Order history route handlers and the order JSON views.

use axum::extract::State;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus, Price, ProductId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireShopper;
use crate::models::{Order, OrderItem, OrderWithItems};
use crate::services::orders::OrderService;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderSummaryView {
    pub id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummaryView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_description: Option<String>,
    pub quantity: i32,
    pub price_at_purchase: Price,
    pub subtotal: Decimal,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        Self {
            subtotal: item.subtotal(),
            product_id: item.product_id,
            product_name: item.product_name,
            product_description: item.product_description,
            quantity: item.quantity.get(),
            price_at_purchase: item.price_at_purchase,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetailView {
    #[serde(flatten)]
    pub order: OrderSummaryView,
    pub items: Vec<OrderItemView>,
}

impl From<OrderWithItems> for OrderDetailView {
    fn from(detail: OrderWithItems) -> Self {
        Self {
            order: detail.order.into(),
            items: detail.items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

/// `GET /orders`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
) -> Result<Json<Vec<OrderSummaryView>>> {
    let orders = OrderService::new(state.store()).list(user.id).await?;
    Ok(Json(orders.into_iter().map(OrderSummaryView::from).collect()))
}

/// `GET /orders/{id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetailView>> {
    let detail = OrderService::new(state.store()).get(user.id, id).await?;
    Ok(Json(detail.into()))
}
