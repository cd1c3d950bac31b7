//! Shopping cart route handlers.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{CartItemId, ProductId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireShopper;
use crate::models::{CartAddOutcome, CartLine};
use crate::routes::Message;
use crate::routes::products::ProductView;
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// One line of the cart as returned by `GET /cart`.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: CartItemId,
    pub product: ProductView,
    pub quantity: i32,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        Self {
            id: line.id,
            product: line.product.into(),
            quantity: line.quantity.get(),
        }
    }
}

/// `POST /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
    Json(body): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let outcome = CartService::new(state.store())
        .add(user.id, body.product_id, body.quantity)
        .await?;

    let message = match outcome {
        CartAddOutcome::Added => "Product added to cart.",
        CartAddOutcome::Incremented(_) => "Product quantity updated in cart.",
    };
    Ok((StatusCode::CREATED, Json(Message::new(message))))
}

/// `GET /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
) -> Result<Json<Vec<CartLineView>>> {
    let lines = CartService::new(state.store()).lines(user.id).await?;
    Ok(Json(lines.into_iter().map(CartLineView::from).collect()))
}

/// `PUT /cart/{product_id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<Message>> {
    CartService::new(state.store())
        .update(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(Message::new("Cart item quantity updated successfully.")))
}

/// `DELETE /cart/{product_id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Message>> {
    CartService::new(state.store())
        .remove(user.id, product_id)
        .await?;
    Ok(Json(Message::new("Product removed from cart successfully.")))
}
