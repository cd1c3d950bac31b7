//! Checkout route handler.

use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireShopper;
use crate::routes::orders::OrderDetailView;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub order: OrderDetailView,
}

/// `POST /checkout`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireShopper(user): RequireShopper,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let placed = CheckoutService::new(state.store())
        .checkout(user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order placed successfully.",
            order: placed.into(),
        }),
    ))
}
