//! Catalog management for admins.
//!
//! Any admin can read; only the admin who created a product may change or
//! delete it.

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::ProductId;

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::routes::Message;
use crate::routes::products::AdminProductView;
use crate::services::catalog::{CatalogService, ProductDraft, ProductPatch};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub category: String,
    pub image_url: Option<String>,
}

impl From<CreateProductRequest> for ProductDraft {
    fn from(req: CreateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            category: req.category,
            image_url: req.image_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            category: req.category,
            image_url: req.image_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: &'static str,
    pub product: AdminProductView,
}

/// `POST /admin/products`
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, name = %body.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let product = CatalogService::new(state.store())
        .create(&admin, body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created successfully.",
            product: product.into(),
        }),
    ))
}

/// `GET /admin/products`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<AdminProductView>>> {
    let products = CatalogService::new(state.store())
        .list_all(params.skip, params.limit)
        .await?;
    Ok(Json(
        products.into_iter().map(AdminProductView::from).collect(),
    ))
}

/// `GET /admin/products/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<AdminProductView>> {
    let product = CatalogService::new(state.store()).get(id).await?;
    Ok(Json(product.into()))
}

/// `PUT /admin/products/{id}`
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>> {
    let product = CatalogService::new(state.store())
        .update(&admin, id, body.into())
        .await?;

    Ok(Json(ProductResponse {
        message: "Product updated successfully.",
        product: product.into(),
    }))
}

/// `DELETE /admin/products/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Message>> {
    CatalogService::new(state.store()).delete(&admin, id).await?;
    Ok(Json(Message::new("Product deleted successfully")))
}
