//! Public catalog route handlers and the product JSON views.

use axum::extract::State;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{Price, ProductId, UserId};

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::models::{Product, ProductSort};
use crate::services::catalog::{CatalogService, ListingQuery};
use crate::state::AppState;

/// Product as shown to everyone. The owner is not exposed.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub stock: i32,
    pub category: String,
    pub image_url: Option<String>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category: product.category,
            image_url: product.image_url,
        }
    }
}

/// Product as shown to admins.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProductView {
    #[serde(flatten)]
    pub product: ProductView,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for AdminProductView {
    fn from(product: Product) -> Self {
        Self {
            created_by: product.owner_id,
            created_at: product.created_at,
            updated_at: product.updated_at,
            product: product.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort_by: ProductSort,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl From<ListParams> for ListingQuery {
    fn from(params: ListParams) -> Self {
        Self {
            category: params.category,
            min_price: params.min_price,
            max_price: params.max_price,
            sort: params.sort_by,
            page: params.page,
            page_size: params.page_size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: String,
}

/// `GET /products`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProductView>>> {
    let products = CatalogService::new(state.store())
        .list(params.into())
        .await?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

/// `GET /products/search`
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProductView>>> {
    let products = CatalogService::new(state.store())
        .search(&params.keyword)
        .await?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

/// `GET /products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    let product = CatalogService::new(state.store()).get(id).await?;
    Ok(Json(product.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(4),
            name: "Dell XPS 13".to_string(),
            description: None,
            price: Price::parse("999.99").unwrap(),
            stock: 15,
            category: "Laptop".to_string(),
            image_url: None,
            owner_id: UserId::new(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_public_view_hides_owner() {
        let json = serde_json::to_value(ProductView::from(product())).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["name"], "Dell XPS 13");
        assert!(json.get("created_by").is_none());
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn test_admin_view_flattens_product() {
        let json = serde_json::to_value(AdminProductView::from(product())).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["stock"], 15);
        assert_eq!(json["created_by"], 1);
    }
}
