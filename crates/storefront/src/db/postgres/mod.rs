//! `PostgreSQL` implementation of the repository traits.
//!
//! Queries are built at runtime with `sqlx::query_as` and decoded into the
//! row types below, then converted into domain models.

mod cart;
mod catalog;
mod orders;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use emporium_core::{Price, ProductId, UserId};

use super::{RepositoryError, Store};
use crate::models::Product;

/// Columns selected for every product query, in [`ProductRow`] order.
const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, category, image_url, owner_id, created_at, updated_at";

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Price,
    stock: i32,
    category: String,
    image_url: Option<String>,
    owner_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            category: r.category,
            image_url: r.image_url,
            owner_id: r.owner_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
fn unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}
