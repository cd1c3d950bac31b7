//! Persistence for the storefront.
//!
//! # Tables
//!
//! - `users` - Accounts with role and Argon2 password hash
//! - `password_reset_tokens` - Single-use reset tokens
//! - `products` - Catalog (unique `name`, `stock >= 0`)
//! - `cart_items` - One row per (user, product)
//! - `orders` - Order headers
//! - `order_items` - Order lines with product snapshot, `product_id` nulled on delete
//!
//! # Backends
//!
//! Each component talks to a repository trait. [`PgStore`] implements them on
//! `PostgreSQL`; [`MemoryStore`] keeps everything in process and backs the
//! tests and database-less local runs.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use emporium_core::{Email, OrderId, OrderStatus, ProductId, Quantity, ResetTokenId, UserId};

use crate::models::{
    CartAddOutcome, CartEntry, CartLine, NewOrderItem, NewProduct, NewUser, Order, OrderItem,
    OrderWithItems, PasswordResetToken, Product, ProductChanges, ProductFilter, User,
};

pub use memory::{MemoryStore, MemoryTables};
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Accounts and password reset tokens.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Look up a user together with their password hash.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn create_reset_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, RepositoryError>;

    /// Find a reset token that has not been used yet.
    async fn find_unused_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError>;

    /// Mark the token used and replace the owner's password hash, atomically.
    ///
    /// Returns `RepositoryError::NotFound` if the token was consumed
    /// concurrently or its user no longer exists.
    async fn consume_reset_token(
        &self,
        token_id: ResetTokenId,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;
}

/// The product catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert a product owned by `owner`.
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    async fn create_product(
        &self,
        owner: UserId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Filtered, sorted page of products.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    /// Unfiltered page in id order.
    async fn list_products_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Products whose name or description contains `keyword`, in id order.
    async fn search_products(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError>;

    /// Apply a partial update.
    ///
    /// Returns `RepositoryError::NotFound` if the product is gone and
    /// `RepositoryError::Conflict` if a rename collides.
    async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product, its cart entries, and unlink it from order items,
    /// in one transaction.
    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;
}

/// Per-user carts.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Insert an entry or increase the quantity of the existing one.
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartAddOutcome, RepositoryError>;

    /// Cart contents joined with products, in entry id order.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError>;

    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError>;
}

/// The order ledger.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Start the unit of work that turns a cart into an order.
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTransaction>, RepositoryError>;

    /// Orders owned by `user_id`, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// The order with its items, only if `user_id` owns it.
    async fn order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>, RepositoryError>;
}

/// Reads and writes that make up one checkout.
///
/// Nothing is visible to other readers until [`commit`](Self::commit).
/// Dropping the transaction without committing discards every write.
#[async_trait]
pub trait CheckoutTransaction: Send {
    async fn cart_entries(&mut self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError>;

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn insert_order(
        &mut self,
        user_id: UserId,
        total_amount: Decimal,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError>;

    /// Subtract `quantity` from stock if at least that much is on hand.
    ///
    /// Returns `false`, leaving stock untouched, when it is not.
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError>;

    /// Delete every cart entry of `user_id`. Returns the number removed.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Everything the HTTP layer needs from persistence.
#[async_trait]
pub trait Store: UserRepository + CatalogRepository + CartRepository + OrderRepository {
    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
