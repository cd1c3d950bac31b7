//! Command implementations and their shared plumbing.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use emporium_storefront::db::{self, RepositoryError};
use emporium_storefront::services::auth::AuthError;
use emporium_storefront::services::catalog::CatalogError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, user")]
    InvalidRole(String),

    #[error("No user with email: {0}")]
    UnknownUser(String),

    #[error("{0} is not an admin")]
    NotAdmin(String),
}

/// Connect to the storefront database.
async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
