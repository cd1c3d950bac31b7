//! Seed the catalog with sample products.
//!
//! Products are created through the catalog service, so they pass the same
//! validation as `POST /admin/products`. Names that already exist are
//! skipped, which makes the command safe to re-run.

use rust_decimal::Decimal;
use tracing::info;

use emporium_core::{Email, Role};
use emporium_storefront::db::{CatalogRepository, PgStore, UserRepository};
use emporium_storefront::models::User;
use emporium_storefront::services::catalog::{CatalogError, CatalogService, ProductDraft};

use super::{CliError, connect};

/// Outcome of a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Seed sample products owned by the admin with `owner_email`.
///
/// # Errors
///
/// Returns an error if the owner does not exist or is not an admin, or if a
/// database operation fails.
pub async fn products(owner_email: &str) -> Result<SeedSummary, CliError> {
    let email =
        Email::parse(owner_email).map_err(|_| CliError::UnknownUser(owner_email.to_owned()))?;
    let store = PgStore::new(connect().await?);

    let owner = store
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| CliError::UnknownUser(owner_email.to_owned()))?;
    if owner.role != Role::Admin {
        return Err(CliError::NotAdmin(owner_email.to_owned()));
    }

    let summary = seed_catalog(&store, &owner).await?;
    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Seeding complete!"
    );
    Ok(summary)
}

/// Create every sample product that does not exist yet.
async fn seed_catalog<R: CatalogRepository + ?Sized>(
    store: &R,
    owner: &User,
) -> Result<SeedSummary, CatalogError> {
    let catalog = CatalogService::new(store);
    let mut summary = SeedSummary::default();

    for draft in sample_products() {
        match catalog.create(owner, draft).await {
            Ok(product) => {
                info!(product_id = %product.id, name = %product.name, "Inserted");
                summary.inserted += 1;
            }
            Err(CatalogError::NameTaken(name)) => {
                info!(%name, "Already exists, skipped");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}

/// (name, category, price, description, stock, image file)
const SAMPLE_PRODUCTS: [(&str, &str, i64, &str, i64, &str); 4] = [
    (
        "iPhone 15 Pro Max",
        "Mobile",
        139_999,
        "Latest Apple flagship with A17 chip",
        25,
        "iphone15.jpg",
    ),
    (
        "Samsung Galaxy S24",
        "Mobile",
        99_999,
        "Samsung's top-tier Android phone",
        40,
        "s24.jpg",
    ),
    (
        "Sony WH-1000XM5",
        "Headphones",
        29_999,
        "Industry-leading noise-canceling headphones",
        15,
        "sony-headphones.jpg",
    ),
    (
        "MacBook Air M3",
        "Laptop",
        124_999,
        "Apple's lightweight laptop with M3 chip",
        20,
        "macbook-air.jpg",
    ),
];

fn sample_products() -> impl Iterator<Item = ProductDraft> {
    SAMPLE_PRODUCTS.into_iter().map(
        |(name, category, price, description, stock, image)| ProductDraft {
            name: name.to_owned(),
            description: Some(description.to_owned()),
            price: Decimal::new(price, 0),
            stock,
            category: category.to_owned(),
            image_url: Some(format!("https://example.com/images/{image}")),
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use emporium_core::UserId;
    use emporium_storefront::db::MemoryStore;

    use super::*;

    fn admin() -> User {
        User {
            id: UserId::new(1),
            name: "Admin".to_string(),
            email: Email::parse("admin@example.com").unwrap(),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();

        let first = seed_catalog(&store, &admin()).await.unwrap();
        assert_eq!(first, SeedSummary { inserted: 4, skipped: 0 });

        let second = seed_catalog(&store, &admin()).await.unwrap();
        assert_eq!(second, SeedSummary { inserted: 0, skipped: 4 });

        assert_eq!(store.list_products_page(0, 10).await.unwrap().len(), 4);
    }
}
