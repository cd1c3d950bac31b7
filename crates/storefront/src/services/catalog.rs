//! Product catalog service.
//!
//! Admins create products and may change or delete only the ones they own.
//! Name uniqueness is enforced by the store; there is no pre-check.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use emporium_core::{Price, PriceError, ProductId};

use crate::db::{CatalogRepository, RepositoryError};
use crate::models::{NewProduct, Product, ProductChanges, ProductFilter, ProductSort, User};

/// Largest page a listing may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("Product not found")]
    NotFound,

    #[error("Product with name '{0}' already exists.")]
    NameTaken(String),

    #[error("You are not authorized to modify this product.")]
    NotOwnerUpdate,

    #[error("You are not authorized to delete this product.")]
    NotOwnerDelete,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Unvalidated fields for a new product.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub category: String,
    pub image_url: Option<String>,
}

/// Unvalidated partial update.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Public listing request.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Catalog service.
pub struct CatalogService<'a, R: CatalogRepository + ?Sized> {
    products: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> CatalogService<'a, R> {
    #[must_use]
    pub const fn new(products: &'a R) -> Self {
        Self { products }
    }

    /// Create a product owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad fields and
    /// `CatalogError::NameTaken` if the name is in use.
    #[instrument(skip(self, owner, draft), fields(owner_id = %owner.id, name = %draft.name))]
    pub async fn create(&self, owner: &User, draft: ProductDraft) -> Result<Product, CatalogError> {
        let new = NewProduct {
            name: required_text(&draft.name, "Product name")?,
            description: draft.description,
            price: price(draft.price)?,
            stock: stock(draft.stock)?,
            category: required_text(&draft.category, "Category")?,
            image_url: draft.image_url.as_deref().map(image_url).transpose()?,
        };

        let product = self
            .products
            .create_product(owner.id, &new)
            .await
            .map_err(|e| name_conflict(e, &new.name))?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no product has this id.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .get_product(id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Filtered, sorted page of the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a bad page or price range.
    #[instrument(skip(self))]
    pub async fn list(&self, query: ListingQuery) -> Result<Vec<Product>, CatalogError> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(CatalogError::Validation("page must be at least 1".to_owned()));
        }
        let page_size = page_size(query.page_size, "page_size")?;

        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(CatalogError::Validation(
                "min_price cannot be greater than max_price".to_owned(),
            ));
        }

        let filter = ProductFilter {
            category: query
                .category
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty()),
            min_price: query.min_price,
            max_price: query.max_price,
            sort: query.sort,
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        };
        Ok(self.products.list_products(&filter).await?)
    }

    /// Unfiltered page in id order, for the admin listing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a negative `skip` or bad `limit`.
    pub async fn list_all(
        &self,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, CatalogError> {
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(CatalogError::Validation("skip cannot be negative".to_owned()));
        }
        let limit = page_size(limit, "limit")?;
        Ok(self.products.list_products_page(skip, limit).await?)
    }

    /// Products whose name or description contains `keyword`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a blank keyword.
    #[instrument(skip(self))]
    pub async fn search(&self, keyword: &str) -> Result<Vec<Product>, CatalogError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(CatalogError::Validation(
                "Search keyword cannot be empty".to_owned(),
            ));
        }
        Ok(self.products.search_products(keyword).await?)
    }

    /// Apply a partial update on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, `NotOwnerUpdate`, `Validation`, or
    /// `NameTaken` on a colliding rename.
    #[instrument(skip(self, requester, patch), fields(user_id = %requester.id))]
    pub async fn update(
        &self,
        requester: &User,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        let current = self.get(id).await?;
        if current.owner_id != requester.id {
            warn!(owner_id = %current.owner_id, "Update rejected: not the owner");
            return Err(CatalogError::NotOwnerUpdate);
        }

        let changes = ProductChanges {
            name: patch
                .name
                .as_deref()
                .map(|n| required_text(n, "Product name"))
                .transpose()?,
            description: patch.description,
            price: patch.price.map(price).transpose()?,
            stock: patch.stock.map(stock).transpose()?,
            category: patch
                .category
                .as_deref()
                .map(|c| required_text(c, "Category"))
                .transpose()?,
            image_url: patch.image_url.as_deref().map(image_url).transpose()?,
        };
        if changes.is_empty() {
            return Ok(current);
        }

        let product = self
            .products
            .update_product(id, &changes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::NotFound,
                other => name_conflict(other, changes.name.as_deref().unwrap_or(&current.name)),
            })?;

        info!("Product updated");
        Ok(product)
    }

    /// Delete a product on behalf of `requester`.
    ///
    /// Order history keeps its snapshot; cart entries for the product go away.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `NotOwnerDelete`.
    #[instrument(skip(self, requester), fields(user_id = %requester.id))]
    pub async fn delete(&self, requester: &User, id: ProductId) -> Result<(), CatalogError> {
        let current = self.get(id).await?;
        if current.owner_id != requester.id {
            warn!(owner_id = %current.owner_id, "Delete rejected: not the owner");
            return Err(CatalogError::NotOwnerDelete);
        }

        self.products.delete_product(id).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::NotFound,
            other => CatalogError::Repository(other),
        })?;

        info!("Product deleted");
        Ok(())
    }
}

fn name_conflict(e: RepositoryError, name: &str) -> CatalogError {
    match e {
        RepositoryError::Conflict(_) => CatalogError::NameTaken(name.to_owned()),
        other => CatalogError::Repository(other),
    }
}

fn required_text(value: &str, field: &str) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_owned())
}

fn price(amount: Decimal) -> Result<Price, CatalogError> {
    Price::new(amount).map_err(|e| {
        CatalogError::Validation(match e {
            PriceError::NotPositive => "Price must be greater than 0".to_owned(),
            PriceError::TooLarge => format!("Price cannot exceed {}", Price::MAX),
            other => other.to_string(),
        })
    })
}

fn stock(stock: i64) -> Result<i32, CatalogError> {
    if stock < 0 {
        return Err(CatalogError::Validation("Stock cannot be negative".to_owned()));
    }
    i32::try_from(stock).map_err(|_| CatalogError::Validation("Stock is too large".to_owned()))
}

fn image_url(raw: &str) -> Result<String, CatalogError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url.into()),
        _ => Err(CatalogError::Validation(
            "image_url must be an absolute http(s) URL".to_owned(),
        )),
    }
}

fn page_size(requested: Option<i64>, field: &str) -> Result<i64, CatalogError> {
    let size = requested.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(CatalogError::Validation(format!(
            "{field} must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(size)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use emporium_core::{Email, Role, UserId};

    use super::*;
    use crate::db::MemoryStore;

    fn admin(id: i32) -> User {
        User {
            id: UserId::new(id),
            name: "Admin".to_string(),
            email: Email::parse(&format!("admin{id}@example.com")).unwrap(),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }

    fn draft(name: &str, price: &str, stock: i64, category: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: Some(format!("{name} description")),
            price: price.parse().unwrap(),
            stock,
            category: category.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let owner = admin(1);

        let cases = [
            draft("  ", "1.00", 1, "Mobile"),
            draft("Phone", "0", 1, "Mobile"),
            draft("Phone", "-5", 1, "Mobile"),
            draft("Phone", "1.001", 1, "Mobile"),
            draft("Phone", "10000000000.00", 1, "Mobile"),
            draft("Phone", "1.00", -1, "Mobile"),
            draft("Phone", "1.00", 1, ""),
        ];
        for case in cases {
            let result = service.create(&owner, case.clone()).await;
            assert!(
                matches!(result, Err(CatalogError::Validation(_))),
                "{case:?}"
            );
        }

        let huge = service
            .create(&owner, draft("Phone", "10000000000000000000000000", 100_000, "Mobile"))
            .await;
        match huge {
            Err(CatalogError::Validation(message)) => {
                assert_eq!(message, "Price cannot exceed 9999999999.99");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(
            service
                .create(&owner, draft("Phone", "9999999999.99", 1, "Mobile"))
                .await
                .is_ok()
        );

        let mut bad_url = draft("Phone Case", "1.00", 1, "Mobile");
        bad_url.image_url = Some("ftp://example.com/x.png".to_string());
        assert!(matches!(
            service.create(&owner, bad_url).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_reports_conflict() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let owner = admin(1);

        service
            .create(&owner, draft("Phone", "1.00", 1, "Mobile"))
            .await
            .unwrap();
        let err = service
            .create(&owner, draft("Phone", "2.00", 1, "Mobile"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Product with name 'Phone' already exists.");
    }

    #[tokio::test]
    async fn test_only_owner_may_update_or_delete() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let owner = admin(1);
        let other = admin(2);

        let product = service
            .create(&owner, draft("Phone", "1.00", 1, "Mobile"))
            .await
            .unwrap();
        let patch = ProductPatch {
            stock: Some(9),
            ..ProductPatch::default()
        };

        assert!(matches!(
            service.update(&other, product.id, patch.clone()).await,
            Err(CatalogError::NotOwnerUpdate)
        ));
        assert!(matches!(
            service.delete(&other, product.id).await,
            Err(CatalogError::NotOwnerDelete)
        ));

        let updated = service.update(&owner, product.id, patch).await.unwrap();
        assert_eq!(updated.stock, 9);
        service.delete(&owner, product.id).await.unwrap();
        assert!(matches!(
            service.get(product.id).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_conflicts() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let owner = admin(1);

        service
            .create(&owner, draft("Phone", "1.00", 1, "Mobile"))
            .await
            .unwrap();
        let laptop = service
            .create(&owner, draft("Laptop", "1.00", 1, "Laptop"))
            .await
            .unwrap();

        let patch = ProductPatch {
            name: Some("Phone".to_string()),
            ..ProductPatch::default()
        };
        assert!(matches!(
            service.update(&owner, laptop.id, patch).await,
            Err(CatalogError::NameTaken(name)) if name == "Phone"
        ));
    }

    #[tokio::test]
    async fn test_listing_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let owner = admin(1);

        for (name, price, stock, category) in [
            ("iPhone", "1399.99", 25, "Mobile"),
            ("Galaxy", "999.99", 40, "Mobile"),
            ("Sony", "299.99", 15, "Headphones"),
            ("MacBook", "1249.99", 20, "Laptop"),
        ] {
            service
                .create(&owner, draft(name, price, stock, category))
                .await
                .unwrap();
        }

        let names = |products: Vec<Product>| -> Vec<String> {
            products.into_iter().map(|p| p.name).collect()
        };

        let by_price = service.list(ListingQuery::default()).await.unwrap();
        assert_eq!(names(by_price), ["Sony", "Galaxy", "MacBook", "iPhone"]);

        let mobiles = service
            .list(ListingQuery {
                category: Some("mob".to_string()),
                sort: ProductSort::Stock,
                ..ListingQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(names(mobiles), ["Galaxy", "iPhone"]);

        let second_page = service
            .list(ListingQuery {
                sort: ProductSort::Name,
                page: Some(2),
                page_size: Some(3),
                ..ListingQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(names(second_page), ["iPhone"]);

        let nothing = service
            .list(ListingQuery {
                min_price: Some(Decimal::new(5000, 0)),
                ..ListingQuery::default()
            })
            .await
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    async fn test_listing_rejects_bad_ranges() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);

        for query in [
            ListingQuery {
                page: Some(0),
                ..ListingQuery::default()
            },
            ListingQuery {
                page_size: Some(101),
                ..ListingQuery::default()
            },
            ListingQuery {
                min_price: Some(Decimal::TEN),
                max_price: Some(Decimal::ONE),
                ..ListingQuery::default()
            },
        ] {
            assert!(matches!(
                service.list(query).await,
                Err(CatalogError::Validation(_))
            ));
        }
        assert!(matches!(
            service.search("   ").await,
            Err(CatalogError::Validation(_))
        ));
    }
}
