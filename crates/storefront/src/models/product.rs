//! Catalog domain types.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use emporium_core::{Price, ProductId, UserId};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    /// Unique across the catalog.
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    /// Units on hand. Never negative.
    pub stock: i32,
    pub category: String,
    pub image_url: Option<String>,
    /// Admin who created the product. Only they may change or delete it.
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub stock: i32,
    pub category: String,
    pub image_url: Option<String>,
}

/// Validated partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ProductChanges {
    /// True when the update would not touch any field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
    }

    /// Apply the changes to an in-memory product.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = Some(image_url.clone());
        }
    }
}

/// Sort key for public product listings.
///
/// Ties are always broken by ascending id so pages are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSort {
    /// Cheapest first.
    #[default]
    Price,
    /// Alphabetical, ignoring case.
    Name,
    /// Most stock first.
    Stock,
}

impl ProductSort {
    /// Compare two products under this sort key.
    #[must_use]
    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        let primary = match self {
            Self::Price => a.price.cmp(&b.price),
            Self::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            Self::Stock => b.stock.cmp(&a.stock),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// SQL `ORDER BY` clause for this sort key.
    ///
    /// Names compare under the `C` collation so the database orders them the
    /// same way [`compare`](Self::compare) does.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Price => "price ASC, id ASC",
            Self::Name => r#"LOWER(name) COLLATE "C" ASC, name COLLATE "C" ASC, id ASC"#,
            Self::Stock => "stock DESC, id ASC",
        }
    }
}

/// Filter, sort and page for the public product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the category.
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub offset: i64,
    pub limit: i64,
}

impl ProductFilter {
    /// Whether `product` passes the category and price filters.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category
            && !contains_ignore_case(&product.category, category)
        {
            return false;
        }
        let price = product.price.amount();
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        true
    }
}

/// Whether `product` matches a search keyword in its name or description.
#[must_use]
pub fn matches_keyword(product: &Product, keyword: &str) -> bool {
    contains_ignore_case(&product.name, keyword)
        || product
            .description
            .as_deref()
            .is_some_and(|d| contains_ignore_case(d, keyword))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` so user input is matched literally by `ILIKE`.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
