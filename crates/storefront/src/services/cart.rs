//! Shopping cart service.
//!
//! Adding a product that is already in the cart increases its quantity.
//! Quantities are not checked against stock here; checkout does that.

use thiserror::Error;
use tracing::{info, instrument, warn};

use emporium_core::{ProductId, Quantity, QuantityError, UserId};

use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{CartAddOutcome, CartLine};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    Validation(String),

    #[error("Product not found.")]
    ProductNotFound,

    #[error("Product is out of stock.")]
    OutOfStock,

    #[error("Product not found in your cart.")]
    NotInCart,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<QuantityError> for CartError {
    fn from(e: QuantityError) -> Self {
        Self::Validation(match e {
            QuantityError::NotPositive(_) => "Quantity must be at least 1".to_owned(),
            QuantityError::TooLarge => "Quantity is too large".to_owned(),
        })
    }
}

/// Cart service.
pub struct CartService<'a, R: CartRepository + CatalogRepository + ?Sized> {
    store: &'a R,
}

impl<'a, R: CartRepository + CatalogRepository + ?Sized> CartService<'a, R> {
    #[must_use]
    pub const fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Put `quantity` units of a product in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for an unknown product and
    /// `CartError::OutOfStock` when none is on hand.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartAddOutcome, CartError> {
        let quantity = Quantity::try_from(quantity)?;

        let Some(product) = self.store.get_product(product_id).await? else {
            warn!("Add to cart rejected: product not found");
            return Err(CartError::ProductNotFound);
        };
        if product.stock == 0 {
            warn!("Add to cart rejected: out of stock");
            return Err(CartError::OutOfStock);
        }

        let outcome = self
            .store
            .add_to_cart(user_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound,
                RepositoryError::Conflict(_) => {
                    CartError::Validation("Quantity is too large".to_owned())
                }
                other => CartError::Repository(other),
            })?;

        info!(?outcome, "Product added to cart");
        Ok(outcome)
    }

    /// The user's cart, in the order entries were created.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self.store.cart_lines(user_id).await?)
    }

    /// Overwrite the quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        let quantity = Quantity::try_from(quantity)?;
        self.store
            .set_cart_quantity(user_id, product_id, quantity)
            .await
            .map_err(not_in_cart)
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        self.store
            .remove_from_cart(user_id, product_id)
            .await
            .map_err(not_in_cart)
    }
}

fn not_in_cart(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::NotInCart,
        other => CartError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::Price;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewProduct;

    async fn product(store: &MemoryStore, name: &str, stock: i32) -> ProductId {
        store
            .create_product(
                UserId::new(1),
                &NewProduct {
                    name: name.to_string(),
                    description: None,
                    price: Price::parse("10.00").unwrap(),
                    stock,
                    category: "Mobile".to_string(),
                    image_url: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_add_same_product_twice_sums_quantity() {
        let store = MemoryStore::new();
        let service = CartService::new(&store);
        let shopper = UserId::new(2);
        let phone = product(&store, "Phone", 5).await;

        assert_eq!(
            service.add(shopper, phone, 2).await.unwrap(),
            CartAddOutcome::Added
        );
        assert_eq!(
            service.add(shopper, phone, 3).await.unwrap(),
            CartAddOutcome::Incremented(Quantity::new(5).unwrap())
        );

        let lines = service.lines(shopper).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity.get(), 5);
        assert_eq!(lines[0].product.id, phone);
    }

    #[tokio::test]
    async fn test_add_rejections() {
        let store = MemoryStore::new();
        let service = CartService::new(&store);
        let shopper = UserId::new(2);
        let sold_out = product(&store, "Sold out", 0).await;

        assert!(matches!(
            service.add(shopper, ProductId::new(99), 1).await,
            Err(CartError::ProductNotFound)
        ));
        assert!(matches!(
            service.add(shopper, sold_out, 1).await,
            Err(CartError::OutOfStock)
        ));
        assert!(matches!(
            service.add(shopper, sold_out, 0).await,
            Err(CartError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_increment_past_quantity_limit_is_rejected() {
        let store = MemoryStore::new();
        let service = CartService::new(&store);
        let shopper = UserId::new(2);
        let phone = product(&store, "Phone", 5).await;

        service
            .add(shopper, phone, i64::from(i32::MAX))
            .await
            .unwrap();
        match service.add(shopper, phone, 1).await {
            Err(CartError::Validation(message)) => assert_eq!(message, "Quantity is too large"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            service.add(shopper, phone, i64::from(i32::MAX) + 1).await,
            Err(CartError::Validation(_))
        ));

        let lines = service.lines(shopper).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity.get(), i32::MAX);
    }

    #[tokio::test]
    async fn test_update_ignores_stock_and_requires_entry() {
        let store = MemoryStore::new();
        let service = CartService::new(&store);
        let shopper = UserId::new(2);
        let phone = product(&store, "Phone", 1).await;

        assert!(matches!(
            service.update(shopper, phone, 3).await,
            Err(CartError::NotInCart)
        ));

        service.add(shopper, phone, 1).await.unwrap();
        service.update(shopper, phone, 50).await.unwrap();
        assert_eq!(service.lines(shopper).await.unwrap()[0].quantity.get(), 50);
    }

    #[tokio::test]
    async fn test_remove_is_scoped_to_user() {
        let store = MemoryStore::new();
        let service = CartService::new(&store);
        let phone = product(&store, "Phone", 5).await;
        service.add(UserId::new(2), phone, 1).await.unwrap();

        assert!(matches!(
            service.remove(UserId::new(3), phone).await,
            Err(CartError::NotInCart)
        ));
        service.remove(UserId::new(2), phone).await.unwrap();
        assert!(service.lines(UserId::new(2)).await.unwrap().is_empty());
    }
}
