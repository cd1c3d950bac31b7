//! Order history queries.
//!
//! Lookups are scoped to the requesting user, so another user's order is
//! indistinguishable from a missing one.

use thiserror::Error;

use emporium_core::{OrderId, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, OrderWithItems};

/// Errors from order queries.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found.")]
    NotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order history service.
pub struct OrderService<'a, R: OrderRepository + ?Sized> {
    orders: &'a R,
}

impl<'a, R: OrderRepository + ?Sized> OrderService<'a, R> {
    #[must_use]
    pub const fn new(orders: &'a R) -> Self {
        Self { orders }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.orders_for_user(user_id).await?)
    }

    /// One of the user's orders with its items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is missing or belongs to
    /// someone else.
    pub async fn get(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderWithItems, OrderError> {
        self.orders
            .order_for_user(order_id, user_id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::{Price, Quantity};

    use super::*;
    use crate::db::{CartRepository, CatalogRepository, MemoryStore};
    use crate::models::NewProduct;
    use crate::services::checkout::CheckoutService;

    async fn place_order(store: &MemoryStore, user_id: UserId, product_name: &str) -> OrderId {
        let product = store
            .create_product(
                UserId::new(1),
                &NewProduct {
                    name: product_name.to_string(),
                    description: None,
                    price: Price::parse("12.50").unwrap(),
                    stock: 10,
                    category: "Laptop".to_string(),
                    image_url: None,
                },
            )
            .await
            .unwrap();
        store
            .add_to_cart(user_id, product.id, Quantity::new(3).unwrap())
            .await
            .unwrap();
        CheckoutService::new(store)
            .checkout(user_id)
            .await
            .unwrap()
            .order
            .id
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let store = MemoryStore::new();
        let owner = UserId::new(2);
        let order_id = place_order(&store, owner, "Laptop").await;

        let service = OrderService::new(&store);
        assert!(matches!(
            service.get(UserId::new(3), order_id).await,
            Err(OrderError::NotFound)
        ));
        assert!(matches!(
            service.get(owner, OrderId::new(999)).await,
            Err(OrderError::NotFound)
        ));

        let detail = service.get(owner, order_id).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].subtotal().to_string(), "37.50");
    }

    #[tokio::test]
    async fn test_list_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let owner = UserId::new(2);
        let first = place_order(&store, owner, "First").await;
        let second = place_order(&store, owner, "Second").await;
        place_order(&store, UserId::new(3), "Other").await;

        let orders = OrderService::new(&store).list(owner).await.unwrap();
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, [second, first]);
    }
}
