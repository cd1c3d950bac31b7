//! Turning a cart into an order.
//!
//! The whole checkout runs in one [`CheckoutTransaction`]. Every cart line is
//! read and validated before anything is written, so a failing line never
//! leaves a partial order or a partial stock deduction behind. Any early
//! return drops the transaction, which rolls it back.
//!
//! Products are locked in ascending id order, so two checkouts touching the
//! same products cannot deadlock each other.
//!
//! [`CheckoutTransaction`]: crate::db::CheckoutTransaction

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};

use emporium_core::{OrderStatus, ProductId, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{NewOrderItem, Order, OrderWithItems};

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty.")]
    EmptyCart,

    #[error("Product with ID {0} not found.")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product '{name}'. Available: {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i32,
    },

    #[error("Order total cannot exceed {}.", Order::MAX_TOTAL)]
    TotalTooLarge,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout service.
pub struct CheckoutService<'a, R: OrderRepository + ?Sized> {
    orders: &'a R,
}

impl<'a, R: OrderRepository + ?Sized> CheckoutService<'a, R> {
    #[must_use]
    pub const fn new(orders: &'a R) -> Self {
        Self { orders }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// On success the order is paid, stock is reduced by the purchased
    /// quantities and the cart is empty.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `ProductNotFound`,
    /// `InsufficientStock` or `TotalTooLarge`; in every case nothing is
    /// written.
    #[instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<OrderWithItems, CheckoutError> {
        let mut tx = self.orders.begin_checkout().await?;

        let entries = tx.cart_entries(user_id).await?;
        if entries.is_empty() {
            warn!("Checkout rejected: empty cart");
            return Err(CheckoutError::EmptyCart);
        }

        let mut products = BTreeMap::new();
        for entry in &entries {
            products.insert(entry.product_id, None);
        }
        for (id, slot) in &mut products {
            *slot = tx.product(*id).await?;
        }

        let mut lines = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(product) = products.remove(&entry.product_id).flatten() else {
                warn!(product_id = %entry.product_id, "Checkout rejected: product missing");
                return Err(CheckoutError::ProductNotFound(entry.product_id));
            };
            if entry.quantity.get() > product.stock {
                warn!(
                    product_id = %product.id,
                    requested = entry.quantity.get(),
                    available = product.stock,
                    "Checkout rejected: insufficient stock"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    name: product.name,
                    available: product.stock,
                });
            }
            lines.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name,
                product_description: product.description,
                quantity: entry.quantity,
                price_at_purchase: product.price,
            });
        }

        let total_amount = order_total(&lines).ok_or_else(|| {
            warn!("Checkout rejected: order total too large");
            CheckoutError::TotalTooLarge
        })?;
        let order = tx
            .insert_order(user_id, total_amount, OrderStatus::Paid)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            items.push(tx.insert_order_item(order.id, line).await?);
        }

        for line in &lines {
            if !tx.decrement_stock(line.product_id, line.quantity).await? {
                let available = tx.product(line.product_id).await?.map_or(0, |p| p.stock);
                warn!(
                    product_id = %line.product_id,
                    available,
                    "Checkout rejected: stock changed during checkout"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                    name: line.product_name.clone(),
                    available,
                });
            }
        }

        tx.clear_cart(user_id).await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %total_amount, lines = items.len(), "Order placed");
        Ok(OrderWithItems { order, items })
    }
}

/// Exact sum of line totals, `None` if it does not fit an order.
fn order_total(lines: &[NewOrderItem]) -> Option<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.line_total()?))
        .filter(|total| *total <= Order::MAX_TOTAL)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use emporium_core::{OrderId, Price, Quantity};

    use super::*;
    use crate::db::{CartRepository, CatalogRepository, CheckoutTransaction, MemoryStore};
    use crate::models::{CartEntry, NewProduct, OrderItem, Product, ProductChanges};

    const SHOPPER: UserId = UserId::new(10);

    /// How a [`Faulty`] store misbehaves inside checkout.
    #[derive(Clone, Copy)]
    enum Fault {
        /// The product reads as deleted.
        Vanished(ProductId),
        /// The conditional stock update finds too little stock.
        StockRace(ProductId),
    }

    /// Memory store whose checkout transactions inject one fault.
    struct Faulty {
        store: MemoryStore,
        fault: Fault,
    }

    struct FaultyCheckout {
        inner: Box<dyn CheckoutTransaction>,
        fault: Fault,
    }

    #[async_trait]
    impl OrderRepository for Faulty {
        async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
            Ok(Box::new(FaultyCheckout {
                inner: self.store.begin_checkout().await?,
                fault: self.fault,
            }))
        }

        async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
            self.store.orders_for_user(user_id).await
        }

        async fn order_for_user(
            &self,
            order_id: OrderId,
            user_id: UserId,
        ) -> Result<Option<OrderWithItems>, RepositoryError> {
            self.store.order_for_user(order_id, user_id).await
        }
    }

    #[async_trait]
    impl CheckoutTransaction for FaultyCheckout {
        async fn cart_entries(
            &mut self,
            user_id: UserId,
        ) -> Result<Vec<CartEntry>, RepositoryError> {
            self.inner.cart_entries(user_id).await
        }

        async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            match self.fault {
                Fault::Vanished(gone) if gone == id => Ok(None),
                _ => self.inner.product(id).await,
            }
        }

        async fn insert_order(
            &mut self,
            user_id: UserId,
            total_amount: Decimal,
            status: OrderStatus,
        ) -> Result<Order, RepositoryError> {
            self.inner.insert_order(user_id, total_amount, status).await
        }

        async fn insert_order_item(
            &mut self,
            order_id: OrderId,
            item: &NewOrderItem,
        ) -> Result<OrderItem, RepositoryError> {
            self.inner.insert_order_item(order_id, item).await
        }

        async fn decrement_stock(
            &mut self,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<bool, RepositoryError> {
            match self.fault {
                Fault::StockRace(raced) if raced == product_id => Ok(false),
                _ => self.inner.decrement_stock(product_id, quantity).await,
            }
        }

        async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
            self.inner.clear_cart(user_id).await
        }

        async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
            self.inner.commit().await
        }
    }

    async fn product(store: &MemoryStore, name: &str, price: &str, stock: i32) -> ProductId {
        store
            .create_product(
                UserId::new(1),
                &NewProduct {
                    name: name.to_string(),
                    description: Some(format!("{name} description")),
                    price: Price::parse(price).unwrap(),
                    stock,
                    category: "Mobile".to_string(),
                    image_url: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn add(store: &MemoryStore, product: ProductId, quantity: i32) {
        store
            .add_to_cart(SHOPPER, product, Quantity::new(quantity).unwrap())
            .await
            .unwrap();
    }

    async fn stock(store: &MemoryStore, id: ProductId) -> i32 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let store = MemoryStore::new();
        let before = store.snapshot().await;

        let err = CheckoutService::new(&store)
            .checkout(SHOPPER)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(err.to_string(), "Your cart is empty.");
        assert_eq!(store.snapshot().await, before);
        assert!(store.orders_for_user(SHOPPER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_checkout() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        let b = product(&store, "B", "20.00", 1).await;
        let bystander = product(&store, "C", "5.00", 7).await;
        add(&store, a, 2).await;
        add(&store, b, 1).await;

        let placed = CheckoutService::new(&store).checkout(SHOPPER).await.unwrap();

        assert_eq!(placed.order.total_amount, Decimal::new(4000, 2));
        assert_eq!(placed.order.status, OrderStatus::Paid);
        assert_eq!(placed.order.user_id, SHOPPER);
        assert_eq!(placed.items.len(), 2);
        assert_eq!(stock(&store, a).await, 3);
        assert_eq!(stock(&store, b).await, 0);
        assert_eq!(stock(&store, bystander).await, 7);
        assert!(store.cart_lines(SHOPPER).await.unwrap().is_empty());
        assert_eq!(store.orders_for_user(SHOPPER).await.unwrap().len(), 1);

        let line_a = &placed.items[0];
        assert_eq!(line_a.product_id, Some(a));
        assert_eq!(line_a.product_name, "A");
        assert_eq!(line_a.quantity.get(), 2);
        assert_eq!(line_a.price_at_purchase, Price::parse("10.00").unwrap());
    }

    #[tokio::test]
    async fn test_total_is_exact() {
        let store = MemoryStore::new();
        let p = product(&store, "Cheap", "0.10", 10).await;
        let q = product(&store, "Cheaper", "0.20", 10).await;
        add(&store, p, 3).await;
        add(&store, q, 1).await;

        let placed = CheckoutService::new(&store).checkout(SHOPPER).await.unwrap();
        assert_eq!(placed.order.total_amount, Decimal::new(50, 2));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_store_untouched() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        let b = product(&store, "B", "20.00", 1).await;
        add(&store, a, 2).await;
        add(&store, b, 1).await;
        store
            .update_product(
                b,
                &ProductChanges {
                    stock: Some(0),
                    ..ProductChanges::default()
                },
            )
            .await
            .unwrap();
        let before = store.snapshot().await;

        let err = CheckoutService::new(&store)
            .checkout(SHOPPER)
            .await
            .unwrap_err();

        match &err {
            CheckoutError::InsufficientStock {
                product_id,
                name,
                available,
            } => {
                assert_eq!(*product_id, b);
                assert_eq!(name, "B");
                assert_eq!(*available, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 'B'. Available: 0"
        );
        assert_eq!(store.snapshot().await, before);
        assert_eq!(stock(&store, a).await, 5);
    }

    #[tokio::test]
    async fn test_snapshot_survives_product_edit_and_delete() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        add(&store, a, 1).await;
        let placed = CheckoutService::new(&store).checkout(SHOPPER).await.unwrap();

        store
            .update_product(
                a,
                &ProductChanges {
                    name: Some("Renamed".to_string()),
                    description: Some("Changed".to_string()),
                    price: Some(Price::parse("99.00").unwrap()),
                    ..ProductChanges::default()
                },
            )
            .await
            .unwrap();
        let after_edit = store
            .order_for_user(placed.order.id, SHOPPER)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_edit.items, placed.items);

        store.delete_product(a).await.unwrap();
        let after_delete = store
            .order_for_user(placed.order.id, SHOPPER)
            .await
            .unwrap()
            .unwrap();
        let item = &after_delete.items[0];
        assert_eq!(item.product_id, None);
        assert_eq!(item.product_name, "A");
        assert_eq!(item.product_description.as_deref(), Some("A description"));
        assert_eq!(item.price_at_purchase, Price::parse("10.00").unwrap());
    }

    #[tokio::test]
    async fn test_missing_product_aborts_checkout() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        let b = product(&store, "B", "20.00", 3).await;
        add(&store, a, 2).await;
        add(&store, b, 1).await;
        let faulty = Faulty {
            store,
            fault: Fault::Vanished(b),
        };
        let before = faulty.store.snapshot().await;

        let err = CheckoutService::new(&faulty)
            .checkout(SHOPPER)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::ProductNotFound(id) if id == b));
        assert_eq!(err.to_string(), format!("Product with ID {b} not found."));
        assert_eq!(faulty.store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_lost_stock_race_rolls_back_everything() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        let b = product(&store, "B", "20.00", 3).await;
        add(&store, a, 2).await;
        add(&store, b, 1).await;
        let faulty = Faulty {
            store,
            fault: Fault::StockRace(b),
        };
        let before = faulty.store.snapshot().await;

        let err = CheckoutService::new(&faulty)
            .checkout(SHOPPER)
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product_id,
                name,
                available,
            } => {
                assert_eq!(product_id, b);
                assert_eq!(name, "B");
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The order, its items and A's decrement were all written before the
        // failing update; none of them survive.
        assert_eq!(faulty.store.snapshot().await, before);
        assert!(faulty.store.orders_for_user(SHOPPER).await.unwrap().is_empty());
        assert_eq!(stock(&faulty.store, a).await, 5);
    }

    #[tokio::test]
    async fn test_oversized_total_is_rejected() {
        let store = MemoryStore::new();
        let bar = product(&store, "Gold bar", "9999999999.99", 1_000).await;
        add(&store, bar, 1_000).await;
        let before = store.snapshot().await;

        let err = CheckoutService::new(&store)
            .checkout(SHOPPER)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::TotalTooLarge));
        assert_eq!(
            err.to_string(),
            "Order total cannot exceed 999999999999.99."
        );
        assert_eq!(store.snapshot().await, before);
    }

    #[test]
    fn test_order_total_limits() {
        let line = |price: &str, quantity: i32| NewOrderItem {
            product_id: ProductId::new(1),
            product_name: "Line".to_string(),
            product_description: None,
            quantity: Quantity::new(quantity).unwrap(),
            price_at_purchase: Price::parse(price).unwrap(),
        };

        assert_eq!(
            order_total(&[line("9999999999.99", 99), line("0.99", 1)]),
            Some(Decimal::new(99_000_000_000_000, 2))
        );
        assert_eq!(order_total(&[line("9999999999.99", 101)]), None);
        assert_eq!(
            order_total(&[line("9999999999.99", i32::MAX), line("9999999999.99", i32::MAX)]),
            None
        );
    }

    #[tokio::test]
    async fn test_second_checkout_sees_empty_cart() {
        let store = MemoryStore::new();
        let a = product(&store, "A", "10.00", 5).await;
        add(&store, a, 1).await;

        let service = CheckoutService::new(&store);
        service.checkout(SHOPPER).await.unwrap();
        assert!(matches!(
            service.checkout(SHOPPER).await,
            Err(CheckoutError::EmptyCart)
        ));
    }
}
