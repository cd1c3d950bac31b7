use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use emporium_core::{
    CartItemId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity, UserId,
};

use super::{PRODUCT_COLUMNS, PgStore, ProductRow};
use crate::db::{CheckoutTransaction, OrderRepository, RepositoryError};
use crate::models::{CartEntry, NewOrderItem, Order, OrderItem, OrderWithItems, Product};

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, created_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, product_description, \
                                  quantity, price_at_purchase";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            total_amount: r.total_amount,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    product_description: Option<String>,
    quantity: Quantity,
    price_at_purchase: Price,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            product_name: r.product_name,
            product_description: r.product_description,
            quantity: r.quantity,
            price_at_purchase: r.price_at_purchase,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartEntryRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: Quantity,
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckout { tx }))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let order: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OrderWithItems {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
        }))
    }
}

/// Checkout inside one database transaction. Rows read here are locked
/// until commit or rollback.
struct PgCheckout {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTransaction for PgCheckout {
    async fn cart_entries(&mut self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let rows: Vec<CartEntryRow> = sqlx::query_as(
            r"
            SELECT id, user_id, product_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartEntry {
                id: r.id,
                user_id: r.user_id,
                product_id: r.product_id,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_order(
        &mut self,
        user_id: UserId,
        total_amount: Decimal,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO orders (user_id, total_amount, status)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(total_amount)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        let row: OrderItemRow = sqlx::query_as(&format!(
            r"
            INSERT INTO order_items
                (order_id, product_id, product_name, product_description, quantity, price_at_purchase)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_ITEM_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_description)
        .bind(item.quantity)
        .bind(item.price_at_purchase)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                .bind(quantity)
                .bind(product_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
