use async_trait::async_trait;

use emporium_core::{CartItemId, ProductId, Quantity, UserId};

use super::{PgStore, ProductRow};
use crate::db::{CartRepository, RepositoryError};
use crate::models::{CartAddOutcome, CartLine};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    cart_item_id: CartItemId,
    quantity: Quantity,
    #[sqlx(flatten)]
    product: ProductRow,
}

/// SQLSTATE for `numeric_value_out_of_range`.
const OUT_OF_RANGE: &str = "22003";

fn add_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
        if db_err.code().as_deref() == Some(OUT_OF_RANGE) {
            return RepositoryError::Conflict("cart quantity too large".to_owned());
        }
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl CartRepository for PgStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartAddOutcome, RepositoryError> {
        // xmax is zero only for a freshly inserted row.
        let (total, inserted): (Quantity, bool) = sqlx::query_as(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING quantity, (xmax = 0) AS inserted
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(add_error)?;

        Ok(if inserted {
            CartAddOutcome::Added
        } else {
            CartAddOutcome::Incremented(total)
        })
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT c.id AS cart_item_id, c.quantity,
                   p.id, p.name, p.description, p.price, p.stock, p.category,
                   p.image_url, p.owner_id, p.created_at, p.updated_at
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                id: r.cart_item_id,
                product: r.product.into(),
                quantity: r.quantity,
            })
            .collect())
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
