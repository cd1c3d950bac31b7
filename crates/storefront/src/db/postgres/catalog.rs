use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use emporium_core::{ProductId, UserId};

use super::{PRODUCT_COLUMNS, PgStore, ProductRow, unique_violation};
use crate::db::{CatalogRepository, RepositoryError};
use crate::models::product::like_pattern;
use crate::models::{NewProduct, Product, ProductChanges, ProductFilter};

const NAME_TAKEN: &str = "product name already exists";

#[async_trait]
impl CatalogRepository for PgStore {
    async fn create_product(
        &self,
        owner: UserId,
        new: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO products (name, description, price, stock, category, image_url, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(&new.category)
        .bind(&new.image_url)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, NAME_TAKEN))?;

        Ok(row.into())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

        if let Some(category) = &filter.category {
            query
                .push(" AND category ILIKE ")
                .push_bind(like_pattern(category));
        }
        if let Some(min) = filter.min_price {
            query.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            query.push(" AND price <= ").push_bind(max);
        }
        query
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" OFFSET ")
            .push_bind(filter.offset)
            .push(" LIMIT ")
            .push_bind(filter.limit);

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_products_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_products(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE name ILIKE $1 OR description ILIKE $1
            ORDER BY id
            "
        ))
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                category = COALESCE($6, category),
                image_url = COALESCE($7, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(&changes.category)
        .bind(&changes.image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, NAME_TAKEN))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE order_items SET product_id = NULL WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
