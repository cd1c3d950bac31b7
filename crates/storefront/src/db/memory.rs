//! In-process store.
//!
//! All tables live behind one `tokio` mutex. A checkout holds the lock for
//! its whole lifetime and works on a private copy of the tables, which
//! replaces the shared state only on commit. Unique constraints mirror the
//! `PostgreSQL` schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use emporium_core::{
    CartItemId, Email, OrderId, OrderItemId, OrderStatus, ProductId, Quantity, ResetTokenId,
    UserId,
};

use super::{
    CartRepository, CatalogRepository, CheckoutTransaction, OrderRepository, RepositoryError,
    Store, UserRepository,
};
use crate::models::product::matches_keyword;
use crate::models::{
    CartAddOutcome, CartEntry, CartLine, NewOrderItem, NewProduct, NewUser, Order, OrderItem,
    OrderWithItems, PasswordResetToken, Product, ProductChanges, ProductFilter, User,
};

/// A user row including the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

/// Last id handed out per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Sequences {
    user: i32,
    reset_token: i32,
    product: i32,
    cart_item: i32,
    order: i32,
    order_item: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// Full contents of a [`MemoryStore`].
///
/// Two snapshots compare equal only if every row and id sequence matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTables {
    pub users: BTreeMap<UserId, StoredUser>,
    pub reset_tokens: BTreeMap<ResetTokenId, PasswordResetToken>,
    pub products: BTreeMap<ProductId, Product>,
    pub cart_items: BTreeMap<CartItemId, CartEntry>,
    pub orders: BTreeMap<OrderId, Order>,
    pub order_items: BTreeMap<OrderItemId, OrderItem>,
    sequences: Sequences,
}

impl MemoryTables {
    fn product_name_taken(&self, name: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn cart_entry_mut(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Option<&mut CartEntry> {
        self.cart_items
            .values_mut()
            .find(|e| e.user_id == user_id && e.product_id == product_id)
    }
}

/// Store backed by in-process tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state, for comparing before and after an operation.
    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.user.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let id = UserId::new(next_id(&mut tables.sequences.user));
        let user = User {
            id,
            name: new.name.clone(),
            email: new.email.clone(),
            role: new.role,
            created_at: Utc::now(),
        };
        tables.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password_hash: new.password_hash.clone(),
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|u| u.user.clone()))
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| &u.user.email == email)
            .map(|u| u.user.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| &u.user.email == email)
            .map(|u| (u.user.clone(), u.password_hash.clone())))
    }

    async fn create_reset_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.reset_tokens.values().any(|t| t.token == token) {
            return Err(RepositoryError::Conflict("reset token already exists".to_owned()));
        }

        let id = ResetTokenId::new(next_id(&mut tables.sequences.reset_token));
        let row = PasswordResetToken {
            id,
            user_id,
            token: token.to_owned(),
            expires_at,
            used: false,
        };
        tables.reset_tokens.insert(id, row.clone());
        Ok(row)
    }

    async fn find_unused_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reset_tokens
            .values()
            .find(|t| t.token == token && !t.used)
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        token_id: ResetTokenId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        let token = tables
            .reset_tokens
            .get_mut(&token_id)
            .filter(|t| !t.used)
            .ok_or(RepositoryError::NotFound)?;
        let user = tables
            .users
            .get_mut(&token.user_id)
            .ok_or(RepositoryError::NotFound)?;

        token.used = true;
        user.password_hash = password_hash.to_owned();
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn create_product(
        &self,
        owner: UserId,
        new: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.product_name_taken(&new.name, None) {
            return Err(RepositoryError::Conflict("product name already exists".to_owned()));
        }

        let now = Utc::now();
        let id = ProductId::new(next_id(&mut tables.sequences.product));
        let product = Product {
            id,
            name: new.name.clone(),
            description: new.description.clone(),
            price: new.price,
            stock: new.stock,
            category: new.category.clone(),
            image_url: new.image_url.clone(),
            owner_id: owner,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| filter.sort.compare(a, b));

        Ok(page(products, filter.offset, filter.limit))
    }

    async fn list_products_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock().await;
        let products = tables.products.values().cloned().collect();
        Ok(page(products, offset, limit))
    }

    async fn search_products(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .filter(|p| matches_keyword(p, keyword))
            .cloned()
            .collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if let Some(name) = &changes.name
            && tables.product_name_taken(name, Some(id))
        {
            return Err(RepositoryError::Conflict("product name already exists".to_owned()));
        }

        let product = tables
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        changes.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.products.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }

        tables.cart_items.retain(|_, entry| entry.product_id != id);
        for item in tables.order_items.values_mut() {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        Ok(())
    }
}

fn page(products: Vec<Product>, offset: i64, limit: i64) -> Vec<Product> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    products.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartAddOutcome, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(entry) = tables.cart_entry_mut(user_id, product_id) {
            entry.quantity = entry
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| RepositoryError::Conflict("cart quantity too large".to_owned()))?;
            return Ok(CartAddOutcome::Incremented(entry.quantity));
        }

        let id = CartItemId::new(next_id(&mut tables.sequences.cart_item));
        tables.cart_items.insert(
            id,
            CartEntry {
                id,
                user_id,
                product_id,
                quantity,
            },
        );
        Ok(CartAddOutcome::Added)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let tables = self.tables.lock().await;
        tables
            .cart_items
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| {
                let product = tables.products.get(&e.product_id).cloned().ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product {}",
                        e.id, e.product_id
                    ))
                })?;
                Ok(CartLine {
                    id: e.id,
                    product,
                    quantity: e.quantity,
                })
            })
            .collect()
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .cart_entry_mut(user_id, product_id)
            .ok_or(RepositoryError::NotFound)?;
        entry.quantity = quantity;
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let id = tables
            .cart_entry_mut(user_id, product_id)
            .map(|e| e.id)
            .ok_or(RepositoryError::NotFound)?;
        tables.cart_items.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryCheckout { guard, working }))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(orders)
    }

    async fn order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let tables = self.tables.lock().await;
        let Some(order) = tables
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned()
        else {
            return Ok(None);
        };

        let items = tables
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        Ok(Some(OrderWithItems { order, items }))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Checkout over a private copy of the tables.
struct MemoryCheckout {
    guard: OwnedMutexGuard<MemoryTables>,
    working: MemoryTables,
}

#[async_trait]
impl CheckoutTransaction for MemoryCheckout {
    async fn cart_entries(&mut self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        Ok(self
            .working
            .cart_items
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn insert_order(
        &mut self,
        user_id: UserId,
        total_amount: Decimal,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let id = OrderId::new(next_id(&mut self.working.sequences.order));
        let order = Order {
            id,
            user_id,
            total_amount,
            status,
            created_at: Utc::now(),
        };
        self.working.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        if !self.working.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }

        let id = OrderItemId::new(next_id(&mut self.working.sequences.order_item));
        let row = OrderItem {
            id,
            order_id,
            product_id: Some(item.product_id),
            product_name: item.product_name.clone(),
            product_description: item.product_description.clone(),
            quantity: item.quantity,
            price_at_purchase: item.price_at_purchase,
        };
        self.working.order_items.insert(id, row.clone());
        Ok(row)
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        match self.working.products.get_mut(&product_id) {
            Some(product) if product.stock >= quantity.get() => {
                product.stock -= quantity.get();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let before = self.working.cart_items.len();
        self.working.cart_items.retain(|_, e| e.user_id != user_id);
        Ok((before - self.working.cart_items.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
