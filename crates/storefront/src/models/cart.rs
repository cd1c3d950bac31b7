//! Cart domain types.

use emporium_core::{CartItemId, ProductId, Quantity, UserId};

use super::Product;

/// One (user, product) entry in a cart. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// A cart entry joined with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: CartItemId,
    pub product: Product,
    pub quantity: Quantity,
}

/// What adding to the cart did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAddOutcome {
    /// A new entry was created.
    Added,
    /// An existing entry's quantity was increased to the given total.
    Incremented(Quantity),
}
