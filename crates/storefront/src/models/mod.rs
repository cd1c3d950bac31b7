//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types and
//! from the JSON shapes the routes return.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{CartAddOutcome, CartEntry, CartLine};
pub use order::{NewOrderItem, Order, OrderItem, OrderWithItems};
pub use product::{NewProduct, Product, ProductChanges, ProductFilter, ProductSort};
pub use user::{NewUser, PasswordResetToken, User};
