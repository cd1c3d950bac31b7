//! Business logic for the storefront.
//!
//! # Services
//!
//! - `auth` - Signup, sign-in, bearer tokens, password reset
//! - `catalog` - Product management and listings
//! - `cart` - Per-user carts
//! - `checkout` - Cart to order conversion
//! - `orders` - Order history
//! - `notifier` - Reset email delivery
//!
//! Services borrow a repository for the duration of a request and are
//! generic over it, so tests run them against `MemoryStore`.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod notifier;
pub mod orders;
