//! User domain types.

use chrono::{DateTime, Utc};

use emporium_core::{Email, ResetTokenId, Role, UserId};

/// A registered account (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized email address, unique across users.
    pub email: Email,
    /// Admin or shopper.
    pub role: Role,
    /// When the user signed up.
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    /// Argon2 PHC string, never the plain password.
    pub password_hash: String,
    pub role: Role,
}

/// A single-use password reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub id: ResetTokenId,
    pub user_id: UserId,
    /// Opaque UUIDv4 string handed to the user.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordResetToken {
    /// Whether the token has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
