//! Authentication error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;
use crate::services::notifier::NotifyError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] emporium_core::EmailError),

    /// Display name is blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Password does not meet the strength rules.
    #[error("{0}")]
    WeakPassword(&'static str),

    /// Email is already registered.
    #[error("Email already registered.")]
    EmailTaken,

    /// Sign-in with an email nobody registered.
    #[error("Invalid email")]
    UnknownEmail,

    /// Sign-in with the wrong password.
    #[error("Invalid password")]
    WrongPassword,

    /// Password reset requested for an unknown email.
    #[error("No user with this email found.")]
    NoSuchUser,

    /// Reset token unknown or already used.
    #[error("Invalid or expired token.")]
    InvalidResetToken,

    /// Reset token past its expiry.
    #[error("Token has expired.")]
    ResetTokenExpired,

    /// Bearer token missing, malformed, expired, or for a deleted user.
    #[error("Could not validate credentials")]
    InvalidCredentials,

    /// Reset email could not be delivered.
    #[error("failed to send reset email: {0}")]
    Notify(#[from] NotifyError),

    /// Token signing failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
