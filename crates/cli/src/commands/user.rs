//! Account management commands.
//!
//! `user create` is how the first admin gets into a fresh database; the
//! HTTP sign-up endpoint works too, but this keeps admin creation off the
//! public surface.

use emporium_core::{Email, Role};
use emporium_storefront::db::{PgStore, RepositoryError, UserRepository};
use emporium_storefront::models::{NewUser, User};
use emporium_storefront::services::auth::{AuthError, hash_password, validate_password};

use super::{CliError, connect};

/// Create a user in the storefront database.
///
/// # Errors
///
/// Returns an error for an invalid role, email, name or password, a taken
/// email, or a database failure.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<User, CliError> {
    let role: Role = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;

    let store = PgStore::new(connect().await?);
    let user = create_user(&store, email, name, role, password).await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user)
}

async fn create_user<R: UserRepository + ?Sized>(
    users: &R,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
) -> Result<User, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::EmptyName);
    }
    let email = Email::parse(email)?;
    validate_password(password)?;

    users
        .create_user(&NewUser {
            name: name.to_owned(),
            email,
            password_hash: hash_password(password)?,
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Repository(other),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_storefront::db::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_create_admin() {
        let store = MemoryStore::new();
        let user = create_user(
            &store,
            " Root@Example.com",
            "Root",
            Role::Admin,
            "Str0ng!pass",
        )
        .await
        .unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email.as_str(), "root@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_and_weak_password_rejected() {
        let store = MemoryStore::new();
        create_user(&store, "a@example.com", "A", Role::User, "Str0ng!pass")
            .await
            .unwrap();

        assert!(matches!(
            create_user(&store, "a@example.com", "A", Role::User, "Str0ng!pass").await,
            Err(AuthError::EmailTaken)
        ));
        assert!(matches!(
            create_user(&store, "b@example.com", "B", Role::User, "weak").await,
            Err(AuthError::WeakPassword(_))
        ));
    }
}
