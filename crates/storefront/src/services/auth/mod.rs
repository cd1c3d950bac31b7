//! Authentication service.
//!
//! Signup, password sign-in with bearer tokens, and password reset through
//! single-use tokens delivered by a [`ResetNotifier`].

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenIssuer, TokenKind, TokenPair};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use emporium_core::{Email, Role};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, User};
use crate::services::notifier::ResetNotifier;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that count towards the special-character rule.
const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Unvalidated signup request.
#[derive(Clone)]
pub struct Signup<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
}

/// Authentication service.
pub struct AuthService<'a, R: UserRepository + ?Sized> {
    users: &'a R,
    tokens: &'a TokenIssuer,
    notifier: &'a dyn ResetNotifier,
    reset_ttl: Duration,
}

impl<'a, R: UserRepository + ?Sized> AuthService<'a, R> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        users: &'a R,
        tokens: &'a TokenIssuer,
        notifier: &'a dyn ResetNotifier,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            notifier,
            reset_ttl,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmptyName`, `InvalidEmail` or `WeakPassword` for
    /// bad input and `AuthError::EmailTaken` if the email is registered.
    #[instrument(skip(self, signup), fields(email = %signup.email, role = %signup.role))]
    pub async fn signup(&self, signup: Signup<'_>) -> Result<User, AuthError> {
        let name = signup.name.trim();
        if name.is_empty() {
            return Err(AuthError::EmptyName);
        }
        let email = Email::parse(signup.email)?;
        validate_password(signup.password)?;
        let password_hash = hash_password(signup.password)?;

        let user = self
            .users
            .create_user(&NewUser {
                name: name.to_owned(),
                email,
                password_hash,
                role: signup.role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Check credentials and issue an access/refresh token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownEmail` when no account has this email and
    /// `AuthError::WrongPassword` when the password does not match.
    #[instrument(skip(self, password))]
    pub async fn signin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        let Ok(email) = Email::parse(email) else {
            warn!("Sign-in rejected: malformed email");
            return Err(AuthError::UnknownEmail);
        };

        let Some((user, password_hash)) = self.users.get_password_hash(&email).await? else {
            warn!("Sign-in rejected: unknown email");
            return Err(AuthError::UnknownEmail);
        };

        if verify_password(password, &password_hash).is_err() {
            warn!(user_id = %user.id, "Sign-in rejected: wrong password");
            return Err(AuthError::WrongPassword);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        info!(user_id = %user.id, "User signed in");
        Ok((user, tokens))
    }

    /// Create a reset token and hand it to the notifier. Returns the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSuchUser` for an unknown email and
    /// `AuthError::Notify` if delivery fails.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .users
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::NoSuchUser)?;

        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.reset_ttl;
        self.users
            .create_reset_token(user.id, &token, expires_at)
            .await?;

        self.notifier
            .send_reset(&user.email, &token, self.reset_ttl.num_minutes())
            .await?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(token)
    }

    /// Replace the password of the token's owner and burn the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` for an unknown or used token,
    /// `AuthError::ResetTokenExpired` past expiry, and `WeakPassword`.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let reset = self
            .users
            .find_unused_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        if reset.is_expired_at(Utc::now()) {
            warn!(user_id = %reset.user_id, "Password reset rejected: token expired");
            return Err(AuthError::ResetTokenExpired);
        }

        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        self.users
            .consume_reset_token(reset.id, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::InvalidResetToken,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %reset.user_id, "Password reset");
        Ok(())
    }

    /// Resolve a bearer token to the user it was issued for.
    ///
    /// Only access tokens are accepted, and the user must still exist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` otherwise.
    pub async fn authenticate(&self, bearer: &str) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .verify(bearer, Utc::now())
            .map_err(|_| AuthError::InvalidCredentials)?;
        if claims.typ != TokenKind::Access {
            return Err(AuthError::InvalidCredentials);
        }

        self.users
            .get_user(claims.sub)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` naming the first rule that fails.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters long.",
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(AuthError::WeakPassword(
            "Password must include at least one uppercase letter.",
        ));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(AuthError::WeakPassword(
            "Password must include at least one lowercase letter.",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "Password must include at least one digit.",
        ));
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(AuthError::WeakPassword(
            "Password must include at least one special character.",
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::WrongPassword)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::WrongPassword)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::*;
    use crate::config::AuthConfig;
    use crate::db::MemoryStore;
    use crate::services::notifier::NotifyError;

    const PASSWORD: &str = "Str0ng!Pass";

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ResetNotifier for RecordingNotifier {
        async fn send_reset(
            &self,
            to: &Email,
            token: &str,
            _valid_minutes: i64,
        ) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), token.to_string()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl ResetNotifier for FailingNotifier {
        async fn send_reset(&self, to: &Email, _: &str, _: i64) -> Result<(), NotifyError> {
            Err(NotifyError::InvalidAddress(to.to_string()))
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::with_secret(SecretString::from(
            "k8Jd2mQp9xZr4vLt7nWb3yHc6sFg1aEu",
        )))
    }

    fn signup<'a>(email: &'a str, password: &'a str) -> Signup<'a> {
        Signup {
            name: "Ada",
            email,
            password,
            role: Role::User,
        }
    }

    #[test]
    fn test_password_rules_in_order() {
        let cases = [
            ("Sh0rt!", "Password must be at least 8 characters long."),
            ("lower0nly!", "Password must include at least one uppercase letter."),
            ("UPPER0NLY!", "Password must include at least one lowercase letter."),
            ("NoDigits!!", "Password must include at least one digit."),
            ("NoSpecial1", "Password must include at least one special character."),
        ];
        for (password, expected) in cases {
            match validate_password(password) {
                Err(AuthError::WeakPassword(msg)) => assert_eq!(msg, expected, "{password}"),
                other => panic!("{password}: unexpected {other:?}"),
            }
        }
        assert!(validate_password(PASSWORD).is_ok());
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password(PASSWORD).unwrap();
        assert!(verify_password(PASSWORD, &hash).is_ok());
        assert!(verify_password("Wrong!Pass1", &hash).is_err());
    }

    #[tokio::test]
    async fn test_signup_then_duplicate_conflicts() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let notifier = RecordingNotifier::default();
        let service = AuthService::new(&store, &tokens, &notifier, Duration::minutes(5));

        let user = service
            .signup(signup("Ada@Example.com", PASSWORD))
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");
        assert_eq!(user.role, Role::User);

        let err = service
            .signup(signup("ada@example.com", PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_signup_rejects_blank_name() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let notifier = RecordingNotifier::default();
        let service = AuthService::new(&store, &tokens, &notifier, Duration::minutes(5));

        let mut request = signup("ada@example.com", PASSWORD);
        request.name = "   ";
        assert!(matches!(
            service.signup(request).await,
            Err(AuthError::EmptyName)
        ));
    }

    #[tokio::test]
    async fn test_signin_distinguishes_email_and_password() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let notifier = RecordingNotifier::default();
        let service = AuthService::new(&store, &tokens, &notifier, Duration::minutes(5));
        service
            .signup(signup("ada@example.com", PASSWORD))
            .await
            .unwrap();

        assert!(matches!(
            service.signin("bob@example.com", PASSWORD).await,
            Err(AuthError::UnknownEmail)
        ));
        assert!(matches!(
            service.signin("ada@example.com", "Wrong!Pass1").await,
            Err(AuthError::WrongPassword)
        ));

        let (user, pair) = service.signin("ada@example.com", PASSWORD).await.unwrap();
        let resolved = service.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(matches!(
            service.authenticate(&pair.refresh_token).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_reset_flow_is_single_use() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let notifier = RecordingNotifier::default();
        let service = AuthService::new(&store, &tokens, &notifier, Duration::minutes(5));
        service
            .signup(signup("ada@example.com", PASSWORD))
            .await
            .unwrap();

        let token = service.forgot_password("ada@example.com").await.unwrap();
        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            &[("ada@example.com".to_string(), token.clone())]
        );

        service.reset_password(&token, "N3w!Password").await.unwrap();
        assert!(service.signin("ada@example.com", "N3w!Password").await.is_ok());
        assert!(matches!(
            service.signin("ada@example.com", PASSWORD).await,
            Err(AuthError::WrongPassword)
        ));

        assert!(matches!(
            service.reset_password(&token, "An0ther!Pass").await,
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let notifier = RecordingNotifier::default();
        let service = AuthService::new(&store, &tokens, &notifier, Duration::minutes(-1));
        service
            .signup(signup("ada@example.com", PASSWORD))
            .await
            .unwrap();

        let token = service.forgot_password("ada@example.com").await.unwrap();
        assert!(matches!(
            service.reset_password(&token, "N3w!Password").await,
            Err(AuthError::ResetTokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_errors() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let failing = FailingNotifier;
        let service = AuthService::new(&store, &tokens, &failing, Duration::minutes(5));

        assert!(matches!(
            service.forgot_password("nobody@example.com").await,
            Err(AuthError::NoSuchUser)
        ));

        service
            .signup(signup("ada@example.com", PASSWORD))
            .await
            .unwrap();
        assert!(matches!(
            service.forgot_password("ada@example.com").await,
            Err(AuthError::Notify(_))
        ));
    }
}
