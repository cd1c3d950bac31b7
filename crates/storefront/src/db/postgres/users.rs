use async_trait::async_trait;
use chrono::{DateTime, Utc};

use emporium_core::{Email, ResetTokenId, Role, UserId};

use super::{PgStore, unique_violation};
use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, PasswordResetToken, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            email,
            role: r.role,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    id: ResetTokenId,
    user_id: UserId,
    token: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

impl From<ResetTokenRow> for PasswordResetToken {
    fn from(r: ResetTokenRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            token: r.token,
            expires_at: r.expires_at,
            used: r.used,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(&new.name)
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "email already exists"))?;

        row.try_into()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, email, role, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, email, role, created_at FROM users WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(
            r"
            SELECT id, name, email, role, created_at, password_hash
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    async fn create_reset_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, RepositoryError> {
        let row: ResetTokenRow = sqlx::query_as(
            r"
            INSERT INTO password_reset_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, used
            ",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "reset token already exists"))?;

        Ok(row.into())
    }

    async fn find_unused_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        let row: Option<ResetTokenRow> = sqlx::query_as(
            r"
            SELECT id, user_id, token, expires_at, used
            FROM password_reset_tokens
            WHERE token = $1 AND used = FALSE
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn consume_reset_token(
        &self,
        token_id: ResetTokenId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_id: Option<UserId> = sqlx::query_scalar(
            r"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE id = $1 AND used = FALSE
            RETURNING user_id
            ",
        )
        .bind(token_id)
        .fetch_optional(&mut *tx)
        .await?;
        let user_id = user_id.ok_or(RepositoryError::NotFound)?;

        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
