//! Delivery of password reset tokens.
//!
//! [`SmtpNotifier`] sends a plain-text and HTML email through an SMTP relay.
//! Without SMTP settings the server falls back to [`LogNotifier`], which only
//! records that a reset was requested.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use emporium_core::Email;

use crate::config::SmtpConfig;

const RESET_SUBJECT: &str = "Password Reset Request For Your Ecommerce Account";

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Sends password reset tokens to users.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// Deliver `token` to `to`. The token stays valid for `valid_minutes`.
    async fn send_reset(
        &self,
        to: &Email,
        token: &str,
        valid_minutes: i64,
    ) -> Result<(), NotifyError>;
}

/// Notifier that sends email over SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// Create a notifier from SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host cannot be resolved into a transport.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from.clone(),
        })
    }

    fn build_message(
        &self,
        to: &Email,
        token: &str,
        valid_minutes: i64,
    ) -> Result<Message, NotifyError> {
        let (text, html) = reset_bodies(token, valid_minutes);

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(RESET_SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;
        Ok(message)
    }
}

#[async_trait]
impl ResetNotifier for SmtpNotifier {
    async fn send_reset(
        &self,
        to: &Email,
        token: &str,
        valid_minutes: i64,
    ) -> Result<(), NotifyError> {
        let message = self.build_message(to, token, valid_minutes)?;
        self.mailer.send(message).await?;

        tracing::info!(to = %to, subject = RESET_SUBJECT, "Reset email sent");
        Ok(())
    }
}

/// Notifier used when SMTP is not configured. The token is never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(
        &self,
        to: &Email,
        _token: &str,
        valid_minutes: i64,
    ) -> Result<(), NotifyError> {
        tracing::info!(to = %to, valid_minutes, "SMTP not configured, reset email not sent");
        Ok(())
    }
}

/// Plain-text and HTML bodies of the reset email.
fn reset_bodies(token: &str, valid_minutes: i64) -> (String, String) {
    let text = format!(
        "Hello,\n\n\
         We received a request to reset the password for your account.\n\n\
         Your reset token is: {token}\n\n\
         The token is valid for {valid_minutes} minutes. If you did not request \
         a password reset, you can ignore this email.\n"
    );
    let html = format!(
        "<p>Hello,</p>\
         <p>We received a request to reset the password for your account.</p>\
         <p>Your reset token is: <strong>{token}</strong></p>\
         <p>The token is valid for {valid_minutes} minutes. If you did not request \
         a password reset, you can ignore this email.</p>"
    );
    (text, html)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_bodies_carry_token_and_lifetime() {
        let (text, html) = reset_bodies("abc-123", 5);
        assert!(text.contains("abc-123"));
        assert!(text.contains("5 minutes"));
        assert!(html.contains("<strong>abc-123</strong>"));
    }

    #[tokio::test]
    async fn test_message_rejects_bad_sender() {
        let notifier = SmtpNotifier::new(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: SecretString::from("secret"),
            from: "not an address".to_string(),
        })
        .unwrap();

        let to = Email::parse("user@example.com").unwrap();
        assert!(matches!(
            notifier.build_message(&to, "t", 5),
            Err(NotifyError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_log_notifier_succeeds() {
        let to = Email::parse("user@example.com").unwrap();
        LogNotifier.send_reset(&to, "t", 5).await.unwrap();
    }
}
