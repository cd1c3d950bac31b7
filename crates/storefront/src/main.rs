//! Emporium storefront - JSON API for accounts, catalog, cart and checkout.
//!
//! This binary serves the API on port 8000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` through sqlx when a database URL is configured, otherwise
//!   an in-memory store that is lost on restart
//! - Bearer JWT authentication, Argon2id password hashes
//! - SMTP (lettre) for password reset emails when configured
//!
//! Migrations are NOT run on startup. Apply them explicitly with
//! `emporium migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use emporium_storefront::config::{LogFormat, StorefrontConfig};
use emporium_storefront::db::{self, MemoryStore, PgStore, Store};
use emporium_storefront::services::notifier::{LogNotifier, ResetNotifier, SmtpNotifier};
use emporium_storefront::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "emporium_storefront=info,tower_http=debug".into());

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

async fn open_store(config: &StorefrontConfig) -> Arc<dyn Store> {
    if let Some(url) = &config.database_url {
        let pool = db::create_pool(url)
            .await
            .expect("Failed to create database pool");
        tracing::info!("Database pool created");
        Arc::new(PgStore::new(pool))
    } else {
        tracing::warn!("No database URL configured; using the in-memory store");
        Arc::new(MemoryStore::new())
    }
}

fn reset_notifier(config: &StorefrontConfig) -> Arc<dyn ResetNotifier> {
    if let Some(smtp) = &config.smtp {
        let notifier = SmtpNotifier::new(smtp).expect("Failed to create SMTP transport");
        tracing::info!(host = %smtp.host, "Password reset emails go through SMTP");
        Arc::new(notifier)
    } else {
        tracing::warn!("SMTP not configured; password reset tokens are only logged");
        Arc::new(LogNotifier)
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let store = open_store(&config).await;
    let notifier = reset_notifier(&config);
    let addr = config.socket_addr();

    let app = emporium_storefront::app(AppState::new(config, store, notifier));

    tracing::info!("storefront listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
