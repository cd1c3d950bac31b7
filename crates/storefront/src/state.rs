//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::auth::{AuthService, TokenIssuer};
use crate::services::notifier::ResetNotifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, token issuer, notifier and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Persistence backend (`PgStore` or `MemoryStore`)
    /// * `notifier` - Delivery of password reset tokens
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn Store>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.auth);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                notifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Authentication service bound to this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, dyn Store + '_> {
        AuthService::new(
            self.store(),
            &self.inner.tokens,
            self.inner.notifier.as_ref(),
            self.inner.config.auth.reset_token_ttl,
        )
    }
}
