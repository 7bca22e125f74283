//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use modesta_commerce::Commerce;
use modesta_commerce::gateway::WebhookVerifier;

use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    commerce: Commerce,
    webhooks: Option<WebhookVerifier>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The Stripe webhook is enabled only when a signing secret is configured.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, commerce: Commerce) -> Self {
        let webhooks = config
            .stripe
            .webhook_secret
            .clone()
            .map(WebhookVerifier::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                commerce,
                webhooks,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The order lifecycle services.
    #[must_use]
    pub fn commerce(&self) -> &Commerce {
        &self.inner.commerce
    }

    /// Webhook signature verifier, if the webhook is enabled.
    #[must_use]
    pub fn webhooks(&self) -> Option<&WebhookVerifier> {
        self.inner.webhooks.as_ref()
    }
}
