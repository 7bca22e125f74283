//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use modesta_commerce::Commerce;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    commerce: Commerce,
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool, commerce: Commerce) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                commerce,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn commerce(&self) -> &Commerce {
        &self.inner.commerce
    }
}
