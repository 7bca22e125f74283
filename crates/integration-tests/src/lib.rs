//! Integration tests for Modesta.
//!
//! The tests under `tests/` drive the whole order lifecycle through the
//! public `modesta-commerce` services and the admin router, backed by the
//! in-memory store and a scripted payment gateway. No database or network is
//! needed:
//!
//! ```bash
//! cargo test -p modesta-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;

use modesta_admin::config::AdminConfig;
use modesta_admin::state::AppState;
use modesta_commerce::gateway::ScriptedGateway;
use modesta_commerce::memory::MemoryStore;
use modesta_commerce::models::{CustomerIdentity, NewProduct, Product};
use modesta_commerce::notify::RecordingNotifier;
use modesta_commerce::services::{CartLine, CheckoutRequest, CheckoutStarted};
use modesta_commerce::store::ProductStore;
use modesta_commerce::{Caller, Commerce, CommerceConfig, Stores};
use modesta_core::{AdminRole, CurrencyCode, Price};

/// Store base URL used for redirect URLs in tests.
pub const BASE_URL: &str = "https://shop.test";

/// A USD price from whole dollars.
#[must_use]
pub fn dollars(amount: i64) -> Price {
    Price::new(Decimal::from(amount), CurrencyCode::USD)
}

/// Commerce services over shared test doubles.
pub struct Shop {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub commerce: Commerce,
}

impl Default for Shop {
    fn default() -> Self {
        Self::new()
    }
}

impl Shop {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let commerce = Commerce::new(
            Stores::from_shared(Arc::clone(&store)),
            gateway.clone(),
            notifier.clone(),
            CommerceConfig::new(BASE_URL),
        );
        Self {
            store,
            gateway,
            notifier,
            commerce,
        }
    }

    /// Add an active product to the catalog.
    pub async fn product(&self, name: &str, price: Price) -> Product {
        ProductStore::insert(
            self.store.as_ref(),
            &NewProduct {
                name: name.to_owned(),
                price,
            },
        )
        .await
        .unwrap()
    }

    /// Check out `lines` of (product, quantity) as `email`.
    pub async fn checkout(&self, email: &str, lines: &[(&Product, i64)]) -> CheckoutStarted {
        self.commerce
            .checkout()
            .start_checkout(&CheckoutRequest {
                lines: lines
                    .iter()
                    .map(|(product, quantity)| CartLine {
                        product_id: product.id,
                        quantity: *quantity,
                        name: None,
                        unit_price: None,
                    })
                    .collect(),
                customer: CustomerIdentity {
                    name: "Aisha Rahman".to_owned(),
                    email: email.to_owned(),
                    phone: None,
                    address: None,
                },
                shipping_address: None,
                billing_address: None,
            })
            .await
            .unwrap()
    }

    /// Issue an admin API token with `role`.
    pub async fn admin_token(&self, role: AdminRole) -> String {
        self.commerce
            .back_office()
            .create_admin(&Caller::System, &format!("{role}@modesta.test"), "Staff", role)
            .await
            .unwrap()
            .token
    }

    /// The admin router over this shop's services.
    #[must_use]
    pub fn admin_router(&self) -> axum::Router {
        let config = AdminConfig {
            database_url: SecretString::from("postgres://modesta@localhost/modesta_test"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3001,
            commerce: CommerceConfig::new(BASE_URL),
            sweep_interval: None,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        // Never connected: only the readiness probe touches the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://modesta@localhost/modesta_test")
            .expect("lazy pool");
        modesta_admin::app(AppState::new(config, pool, self.commerce.clone()))
    }
}
