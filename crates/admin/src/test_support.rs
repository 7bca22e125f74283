//! In-process router harness for admin route tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use modesta_commerce::gateway::ScriptedGateway;
use modesta_commerce::memory::MemoryStore;
use modesta_commerce::models::{CustomerIdentity, NewProduct};
use modesta_commerce::notify::RecordingNotifier;
use modesta_commerce::services::{CartLine, CheckoutRequest};
use modesta_commerce::store::{ProductStore, Stores};
use modesta_commerce::{Caller, CheckoutError, Commerce};
use modesta_core::{AdminRole, CurrencyCode, OrderId, Price, ProductId};

use crate::config::tests::test_config;
use crate::state::AppState;

pub fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub commerce: Commerce,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let commerce = Commerce::new(
            Stores::from_shared(Arc::clone(&store)),
            gateway.clone(),
            notifier.clone(),
            config.commerce.clone(),
        );

        // Never connected: only the readiness probe touches the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy(config.database_url.expose_secret())
            .unwrap();
        let state = AppState::new(config, pool, commerce.clone());

        Self {
            store,
            gateway,
            notifier,
            commerce,
            router: crate::app(state),
        }
    }

    /// Create an admin with `role` and return its API token.
    pub async fn token(&self, role: AdminRole) -> String {
        let email = format!("{role}@modesta.test");
        self.commerce
            .back_office()
            .create_admin(&Caller::System, &email, "Staff", role)
            .await
            .unwrap()
            .token
    }

    fn checkout_request(&self, product_id: ProductId, email: &str) -> CheckoutRequest {
        CheckoutRequest {
            lines: vec![CartLine {
                product_id,
                quantity: 1,
                name: None,
                unit_price: None,
            }],
            customer: CustomerIdentity {
                name: "Hana Yusuf".to_owned(),
                email: email.to_owned(),
                phone: None,
                address: None,
            },
            shipping_address: None,
            billing_address: None,
        }
    }

    async fn kaftan(&self) -> ProductId {
        ProductStore::insert(
            self.store.as_ref(),
            &NewProduct {
                name: "Embroidered Kaftan".to_owned(),
                price: usd(15_000),
            },
        )
        .await
        .unwrap()
        .id
    }

    /// A checked-out order, paid unless `paid` is false.
    pub async fn order(&self, email: &str, paid: bool) -> OrderId {
        let product = self.kaftan().await;
        let started = self
            .commerce
            .checkout()
            .start_checkout(&self.checkout_request(product, email))
            .await
            .unwrap();

        if paid {
            self.gateway.pay(&started.session_id, "pi_admin", None);
            self.commerce
                .reconciliation()
                .reconcile(&started.session_id)
                .await
                .unwrap();
        }
        started.order_id
    }

    /// A pending order whose payment session was never created.
    pub async fn orphan(&self, email: &str) -> OrderId {
        let product = self.kaftan().await;
        self.gateway.fail_create(true);
        let err = self
            .commerce
            .checkout()
            .start_checkout(&self.checkout_request(product, email))
            .await
            .unwrap_err();
        self.gateway.fail_create(false);
        let CheckoutError::GatewayUnavailable { order_id, .. } = err else {
            panic!("expected a gateway failure, got {err:?}");
        };
        order_id
    }

    pub async fn send(&self, method: &str, path: &str, token: Option<&str>, body: Option<&Value>) -> Response {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(json).unwrap())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn json(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, path, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.json("GET", path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> (StatusCode, Value) {
        self.json("POST", path, Some(token), Some(body)).await
    }
}
