//! In-process router harness for route tests.
//!
//! Runs the real router over the in-memory store, the scripted gateway and an
//! in-memory session store, carrying the session cookie between requests the
//! way a browser would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use modesta_commerce::gateway::ScriptedGateway;
use modesta_commerce::memory::MemoryStore;
use modesta_commerce::models::NewProduct;
use modesta_commerce::notify::{Notification, RecordingNotifier};
use modesta_commerce::store::{ProductStore, Stores};
use modesta_commerce::Commerce;
use modesta_core::{CurrencyCode, OrderId, Price, ProductId};

use crate::config::StorefrontConfig;
use crate::config::tests::test_config;
use crate::routes::webhooks::SIGNATURE_HEADER;
use crate::state::AppState;

/// Signing secret used by [`TestApp::with_webhooks`].
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub commerce: Commerce,
    router: Router,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Harness with the Stripe webhook endpoint enabled.
    pub fn with_webhooks() -> Self {
        let mut config = test_config();
        config.stripe.webhook_secret = Some(SecretString::from(WEBHOOK_SECRET));
        Self::with_config(config)
    }

    fn with_config(config: StorefrontConfig) -> Self {
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
        let sessions = crate::middleware::session::configure(
            tower_sessions::MemoryStore::default(),
            false,
        );

        Self {
            store,
            gateway,
            notifier,
            commerce,
            router: crate::app(state, sessions),
            cookie: None,
        }
    }

    /// Forget the session cookie, as a fresh browser would.
    pub fn new_browser(&mut self) {
        self.cookie = None;
    }

    pub async fn product(&self, name: &str, price: Price) -> ProductId {
        ProductStore::insert(
            self.store.as_ref(),
            &NewProduct {
                name: name.to_owned(),
                price,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn send(&mut self, mut request: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }
        response
    }

    async fn json_of(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&mut self, path: &str) -> (StatusCode, Value) {
        let request = Request::get(path).body(Body::empty()).unwrap();
        let response = self.send(request).await;
        Self::json_of(response).await
    }

    pub async fn post_raw(&mut self, path: &str, body: &Value) -> Response {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&mut self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self.post_raw(path, body).await;
        Self::json_of(response).await
    }

    pub async fn post_webhook(&mut self, body: &[u8], signature: Option<&str>) -> StatusCode {
        let mut request = Request::post("/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        let response = self
            .send(request.body(Body::from(body.to_vec())).unwrap())
            .await;
        response.status()
    }

    /// Session id the gateway issued for an order.
    pub async fn gateway_session_id(&self, order_id: OrderId) -> String {
        self.commerce
            .ledger()
            .get(order_id)
            .await
            .unwrap()
            .payment_session_id
            .unwrap()
    }

    /// Put one product of the given price in the cart and check out as
    /// `aisha@example.com`. Returns the order and its gateway session.
    pub async fn started_checkout(&mut self, price: Price) -> (OrderId, String) {
        let product = self.product("Linen Abaya", price).await;
        self.post_json("/cart/add", &json!({ "product_id": product.get() }))
            .await;
        let response = self
            .post_raw(
                "/checkout",
                &json!({ "customer": { "name": "Aisha Rahman", "email": "aisha@example.com" } }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let order_id = self.gateway.requests().last().unwrap().order_id;
        let session_id = self.gateway_session_id(order_id).await;
        (order_id, session_id)
    }

    /// The one-time password mailed when a customer was created at checkout.
    pub async fn welcome_credential(&self) -> String {
        self.notifier
            .wait_for(1)
            .await
            .into_iter()
            .find_map(|n| match n {
                Notification::WelcomeCredential { credential, .. } => {
                    Some(credential.expose_secret().to_owned())
                }
                _ => None,
            })
            .expect("no welcome credential was sent")
    }
}
