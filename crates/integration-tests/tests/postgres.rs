//! Lifecycle checks against a real `PostgreSQL` database.
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/modesta_test \
//!     cargo test -p modesta-integration-tests --test postgres -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::SecretString;
use sqlx::PgPool;

use modesta_commerce::db::{self, PgStore};
use modesta_commerce::gateway::ScriptedGateway;
use modesta_commerce::models::{CustomerIdentity, NewProduct};
use modesta_commerce::notify::RecordingNotifier;
use modesta_commerce::services::{CartLine, CheckoutRequest};
use modesta_commerce::store::ProductStore;
use modesta_commerce::{Commerce, CommerceConfig, LedgerError, MIGRATOR, Stores};
use modesta_core::OrderStatus;
use modesta_integration_tests::{BASE_URL, dollars};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    MIGRATOR.run(&pool).await.unwrap();
    pool
}

/// An email no earlier run has used.
fn unique_email() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("pg-{nanos}@example.com")
}

struct PgShop {
    store: Arc<PgStore>,
    gateway: Arc<ScriptedGateway>,
    commerce: Commerce,
}

async fn shop() -> PgShop {
    let store = Arc::new(PgStore::new(pool().await));
    let gateway = Arc::new(ScriptedGateway::new());
    let commerce = Commerce::new(
        Stores::from_shared(Arc::clone(&store)),
        gateway.clone(),
        Arc::new(RecordingNotifier::new()),
        CommerceConfig::new(BASE_URL),
    );
    PgShop {
        store,
        gateway,
        commerce,
    }
}

async fn checkout(shop: &PgShop, quantity: i64) -> modesta_commerce::services::CheckoutStarted {
    let product = ProductStore::insert(
        shop.store.as_ref(),
        &NewProduct {
            name: "Tiered Maxi Dress".to_owned(),
            price: dollars(100),
        },
    )
    .await
    .unwrap();

    shop.commerce
        .checkout()
        .start_checkout(&CheckoutRequest {
            lines: vec![CartLine {
                product_id: product.id,
                quantity,
                name: None,
                unit_price: None,
            }],
            customer: CustomerIdentity {
                name: "Aisha Rahman".to_owned(),
                email: unique_email(),
                phone: None,
                address: None,
            },
            shipping_address: None,
            billing_address: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_pg_reconciliation_is_idempotent() {
    let shop = shop().await;
    let started = checkout(&shop, 2).await;
    assert_eq!(started.total, dollars(200));

    shop.gateway.pay(&started.session_id, "pi_pg_123", None);
    let reconciliation = shop.commerce.reconciliation();
    let (a, b) = tokio::join!(
        reconciliation.reconcile(&started.session_id),
        reconciliation.reconcile(&started.session_id),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(u8::from(a.transitioned) + u8::from(b.transitioned), 1);

    let order = shop.commerce.ledger().get(started.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_pg_123"));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_pg_session_is_attached_once() {
    let shop = shop().await;
    let started = checkout(&shop, 1).await;
    let ledger = shop.commerce.ledger();

    ledger
        .attach_payment_session(started.order_id, &started.session_id)
        .await
        .unwrap();
    let err = ledger
        .attach_payment_session(started.order_id, "cs_other")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyAttached { .. }));

    let err = ledger
        .update_status(started.order_id, OrderStatus::Fulfilled)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::IllegalTransition(_)));
}
