//! End-to-end order lifecycle: checkout, payment reconciliation, fulfilment,
//! and reviews.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use modesta_commerce::notify::Notification;
use modesta_commerce::{LedgerError, ReviewError};
use modesta_core::{AdminRole, OrderStatus};
use modesta_integration_tests::{Shop, dollars};

#[tokio::test]
async fn test_paid_checkout_reconciles_once() {
    let shop = Shop::new();
    let dress = shop.product("Tiered Maxi Dress", dollars(100)).await;

    let started = shop.checkout("aisha@example.com", &[(&dress, 2)]).await;
    assert_eq!(started.total.amount, Decimal::from(200));

    let order = shop.commerce.ledger().get(started.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, dollars(200));
    assert_eq!(order.payment_session_id.as_deref(), Some(started.session_id.as_str()));

    shop.gateway.pay(&started.session_id, "pi_123", None);
    let first = shop
        .commerce
        .reconciliation()
        .reconcile(&started.session_id)
        .await
        .unwrap();
    assert!(first.transitioned);
    assert_eq!(first.order.status, OrderStatus::Paid);
    assert_eq!(first.order.payment_intent_id.as_deref(), Some("pi_123"));
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].quantity, 2);

    let second = shop
        .commerce
        .reconciliation()
        .reconcile(&started.session_id)
        .await
        .unwrap();
    assert!(!second.transitioned);
    assert_eq!(second.order, first.order);
    assert_eq!(second.items, first.items);
    assert_eq!(second.customer, first.customer);

    let sent = shop.notifier.wait_for(2).await;
    let confirmations = sent
        .iter()
        .filter(|n| matches!(n, Notification::OrderConfirmed { .. }))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_pending_order_cannot_be_fulfilled() {
    let shop = Shop::new();
    let dress = shop.product("Tiered Maxi Dress", dollars(100)).await;
    let started = shop.checkout("aisha@example.com", &[(&dress, 1)]).await;

    let err = shop
        .commerce
        .ledger()
        .update_status(started.order_id, OrderStatus::Fulfilled)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::IllegalTransition(_)));

    let order = shop.commerce.ledger().get(started.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_admin_api_rejects_illegal_transition() {
    let shop = Shop::new();
    let dress = shop.product("Tiered Maxi Dress", dollars(100)).await;
    let started = shop.checkout("aisha@example.com", &[(&dress, 1)]).await;
    let token = shop.admin_token(AdminRole::Admin).await;

    let request = Request::post(format!("/orders/{}/status", started.order_id))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "status": "fulfilled" }).to_string()))
        .unwrap();
    let response = shop.admin_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("pending"));

    let order = shop.commerce.ledger().get(started.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_review_eligibility_follows_fulfilment() {
    let shop = Shop::new();
    let abaya = shop.product("Linen Abaya", dollars(100)).await;
    let started = shop.checkout("aisha@example.com", &[(&abaya, 1)]).await;
    let customer_id = shop
        .commerce
        .ledger()
        .get(started.order_id)
        .await
        .unwrap()
        .customer_id;
    let reviews = shop.commerce.reviews();

    assert!(!reviews.can_review(customer_id, abaya.id).await.unwrap());

    shop.gateway.pay(&started.session_id, "pi_456", None);
    shop.commerce
        .reconciliation()
        .reconcile(&started.session_id)
        .await
        .unwrap();
    // Paid is not enough.
    assert!(!reviews.can_review(customer_id, abaya.id).await.unwrap());

    shop.commerce
        .ledger()
        .update_status(started.order_id, OrderStatus::Fulfilled)
        .await
        .unwrap();
    assert!(reviews.can_review(customer_id, abaya.id).await.unwrap());

    let review = reviews
        .submit_review(customer_id, abaya.id, started.order_id, 5, Some("Beautiful drape"))
        .await
        .unwrap();
    assert_eq!(review.rating.as_i16(), 5);
    assert!(!reviews.can_review(customer_id, abaya.id).await.unwrap());

    let err = reviews
        .submit_review(customer_id, abaya.id, started.order_id, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::DuplicateReview));
    assert_eq!(reviews.list_for_product(abaya.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_reconciliation_applies_payment_once() {
    let shop = Shop::new();
    let hijab = shop.product("Chiffon Hijab", dollars(25)).await;
    let started = shop.checkout("aisha@example.com", &[(&hijab, 3)]).await;
    shop.gateway.pay(&started.session_id, "pi_789", None);

    let reconciliation = shop.commerce.reconciliation();
    let (a, b) = tokio::join!(
        reconciliation.reconcile(&started.session_id),
        reconciliation.reconcile(&started.session_id),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(
        u8::from(a.transitioned) + u8::from(b.transitioned),
        1,
        "exactly one call moves the order to paid"
    );
    assert_eq!(a.order.status, OrderStatus::Paid);
    assert_eq!(b.order.status, OrderStatus::Paid);

    let order = shop.commerce.ledger().get(started.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_789"));
}
