//! Every (from, to) status pair through the ledger against the state machine.

#![allow(clippy::unwrap_used)]

use modesta_commerce::LedgerError;
use modesta_commerce::services::StatusChange;
use modesta_core::{OrderStatus, Transition};
use modesta_integration_tests::{Shop, dollars};

#[tokio::test]
async fn test_ledger_enforces_every_status_pair() {
    let shop = Shop::new();
    let scarf = shop.product("Modal Scarf", dollars(18)).await;

    for from in OrderStatus::ALL {
        for to in OrderStatus::ALL {
            let started = shop.checkout("noor@example.com", &[(&scarf, 1)]).await;
            shop.store.force_status(started.order_id, from);

            let result = shop
                .commerce
                .ledger()
                .update_status(started.order_id, to)
                .await;
            let stored = shop.commerce.ledger().get(started.order_id).await.unwrap();

            match (from.transition(to), result) {
                (Ok(expected), Ok(StatusChange { order, transition })) => {
                    assert_eq!(transition, expected, "{from} -> {to}");
                    assert_eq!(order.status, to, "{from} -> {to}");
                    assert_eq!(stored.status, to, "{from} -> {to}");
                    if expected == Transition::AlreadyInState {
                        assert_eq!(from, to);
                    }
                }
                (Err(_), Err(LedgerError::IllegalTransition(illegal))) => {
                    assert_eq!((illegal.from, illegal.to), (from, to));
                    assert_eq!(stored.status, from, "{from} -> {to} must not be written");
                }
                (expected, actual) => {
                    panic!("{from} -> {to}: expected {expected:?}, got {actual:?}");
                }
            }
        }
    }
}

#[tokio::test]
async fn test_terminal_statuses_are_final() {
    let shop = Shop::new();
    let scarf = shop.product("Modal Scarf", dollars(18)).await;

    for terminal in [OrderStatus::Fulfilled, OrderStatus::Cancelled] {
        let started = shop.checkout("noor@example.com", &[(&scarf, 1)]).await;
        shop.store.force_status(started.order_id, terminal);

        for to in OrderStatus::ALL.into_iter().filter(|s| *s != terminal) {
            let err = shop
                .commerce
                .ledger()
                .update_status(started.order_id, to)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::IllegalTransition(_)));
        }
    }
}
