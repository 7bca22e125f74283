//! Orphaned order sweep.
//!
//! Checkout creates the order before asking the gateway for a session. When
//! that request fails the order stays `pending` with nothing that could ever
//! pay it. The sweep cancels such orders once they are older than the
//! configured TTL. Orders with a session are never touched: the shopper may
//! still pay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::LedgerError;

use super::ledger::OrderLedger;

/// Cancels pending orders that never got a payment session.
#[derive(Clone)]
pub struct OrphanSweep {
    ledger: OrderLedger,
    ttl: chrono::Duration,
}

impl OrphanSweep {
    #[must_use]
    pub const fn new(ledger: OrderLedger, ttl: chrono::Duration) -> Self {
        Self { ledger, ttl }
    }

    /// Run one sweep as of `now`. Returns the number of cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        self.ledger.cancel_orphans(now - self.ttl).await
    }

    /// Run one sweep now.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    pub async fn run(&self) -> Result<u64, LedgerError> {
        self.run_at(Utc::now()).await
    }

    /// Sweep every `every` on a background task until the runtime shuts down.
    #[must_use]
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        info!(interval_secs = every.as_secs(), "Starting orphan order sweep");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run().await {
                    error!(error = %e, "Orphan order sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use modesta_core::OrderStatus;

    use crate::config::CommerceConfig;
    use crate::services::fixtures::{harness_with, identity, product, usd};
    use crate::services::{CartLine, CheckoutRequest};
    use crate::error::CheckoutError;

    use super::*;

    #[tokio::test]
    async fn test_sweep_cancels_only_expired_sessionless_orders() {
        let mut config = CommerceConfig::new("https://shop.test");
        config.orphan_ttl = chrono::Duration::hours(2);
        let h = harness_with(config);
        let product_id = product(&h.store, "Prayer Dress", usd(6_000)).await;
        let request = CheckoutRequest {
            lines: vec![CartLine {
                product_id,
                quantity: 1,
                name: None,
                unit_price: None,
            }],
            customer: identity("Khadija", "khadija@example.com"),
            shipping_address: None,
            billing_address: None,
        };

        let paid_later = h.commerce.checkout().start_checkout(&request).await.unwrap();
        h.gateway.fail_create(true);
        let Err(CheckoutError::GatewayUnavailable { order_id: orphan, .. }) =
            h.commerce.checkout().start_checkout(&request).await
        else {
            panic!("expected gateway failure");
        };

        let now = Utc::now();
        assert_eq!(h.commerce.sweep().run_at(now).await.unwrap(), 0);

        let later = now + chrono::Duration::hours(3);
        assert_eq!(h.commerce.sweep().run_at(later).await.unwrap(), 1);

        let ledger = h.commerce.ledger();
        assert_eq!(ledger.get(orphan).await.unwrap().status, OrderStatus::Cancelled);
        assert_eq!(
            ledger.get(paid_later.order_id).await.unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweep_runs_on_interval() {
        let h = crate::services::fixtures::harness();
        let handle = h.commerce.sweep().clone().spawn(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
