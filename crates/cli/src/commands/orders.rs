//! Order maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! # Cancel unpaid orders that never got a payment session
//! modesta orders sweep
//!
//! # Export orders as CSV
//! modesta orders export --status paid > paid.csv
//! ```

use std::io::Write;

use modesta_commerce::models::OrderFilter;
use modesta_commerce::{Caller, Commerce};
use modesta_core::OrderStatus;

use super::CliError;

/// Run the orphaned-order sweep once. Returns the number of cancelled orders.
///
/// # Errors
///
/// Returns `CliError::BackOffice` if the store cannot be reached.
pub async fn sweep(commerce: &Commerce) -> Result<u64, CliError> {
    let cancelled = commerce
        .back_office()
        .sweep_orphans(&Caller::System)
        .await?;
    tracing::info!("Cancelled {} orphaned order(s)", cancelled);
    Ok(cancelled)
}

/// Write orders, optionally only those in `status`, as CSV to `out`.
///
/// # Errors
///
/// Returns `CliError::BackOffice` if the store cannot be reached and
/// `CliError::Io` if the output cannot be written.
pub async fn export(
    commerce: &Commerce,
    status: Option<OrderStatus>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let csv = commerce
        .back_office()
        .export_orders_csv(&Caller::System, OrderFilter { status })
        .await?;
    out.write_all(csv.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use modesta_commerce::models::{CustomerIdentity, NewProduct};
    use modesta_commerce::services::{CartLine, CheckoutRequest};
    use modesta_commerce::store::ProductStore;
    use modesta_commerce::CheckoutError;
    use modesta_core::{CurrencyCode, OrderId, Price};

    use super::*;
    use crate::commands::fixtures;

    /// Checkout always fails at the gateway here, leaving an orphaned order.
    async fn orphan(commerce: &Commerce, store: &modesta_commerce::memory::MemoryStore) -> OrderId {
        let product = ProductStore::insert(
            store,
            &NewProduct {
                name: "Satin Jilbab".to_owned(),
                price: Price::new(Decimal::new(6_500, 2), CurrencyCode::USD),
            },
        )
        .await
        .unwrap();
        let err = commerce
            .checkout()
            .start_checkout(&CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id,
                    quantity: 1,
                    name: None,
                    unit_price: None,
                }],
                customer: CustomerIdentity {
                    name: "Mariam Idris".to_owned(),
                    email: "mariam@example.com".to_owned(),
                    phone: None,
                    address: None,
                },
                shipping_address: None,
                billing_address: None,
            })
            .await
            .unwrap_err();
        let CheckoutError::GatewayUnavailable { order_id, .. } = err else {
            panic!("expected a gateway failure, got {err:?}");
        };
        order_id
    }

    #[tokio::test]
    async fn test_sweep_and_export() {
        let (store, commerce) = fixtures::commerce();
        let fresh = orphan(&commerce, &store).await;
        let stale = orphan(&commerce, &store).await;
        store.set_created_at(stale, Utc::now() - Duration::hours(25));

        assert_eq!(sweep(&commerce).await.unwrap(), 1);
        assert_eq!(sweep(&commerce).await.unwrap(), 0);

        let mut out = Vec::new();
        export(&commerce, Some(OrderStatus::Cancelled), &mut out)
            .await
            .unwrap();
        let csv = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with(&format!("{stale},")));

        let mut out = Vec::new();
        export(&commerce, None, &mut out).await.unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains(&format!("\n{fresh},")));
    }
}
