//! Product catalog.
//!
//! Carts carry whatever the browser sent. Only product ids and quantities are
//! trusted; names and prices always come from here.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use modesta_core::{CurrencyCode, Price, ProductId};

use crate::db::RepositoryError;
use crate::error::CheckoutError;
use crate::gateway::GatewayLineItem;
use crate::models::{NewOrderItem, Product};
use crate::store::ProductStore;

/// Largest order total the ledger can store (`NUMERIC(12, 2)`).
/// Equal to `Decimal::new(999_999_999_999, 2)`, i.e. 9_999_999_999.99.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// A cart re-priced against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub items: Vec<NewOrderItem>,
    pub total: Price,
}

impl PricedCart {
    /// Line items as sent to the payment gateway.
    #[must_use]
    pub fn gateway_lines(&self) -> Vec<GatewayLineItem> {
        self.items
            .iter()
            .map(|item| GatewayLineItem {
                name: item.product_name.clone(),
                unit_price: Price::new(item.unit_price, self.total.currency_code),
                quantity: item.quantity,
            })
            .collect()
    }
}

/// Read access to products, plus re-pricing.
#[derive(Clone)]
pub struct Catalog {
    products: Arc<dyn ProductStore>,
    currency: CurrencyCode,
}

impl Catalog {
    #[must_use]
    pub fn new(products: Arc<dyn ProductStore>, currency: CurrencyCode) -> Self {
        Self { products, currency }
    }

    /// The currency every order settles in.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Get a product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store cannot be reached.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.products.get(id).await
    }

    /// Price `(product, quantity)` pairs from the catalog.
    ///
    /// Quantities must already be validated as positive.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` for unknown or inactive
    /// products and `CheckoutError::CurrencyMismatch` for products priced in
    /// another currency than the store's.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reprice(&self, lines: &[(ProductId, u32)]) -> Result<PricedCart, CheckoutError> {
        let mut ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();

        let products: HashMap<ProductId, Product> = self
            .products
            .get_many(&ids)
            .await
            .map_err(CheckoutError::CatalogUnavailable)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut total = Price::zero(self.currency);
        let mut items = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            let product = products
                .get(&product_id)
                .filter(|p| p.active)
                .ok_or(CheckoutError::ProductNotFound(product_id))?;

            let line = product.price.times(quantity);
            total = total
                .checked_add(line)
                .ok_or(CheckoutError::CurrencyMismatch {
                    product_id,
                    expected: self.currency,
                })?;

            items.push(NewOrderItem {
                product_id,
                product_name: product.name.clone(),
                unit_price: product.price.amount,
                quantity,
            });
        }

        if total.amount > MAX_ORDER_TOTAL {
            return Err(CheckoutError::TotalTooLarge { total });
        }

        Ok(PricedCart { items, total })
    }
}
