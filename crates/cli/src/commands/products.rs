//! Catalog commands.
//!
//! # Usage
//!
//! ```bash
//! modesta products add --name "Linen Abaya" --price 89.00
//! ```

use rust_decimal::Decimal;

use modesta_commerce::models::{NewProduct, Product};
use modesta_commerce::{Caller, Commerce};
use modesta_core::Price;

use super::CliError;

/// Add a product priced in the store currency.
///
/// # Errors
///
/// Returns `CliError::BackOffice` for a blank name or a negative price.
pub async fn add(commerce: &Commerce, name: &str, price: Decimal) -> Result<Product, CliError> {
    let product = commerce
        .back_office()
        .add_product(
            &Caller::System,
            NewProduct {
                name: name.to_owned(),
                price: Price::new(price, commerce.config().currency),
            },
        )
        .await?;
    tracing::info!(
        "Product created! ID: {}, Name: {}, Price: {}",
        product.id,
        product.name,
        product.price
    );
    Ok(product)
}
