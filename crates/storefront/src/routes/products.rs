//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use modesta_commerce::models::Product;
use modesta_core::ProductId;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Look up a product's current price.
///
/// Inactive products are reported as missing.
pub async fn show(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Product>> {
    active_product(&state, product_id).await.map(Json)
}

/// Fetch a product that is for sale.
pub(crate) async fn active_product(state: &AppState, product_id: ProductId) -> Result<Product> {
    state
        .commerce()
        .catalog()
        .product(product_id)
        .await?
        .filter(|product| product.active)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))
}
