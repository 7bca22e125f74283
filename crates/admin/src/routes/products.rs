//! Catalog route handlers.

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use modesta_commerce::models::{NewProduct, Product};
use modesta_core::Price;

use crate::error::Result;
use crate::middleware::AdminCaller;
use crate::state::AppState;

/// Product input; priced in the store currency.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub price: Decimal,
}

#[instrument(skip(state, caller, form), fields(name = %form.name))]
pub async fn create(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Json(form): Json<ProductForm>,
) -> Result<(StatusCode, Json<Product>)> {
    let commerce = state.commerce();
    let product = NewProduct {
        name: form.name,
        price: Price::new(form.price, commerce.config().currency),
    };
    let product = commerce.back_office().add_product(&caller, product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}
