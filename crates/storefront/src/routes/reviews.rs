//! Product review route handlers.
//!
//! Anyone can read reviews. Writing one needs a login and a fulfilled order
//! containing the product.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use modesta_commerce::models::Review;
use modesta_core::{OrderId, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

use super::products::active_product;

#[derive(Debug, Serialize)]
pub struct Eligibility {
    pub can_review: bool,
    /// Fulfilled orders the review may cite.
    pub qualifying_orders: Vec<OrderId>,
}

/// Review request body.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub order_id: OrderId,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Reviews of a product, newest first.
pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state
        .commerce()
        .reviews()
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

/// Whether the logged-in customer may review the product.
pub async fn eligibility(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Eligibility>> {
    let reviews = state.commerce().reviews();
    let can_review = reviews.can_review(customer.id, product_id).await?;
    let qualifying_orders = reviews.qualifying_orders(customer.id, product_id).await?;
    Ok(Json(Eligibility {
        can_review,
        qualifying_orders,
    }))
}

/// Submit a review.
#[instrument(skip(state, customer, form), fields(customer_id = %customer.id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product_id): Path<ProductId>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<Review>)> {
    active_product(&state, product_id).await?;

    let review = state
        .commerce()
        .reviews()
        .submit_review(
            customer.id,
            product_id,
            form.order_id,
            form.rating,
            form.comment.as_deref(),
        )
        .await?;

    add_breadcrumb(
        "review",
        "Review submitted",
        &[("product_id", product_id.to_string())],
    );
    Ok((StatusCode::CREATED, Json(review)))
}
