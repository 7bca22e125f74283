//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use modesta_core::{CustomerId, OrderId, ProductId, Rating, ReviewId};

/// A review (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    /// The fulfilled order that made the customer eligible.
    pub order_id: OrderId,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub rating: Rating,
    pub comment: Option<String>,
}
