//! Review eligibility.
//!
//! A customer may review a product once they have a fulfilled order containing
//! it. Each review names the order that made it possible.

use std::sync::Arc;

use tracing::{info, instrument};

use modesta_core::{CustomerId, OrderId, ProductId, Rating};

use crate::error::ReviewError;
use crate::models::{NewReview, Review};
use crate::store::{OrderStore, ReviewStore};

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Decides who may review what, and records reviews.
#[derive(Clone)]
pub struct ReviewEligibility {
    orders: Arc<dyn OrderStore>,
    reviews: Arc<dyn ReviewStore>,
}

impl ReviewEligibility {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, reviews: Arc<dyn ReviewStore>) -> Self {
        Self { orders, reviews }
    }

    /// Whether the customer may review the product now.
    ///
    /// True iff they have not reviewed it yet and at least one of their
    /// fulfilled orders contains it.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Unavailable` if a store cannot be reached.
    pub async fn can_review(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, ReviewError> {
        if self.reviews.exists_for(customer_id, product_id).await? {
            return Ok(false);
        }
        Ok(!self.qualifying_orders(customer_id, product_id).await?.is_empty())
    }

    /// Fulfilled orders of the customer that contain the product.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Unavailable` if the store cannot be reached.
    pub async fn qualifying_orders(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Vec<OrderId>, ReviewError> {
        Ok(self
            .orders
            .fulfilled_orders_containing(customer_id, product_id)
            .await?)
    }

    /// Record a review.
    ///
    /// The rating is validated before any store access.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidRating` for ratings outside 1..=5,
    /// `ReviewError::NotEligible` if `order_id` is not a fulfilled order of
    /// this customer containing the product, and `ReviewError::DuplicateReview`
    /// if this (customer, product, order) was already reviewed.
    #[instrument(skip(self, comment))]
    pub async fn submit_review(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        order_id: OrderId,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<Review, ReviewError> {
        let rating = Rating::new(rating)?;
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH) {
            return Err(ReviewError::CommentTooLong {
                max: MAX_COMMENT_LENGTH,
            });
        }

        let qualifying = self.qualifying_orders(customer_id, product_id).await?;
        if !qualifying.contains(&order_id) {
            return Err(ReviewError::NotEligible { order_id });
        }

        let review = self
            .reviews
            .insert(&NewReview {
                customer_id,
                product_id,
                order_id,
                rating,
                comment: comment.map(str::to_owned),
            })
            .await?;
        info!(review_id = %review.id, "Review submitted");
        Ok(review)
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Unavailable` if the store cannot be reached.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, ReviewError> {
        Ok(self.reviews.list_for_product(product_id).await?)
    }
}
