//! `shop.review`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use modesta_core::{CustomerId, OrderId, ProductId, Rating, ReviewId};

use super::{PgStore, RepositoryError};
use crate::models::{NewReview, Review};
use crate::store::ReviewStore;

const REVIEW_COLUMNS: &str = "id, customer_id, product_id, order_id, rating, comment, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    customer_id: i64,
    product_id: i64,
    order_id: i64,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating)).map_err(|e| {
            RepositoryError::DataCorruption(format!("review {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ReviewId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            product_id: ProductId::new(row.product_id),
            order_id: OrderId::new(row.order_id),
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn exists_for(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.review WHERE customer_id = $1 AND product_id = $2)",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            INSERT INTO shop.review (customer_id, product_id, order_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(review.customer_id)
        .bind(review.product_id)
        .bind(review.order_id)
        .bind(review.rating.as_i16())
        .bind(review.comment.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "review already exists"))?;

        row.try_into()
    }

    async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            SELECT {REVIEW_COLUMNS} FROM shop.review
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
