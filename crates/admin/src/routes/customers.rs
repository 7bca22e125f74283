//! Customer management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use modesta_commerce::models::{Customer, Page};
use modesta_commerce::services::CustomerDetail;
use modesta_core::CustomerId;

use crate::error::Result;
use crate::middleware::AdminCaller;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Active customers, newest first.
pub async fn index(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Customer>>> {
    let customers = state
        .commerce()
        .back_office()
        .list_customers(&caller, Page::new(query.page, query.per_page))
        .await?;
    Ok(Json(customers))
}

/// A customer with their order history.
pub async fn show(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<CustomerDetail>> {
    let detail = state
        .commerce()
        .back_office()
        .customer_detail(&caller, customer_id)
        .await?;
    Ok(Json(detail))
}

/// Soft-delete a customer. Their orders stay in the ledger.
#[instrument(skip(state, caller), fields(caller = %caller))]
pub async fn delete(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Path(customer_id): Path<CustomerId>,
) -> Result<StatusCode> {
    state
        .commerce()
        .back_office()
        .delete_customer(&caller, customer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use modesta_core::AdminRole;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_customer_detail_lists_orders() {
        let app = TestApp::new();
        let viewer = app.token(AdminRole::Viewer).await;
        let order = app.order("hana@example.com", true).await;
        let customer_id = app.commerce.ledger().get(order).await.unwrap().customer_id;

        let (status, body) = app.get("/customers", &viewer).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["email"], "hana@example.com");

        let (status, body) = app.get(&format!("/customers/{customer_id}"), &viewer).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["customer"]["name"], "Hana Yusuf");
        assert_eq!(body["orders"][0]["id"], order.get());
    }

    #[tokio::test]
    async fn test_delete_keeps_orders() {
        let app = TestApp::new();
        let viewer = app.token(AdminRole::Viewer).await;
        let admin = app.token(AdminRole::Admin).await;
        let order = app.order("hana@example.com", true).await;
        let customer_id = app.commerce.ledger().get(order).await.unwrap().customer_id;
        let path = format!("/customers/{customer_id}");

        let (status, _) = app.json("DELETE", &path, Some(&viewer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.json("DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.get("/customers", &viewer).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = app.get(&format!("/orders/{order}"), &viewer).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "paid");

        // Already gone.
        let (status, _) = app.json("DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
