//! HTTP route handlers for admin.
//!
//! Every route except the health checks takes an `Authorization: Bearer`
//! admin token. Viewers may read; writes need the admin role.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness check
//! GET    /health/ready               - Readiness check (database)
//!
//! # Orders
//! GET    /orders?status=&page=&per_page= - Order list
//! GET    /orders/export.csv?status=  - CSV export
//! POST   /orders/sweep               - Cancel orphaned orders
//! GET    /orders/{id}                - Order with items and customer
//! POST   /orders/{id}/status         - Change status
//! POST   /orders/{id}/shipping       - Replace shipping details
//!
//! # Customers
//! GET    /customers?page=&per_page=  - Active customers
//! GET    /customers/{id}             - Customer with orders
//! DELETE /customers/{id}             - Soft-delete
//!
//! # Catalog
//! POST   /products                   - Add a product
//! ```

pub mod customers;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/export.csv", get(orders::export_csv))
        .route("/sweep", post(orders::sweep))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::set_status))
        .route("/{id}/shipping", post(orders::update_shipping))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index))
        .route("/{id}", get(customers::show).delete(customers::delete))
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/orders", order_routes())
        .nest("/customers", customer_routes())
        .route("/products", post(products::create))
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
