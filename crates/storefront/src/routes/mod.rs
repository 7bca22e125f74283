//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /health/ready                   - Readiness check (database)
//!
//! # Products
//! GET  /products/{id}                  - Product detail
//! GET  /products/{id}/reviews          - Reviews, newest first
//! POST /products/{id}/reviews          - Submit a review (requires auth)
//! GET  /products/{id}/review-eligibility - Can the customer review it (requires auth)
//!
//! # Cart and wishlist (session)
//! GET  /cart                           - Cart contents
//! POST /cart/add                       - Add a product
//! POST /cart/update                    - Set a line quantity (0 removes)
//! POST /cart/remove                    - Remove a line
//! GET  /wishlist                       - Saved products
//! POST /wishlist/add                   - Save a product
//! POST /wishlist/remove                - Forget a product
//!
//! # Checkout
//! POST /checkout                       - Create the order, redirect to payment
//! GET  /checkout/success?session_id=   - Reconcile after payment
//! GET  /checkout/cancel                - Payment abandoned
//! POST /webhooks/stripe                - Stripe event delivery
//!
//! # Auth
//! POST /auth/login                     - Log in
//! POST /auth/logout                    - Log out
//!
//! # Account (requires auth)
//! GET  /account/orders                 - Order history
//! GET  /account/orders/{id}            - Order detail
//! POST /account/password               - Change password
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;
pub mod reviews;
pub mod webhooks;
pub mod wishlist;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", get(reviews::list).post(reviews::submit))
        .route("/{id}/review-eligibility", get(reviews::eligibility))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order_detail))
        .route("/password", post(auth::change_password))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/checkout", checkout_routes())
        .route("/webhooks/stripe", post(webhooks::stripe))
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
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
