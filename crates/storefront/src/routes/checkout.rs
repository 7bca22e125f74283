//! Checkout route handlers.
//!
//! `POST /checkout` turns the session cart into a pending order and sends the
//! shopper to the hosted payment page. The gateway sends them back to
//! `/checkout/success` (which reconciles and clears the cart) or
//! `/checkout/cancel` (which keeps the cart).

use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use modesta_commerce::models::CustomerIdentity;
use modesta_commerce::services::{CheckoutRequest, ReconciliationResult};
use modesta_core::Address;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

use super::cart::{CartView, clear_cart, load_cart};

/// Contact and address details submitted with the cart.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub customer: CustomerIdentity,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelledView {
    pub cart: CartView,
}

/// Start a checkout and redirect to the hosted payment page.
#[instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<CheckoutForm>,
) -> Result<Redirect> {
    let cart = load_cart(&session).await?;
    let request = CheckoutRequest {
        lines: cart.checkout_lines(),
        customer: form.customer,
        shipping_address: form.shipping_address,
        billing_address: form.billing_address,
    };

    let started = state.commerce().checkout().start_checkout(&request).await?;

    info!(order_id = %started.order_id, "Redirecting to payment page");
    add_breadcrumb(
        "checkout",
        "Checkout started",
        &[("order_id", started.order_id.to_string())],
    );
    Ok(Redirect::to(&started.redirect_url))
}

/// Return from the payment page.
///
/// The session id in the URL only says which session to ask the gateway
/// about; the payment state always comes from the gateway.
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<ReconciliationResult>> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing session_id".to_string()))?;

    let result = state
        .commerce()
        .reconciliation()
        .reconcile(session_id.trim())
        .await?;

    clear_cart(&session).await?;
    Ok(Json(result))
}

/// Payment abandoned. The cart is left as it was.
pub async fn cancel(State(state): State<AppState>, session: Session) -> Result<Json<CancelledView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CancelledView {
        cart: CartView::new(cart, &state),
    }))
}
