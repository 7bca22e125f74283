//! Authentication route handlers.
//!
//! Customers get an account at their first checkout and log in with the
//! one-time password mailed to them, which they are asked to replace.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use modesta_core::CustomerId;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireCustomer, clear_current_customer, set_current_customer};
use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Password change request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoggedIn {
    pub customer_id: CustomerId,
    pub name: String,
    /// The password used was a one-time credential and should be changed.
    pub must_reset: bool,
}

/// Log in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoggedIn>> {
    let (customer, must_reset) = state
        .commerce()
        .directory()
        .authenticate(&form.email, &form.password)
        .await?;

    let current = CurrentCustomer {
        id: customer.id,
        email: customer.email,
        name: customer.name,
        must_reset,
    };
    set_current_customer(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    info!(customer_id = %current.id, "Customer logged in");

    Ok(Json(LoggedIn {
        customer_id: current.id,
        name: current.name,
        must_reset,
    }))
}

/// Log out. The cart and wishlist stay with the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_customer(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the password, typically the one-time credential.
#[instrument(skip_all, fields(customer_id = %customer.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
    Json(form): Json<ChangePasswordForm>,
) -> Result<StatusCode> {
    state
        .commerce()
        .directory()
        .change_password(customer.id, &form.current_password, &form.new_password)
        .await?;

    if customer.must_reset {
        let updated = CurrentCustomer {
            must_reset: false,
            ..customer
        };
        session
            .insert(session_keys::CURRENT_CUSTOMER, &updated)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
