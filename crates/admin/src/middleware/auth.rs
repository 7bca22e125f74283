//! Bearer token authentication for the admin API.
//!
//! Every request resolves to a [`Caller`]. A missing, malformed, or unknown
//! token resolves to [`Caller::Anonymous`]; the authorization gate inside each
//! back-office operation then answers 401 or 403.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::Span;

use modesta_commerce::Caller;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor for the caller behind the request's bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn orders(
///     State(state): State<AppState>,
///     AdminCaller(caller): AdminCaller,
/// ) -> Result<Json<OrderPage>> {
///     Ok(Json(state.commerce().back_office().list_orders(&caller, ..).await?))
/// }
/// ```
pub struct AdminCaller(pub Caller);

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(Caller::Anonymous));
        };

        let caller = state
            .commerce()
            .back_office()
            .caller_for_token(token)
            .await?;

        if let Caller::Admin(admin) = &caller {
            Span::current().record("admin_id", admin.id.get());
            set_sentry_user(&admin.id, Some(admin.email.as_str()));
        }
        Ok(Self(caller))
    }
}
