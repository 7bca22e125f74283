//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Domain errors map onto status codes by kind: bad input is 400, an order or
//! review in the wrong state is 409, missing things are 404, and an
//! unreachable store or gateway is 503/502 so clients know to retry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use modesta_commerce::db::RepositoryError;
use modesta_commerce::gateway::{GatewayError, WebhookError};
use modesta_commerce::{
    CheckoutError, DirectoryError, LedgerError, ReconcileError, ReviewError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Webhook delivery could not be verified or parsed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(e) => checkout_status(e),
            Self::Reconcile(e) => match e {
                ReconcileError::GatewayUnavailable(GatewayError::NotFound(_)) => {
                    StatusCode::NOT_FOUND
                }
                ReconcileError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
                ReconcileError::OrderNotFound { .. } => StatusCode::NOT_FOUND,
                ReconcileError::Ledger(e) => ledger_status(e),
            },
            Self::Review(e) => match e {
                ReviewError::InvalidRating(_) | ReviewError::CommentTooLong { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ReviewError::NotEligible { .. } => StatusCode::FORBIDDEN,
                ReviewError::DuplicateReview => StatusCode::CONFLICT,
                ReviewError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Directory(e) => directory_status(e),
            Self::Ledger(e) => ledger_status(e),
            Self::Database(e) => match e {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
                RepositoryError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Webhook(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

fn checkout_status(e: &CheckoutError) -> StatusCode {
    match e {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidQuantity { .. }
        | CheckoutError::TotalTooLarge { .. }
        | CheckoutError::CurrencyMismatch { .. } => StatusCode::BAD_REQUEST,
        CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::Customer(e) => directory_status(e),
        CheckoutError::CatalogUnavailable(_) | CheckoutError::OrderCreationFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CheckoutError::GatewayUnavailable { .. } => StatusCode::BAD_GATEWAY,
        CheckoutError::SessionAttachFailed { .. } | CheckoutError::ItemsIncomplete { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn directory_status(e: &DirectoryError) -> StatusCode {
    match e {
        DirectoryError::InvalidEmail(_)
        | DirectoryError::MissingName
        | DirectoryError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
        DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
        DirectoryError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DirectoryError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DirectoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotFound => StatusCode::NOT_FOUND,
        LedgerError::AlreadyAttached { .. }
        | LedgerError::SessionInUse { .. }
        | LedgerError::IllegalTransition(_)
        | LedgerError::Contended(_) => StatusCode::CONFLICT,
        LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::BAD_GATEWAY => "Payment provider unavailable, please try again".to_string(),
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
            s if s.is_server_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use modesta_core::{IllegalTransition, OrderId, OrderStatus, ProductId, RatingError};

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::Checkout(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "cart is empty");
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            AppError::from(CheckoutError::InvalidQuantity {
                product_id: ProductId::new(1)
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ReviewError::InvalidRating(RatingError { got: 9 })).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(LedgerError::IllegalTransition(IllegalTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Fulfilled,
            }))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(ReviewError::DuplicateReview).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(ReviewError::NotEligible {
                order_id: OrderId::new(4)
            })
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(ReconcileError::OrderNotFound {
                session_id: "cs_1".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CheckoutError::ProductNotFound(ProductId::new(3))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(DirectoryError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response =
            AppError::Database(RepositoryError::DataCorruption("bad row 7".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::Ledger(LedgerError::Unavailable(RepositoryError::DataCorruption(
            "x".into(),
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
