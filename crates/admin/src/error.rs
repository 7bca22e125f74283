//! Unified error handling for admin.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use modesta_commerce::db::RepositoryError;
use modesta_commerce::{BackOfficeError, DirectoryError, Forbidden, LedgerError};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authorization, validation, and ledger failures from back-office operations.
    #[error(transparent)]
    BackOffice(#[from] BackOfficeError),
}

impl From<Forbidden> for AppError {
    fn from(err: Forbidden) -> Self {
        Self::BackOffice(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BackOffice(e) => match e {
                BackOfficeError::Forbidden(Forbidden::Unauthenticated) => StatusCode::UNAUTHORIZED,
                BackOfficeError::Forbidden(Forbidden::InsufficientRole { .. }) => {
                    StatusCode::FORBIDDEN
                }
                BackOfficeError::Ledger(e) => ledger_status(e),
                BackOfficeError::Directory(e) => directory_status(e),
                BackOfficeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                BackOfficeError::Store(e) => repository_status(e),
            },
        }
    }
}

const fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotFound => StatusCode::NOT_FOUND,
        LedgerError::AlreadyAttached { .. }
        | LedgerError::SessionInUse { .. }
        | LedgerError::IllegalTransition(_)
        | LedgerError::Contended(_) => StatusCode::CONFLICT,
        LedgerError::Unavailable(e) => repository_status(e),
    }
}

const fn directory_status(e: &DirectoryError) -> StatusCode {
    match e {
        DirectoryError::InvalidEmail(_)
        | DirectoryError::MissingName
        | DirectoryError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
        DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
        DirectoryError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DirectoryError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DirectoryError::Unavailable(e) => repository_status(e),
    }
}

const fn repository_status(e: &RepositoryError) -> StatusCode {
    match e {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        RepositoryError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
            s if s.is_server_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an admin user.
pub fn set_sentry_user(admin_user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
