//! Payment session gateway.
//!
//! The gateway hosts the payment page. We ask it to open a session for an
//! order, send the shopper there, and later ask it what happened. Its answer is
//! authoritative; the ledger is brought in line with it by reconciliation.

mod stripe;
pub mod webhook;

#[cfg(any(test, feature = "test-util"))]
mod scripted;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use modesta_core::{Address, Email, OrderId, Price};

pub use stripe::StripeGateway;
pub use webhook::{WebhookError, WebhookEvent, WebhookVerifier};

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedGateway;

/// Placeholder the gateway replaces with the session id in the success URL.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Hosted checkout provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session.
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession, GatewayError>;

    /// Fetch the current state of a session.
    async fn get_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError>;
}

/// Gateway for processes that never take payment (admin API, CLI).
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession, GatewayError> {
        Err(GatewayError::Disabled)
    }

    async fn get_session(&self, _session_id: &str) -> Result<GatewaySession, GatewayError> {
        Err(GatewayError::Disabled)
    }
}

/// Everything needed to open a session for one order.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub line_items: Vec<GatewayLineItem>,
    /// Must contain [`SESSION_ID_PLACEHOLDER`].
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Email,
}

/// A re-priced line item as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLineItem {
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// A session the shopper can be redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub hosted_url: String,
}

/// Payment state of a session as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    /// Fully discounted; treated as paid.
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Whether the order behind the session should be marked paid.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::NoPaymentRequired)
    }
}

/// Authoritative session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Payment intent id, once the gateway has one.
    pub payment_reference: Option<String>,
    pub shipping: Option<Address>,
    pub billing: Option<Address>,
    pub customer_email: Option<String>,
    pub amount_total: Option<Price>,
    /// The order id we passed when opening the session.
    pub client_reference: Option<String>,
}

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error.
    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API key was rejected.
    #[error("gateway rejected credentials")]
    Unauthorized,

    #[error("session {0} not found at gateway")]
    NotFound(String),

    /// The response did not have the expected shape.
    #[error("unexpected gateway response: {0}")]
    Parse(String),

    /// The request could not be expressed to the gateway.
    #[error("invalid gateway request: {0}")]
    InvalidRequest(String),

    /// This process was started without a payment gateway.
    #[error("payment gateway is not configured")]
    Disabled,
}

impl GatewayError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized
            | Self::NotFound(_)
            | Self::Parse(_)
            | Self::InvalidRequest(_)
            | Self::Disabled => false,
        }
    }
}
