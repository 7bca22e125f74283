//! Stripe Checkout client.
//!
//! Sessions are created with form-encoded `POST /v1/checkout/sessions` and read
//! back with `GET /v1/checkout/sessions/{id}`. Amounts travel in minor units.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use modesta_core::{Address, CurrencyCode, Price};

use super::{
    CheckoutSessionRequest, CreatedSession, GatewayError, GatewaySession, PaymentGateway,
    PaymentStatus,
};
use crate::config::StripeConfig;

/// Payment gateway backed by Stripe Checkout.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        })
    }

    /// Turn a non-2xx response into a `GatewayError`.
    async fn error_from(response: reqwest::Response, session_id: Option<&str>) -> GatewayError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return GatewayError::Unauthorized;
        }
        if status == StatusCode::NOT_FOUND
            && let Some(id) = session_id
        {
            return GatewayError::NotFound(id.to_owned());
        }

        let message = response
            .json::<StripeErrorBody>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_owned());

        GatewayError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Form fields for a checkout session.
///
/// # Errors
///
/// Returns `GatewayError::InvalidRequest` if a price cannot be expressed in
/// minor units.
fn session_form(request: &CheckoutSessionRequest) -> Result<Vec<(String, String)>, GatewayError> {
    let mut form = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        (
            "customer_email".to_owned(),
            request.customer_email.as_str().to_owned(),
        ),
        ("client_reference_id".to_owned(), request.order_id.to_string()),
        ("metadata[order_id]".to_owned(), request.order_id.to_string()),
        ("billing_address_collection".to_owned(), "required".to_owned()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let unit_amount = item.unit_price.to_minor_units().ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "price {} of {} has sub-cent precision",
                item.unit_price, item.name
            ))
        })?;
        let prefix = format!("line_items[{i}]");
        form.extend([
            (
                format!("{prefix}[price_data][currency]"),
                item.unit_price.currency_code.code().to_ascii_lowercase(),
            ),
            (
                format!("{prefix}[price_data][unit_amount]"),
                unit_amount.to_string(),
            ),
            (
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ),
            (format!("{prefix}[quantity]"), item.quantity.to_string()),
        ]);
    }

    Ok(form)
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession, GatewayError> {
        let form = session_form(request)?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, None).await);
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        let hosted_url = session
            .url
            .ok_or_else(|| GatewayError::Parse(format!("session {} has no url", session.id)))?;

        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(CreatedSession {
            session_id: session.id,
            hosted_url,
        })
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, Some(session_id)).await);
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        session.try_into()
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

/// The subset of a Stripe `checkout.session` object we read.
#[derive(Debug, Deserialize)]
pub(super) struct StripeSession {
    pub(super) id: String,
    #[serde(default)]
    url: Option<String>,
    payment_status: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    shipping_details: Option<StripeShipping>,
    #[serde(default)]
    collected_information: Option<StripeCollectedInformation>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<StripeAddress>,
}

#[derive(Debug, Deserialize)]
struct StripeCollectedInformation {
    #[serde(default)]
    shipping_details: Option<StripeShipping>,
}

#[derive(Debug, Deserialize)]
struct StripeShipping {
    #[serde(default)]
    name: Option<String>,
    address: StripeAddress,
}

#[derive(Debug, Deserialize)]
struct StripeAddress {
    #[serde(default)]
    line1: Option<String>,
    #[serde(default)]
    line2: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl StripeAddress {
    fn into_address(self, name: Option<String>) -> Option<Address> {
        let address = Address {
            name,
            line1: self.line1.unwrap_or_default(),
            line2: self.line2.filter(|l| !l.is_empty()),
            city: self.city.unwrap_or_default(),
            region: self.state.filter(|s| !s.is_empty()),
            postal_code: self.postal_code.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
        };
        (!address.is_blank()).then_some(address)
    }
}

impl TryFrom<StripeSession> for GatewaySession {
    type Error = GatewayError;

    fn try_from(session: StripeSession) -> Result<Self, Self::Error> {
        let payment_status = match session.payment_status.as_str() {
            "paid" => PaymentStatus::Paid,
            "unpaid" => PaymentStatus::Unpaid,
            "no_payment_required" => PaymentStatus::NoPaymentRequired,
            other => {
                return Err(GatewayError::Parse(format!(
                    "unknown payment_status {other:?} on session {}",
                    session.id
                )));
            }
        };

        let amount_total = match (session.amount_total, session.currency.as_deref()) {
            (Some(amount), Some(code)) => match code.parse::<CurrencyCode>() {
                Ok(currency) => Some(Price::from_minor_units(amount, currency)),
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Session in unsupported currency");
                    None
                }
            },
            _ => None,
        };

        let shipping = session
            .collected_information
            .and_then(|c| c.shipping_details)
            .or(session.shipping_details)
            .and_then(|s| s.address.into_address(s.name));

        let (customer_email, billing) = match session.customer_details {
            Some(details) => {
                let billing = details
                    .address
                    .and_then(|a| a.into_address(details.name));
                (details.email, billing)
            }
            None => (None, None),
        };

        Ok(Self {
            id: session.id,
            payment_status,
            payment_reference: session.payment_intent,
            shipping,
            billing,
            customer_email,
            amount_total,
            client_reference: session.client_reference_id,
        })
    }
}
