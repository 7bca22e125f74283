//! Checkout orchestration.
//!
//! Turns a cart into a pending order with a payment session, in this order:
//!
//! 1. validate the cart and contact details (no writes)
//! 2. re-price every line from the catalog (no writes)
//! 3. resolve the customer
//! 4. create the `pending` order, then mail a first-time customer's credential
//! 5. open a gateway session
//! 6. attach the session to the order
//! 7. write the line items
//!
//! A failure at step 5 or later leaves a `pending` order behind. Orders that
//! never got a session are cancelled by the orphan sweep; the others stay
//! reconcilable through their session id.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use modesta_core::{Address, Email, OrderId, Price, ProductId};

use crate::config::CommerceConfig;
use crate::error::{CheckoutError, DirectoryError};
use crate::gateway::{CheckoutSessionRequest, PaymentGateway};
use crate::models::CustomerIdentity;
use crate::notify::{Notification, Notifier, notify_detached};

use super::catalog::Catalog;
use super::directory::CustomerDirectory;
use super::ledger::OrderLedger;

/// A cart line as submitted by the browser.
///
/// `name` and `unit_price` are accepted so the storefront can post its cart
/// as-is, but they are never used.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Everything the shopper submits at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    pub customer: CustomerIdentity,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
}

/// Where to send the shopper next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    pub order_id: OrderId,
    pub session_id: String,
    pub redirect_url: String,
    pub total: Price,
}

/// Starts checkouts.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    catalog: Catalog,
    directory: CustomerDirectory,
    ledger: OrderLedger,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: CommerceConfig,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        catalog: Catalog,
        directory: CustomerDirectory,
        ledger: OrderLedger,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: CommerceConfig,
    ) -> Self {
        Self {
            catalog,
            directory,
            ledger,
            gateway,
            notifier,
            config,
        }
    }

    /// Create a pending order for the cart and open a payment session for it.
    ///
    /// # Errors
    ///
    /// Validation errors (`EmptyCart`, `InvalidQuantity`, invalid contact
    /// details) are returned before anything is written. See [`CheckoutError`]
    /// for what each later failure leaves behind.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn start_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutStarted, CheckoutError> {
        let lines = validate_lines(&request.lines)?;
        Email::parse(&request.customer.email).map_err(DirectoryError::from)?;
        if request.customer.name.trim().is_empty() {
            return Err(DirectoryError::MissingName.into());
        }

        let cart = self.catalog.reprice(&lines).await?;

        let resolved = self.directory.find_or_create(&request.customer).await?;
        let customer = &resolved.customer;

        let shipping_address = request
            .shipping_address
            .clone()
            .filter(|a| !a.is_blank())
            .or_else(|| customer.address.clone());
        let billing_address = request.billing_address.clone().filter(|a| !a.is_blank());

        let order = self
            .ledger
            .create_pending_order(customer.id, cart.total, shipping_address, billing_address)
            .await
            .map_err(CheckoutError::OrderCreationFailed)?;
        let order_id = order.id;

        if let Some(credential) = resolved.one_time_credential.clone() {
            notify_detached(
                &self.notifier,
                Notification::WelcomeCredential {
                    to: customer.email.clone(),
                    customer_name: customer.name.clone(),
                    credential,
                },
            );
        }

        let session = self
            .gateway
            .create_session(&CheckoutSessionRequest {
                order_id,
                line_items: cart.gateway_lines(),
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(),
                customer_email: customer.email.clone(),
            })
            .await
            .map_err(|source| {
                warn!(order_id = %order_id, error = %source, "Payment session could not be created");
                CheckoutError::GatewayUnavailable { order_id, source }
            })?;

        if let Err(source) = self
            .ledger
            .attach_payment_session(order_id, &session.session_id)
            .await
        {
            error!(
                order_id = %order_id,
                session_id = %session.session_id,
                error = %source,
                "Payment session created but not attached to order"
            );
            return Err(CheckoutError::SessionAttachFailed {
                order_id,
                session_id: session.session_id,
                source,
            });
        }

        if let Err(source) = self.ledger.add_items(order_id, &cart.items).await {
            error!(
                order_id = %order_id,
                session_id = %session.session_id,
                error = %source,
                "Order line items were not saved"
            );
            return Err(CheckoutError::ItemsIncomplete {
                order_id,
                session_id: session.session_id,
                source,
            });
        }

        info!(
            order_id = %order_id,
            customer_id = %customer.id,
            session_id = %session.session_id,
            total = %cart.total,
            "Checkout started"
        );

        Ok(CheckoutStarted {
            order_id,
            session_id: session.session_id,
            redirect_url: session.hosted_url,
            total: cart.total,
        })
    }
}

/// Largest quantity accepted on a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Check the cart shape and convert quantities.
fn validate_lines(lines: &[CartLine]) -> Result<Vec<(ProductId, u32)>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    lines
        .iter()
        .map(|line| {
            u32::try_from(line.quantity)
                .ok()
                .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
                .map(|q| (line.product_id, q))
                .ok_or(CheckoutError::InvalidQuantity {
                    product_id: line.product_id,
                })
        })
        .collect()
}
