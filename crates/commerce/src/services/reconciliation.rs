//! Payment reconciliation.
//!
//! Triggered by the success redirect and by gateway webhooks, possibly both at
//! once and possibly more than once each. The gateway is asked for the
//! session's real state every time; nothing the shopper's browser says is
//! trusted. Applying the same paid session twice is a no-op.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use modesta_core::OrderStatus;

use crate::error::{LedgerError, ReconcileError};
use crate::gateway::{GatewaySession, PaymentGateway};
use crate::models::{Customer, Order, OrderItem, OrderView, PaymentOutcome};
use crate::notify::{ConfirmationLine, Notification, Notifier, notify_detached};

use super::ledger::{OrderLedger, PaymentApplied};

/// The reconciled order, ready to show on the confirmation page.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    /// Whether this call moved the order to `paid`.
    pub transitioned: bool,
}

impl From<(OrderView, bool)> for ReconciliationResult {
    fn from((view, transitioned): (OrderView, bool)) -> Self {
        Self {
            order: view.order,
            items: view.items,
            customer: view.customer,
            transitioned,
        }
    }
}

/// Brings the ledger in line with the gateway.
#[derive(Clone)]
pub struct ReconciliationService {
    ledger: OrderLedger,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl ReconciliationService {
    #[must_use]
    pub fn new(
        ledger: OrderLedger,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
        }
    }

    /// Fetch the session from the gateway and apply it to the order.
    ///
    /// An unpaid session leaves the order untouched. A paid session moves a
    /// `pending` order to `paid` and is a no-op on an order already paid or
    /// fulfilled. A paid session on a cancelled order is rejected and reported.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::GatewayUnavailable` if the gateway cannot be
    /// reached (safe to retry), `ReconcileError::OrderNotFound` if no order
    /// references the session, and `ReconcileError::Ledger` if the order
    /// cannot take the payment (for example it was cancelled meanwhile).
    #[instrument(skip(self))]
    pub async fn reconcile(&self, session_id: &str) -> Result<ReconciliationResult, ReconcileError> {
        let session = self.gateway.get_session(session_id).await.map_err(|e| {
            warn!(error = %e, "Payment gateway unavailable during reconciliation");
            ReconcileError::GatewayUnavailable(e)
        })?;

        let view = match self.ledger.get_by_session_id(session_id).await {
            Ok(view) => view,
            Err(LedgerError::NotFound) => {
                report_missing_order(&session);
                return Err(ReconcileError::OrderNotFound {
                    session_id: session_id.to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !session.payment_status.is_settled() {
            debug!(order_id = %view.order.id, "Session not paid yet");
            return Ok((view, false).into());
        }

        if view.order.status.is_paid() {
            debug!(order_id = %view.order.id, status = %view.order.status, "Order already paid");
            return Ok((view, false).into());
        }
        if let Err(illegal) = view.order.status.transition(OrderStatus::Paid) {
            report_rejected_payment(&session, &view.order);
            return Err(LedgerError::IllegalTransition(illegal).into());
        }

        if let Some(amount) = session.amount_total
            && amount != view.order.total
        {
            warn!(
                order_id = %view.order.id,
                expected = %view.order.total,
                reported = %amount,
                "Gateway amount differs from order total"
            );
        }

        let outcome = PaymentOutcome {
            payment_intent_id: session.payment_reference.clone(),
            shipping_address: session.shipping.clone(),
            billing_address: session.billing.clone(),
        };
        let applied = self
            .ledger
            .apply_payment_outcome(session_id, &outcome, OrderStatus::Paid)
            .await?;

        let view = self.ledger.get_by_session_id(session_id).await?;
        let transitioned = applied == PaymentApplied::Applied;
        if transitioned {
            info!(order_id = %view.order.id, "Order paid");
            self.send_confirmation(&view);
        }

        Ok((view, transitioned).into())
    }

    fn send_confirmation(&self, view: &OrderView) {
        notify_detached(
            &self.notifier,
            Notification::OrderConfirmed {
                to: view.customer.email.clone(),
                customer_name: view.customer.name.clone(),
                order_id: view.order.id,
                total: view.order.total,
                lines: view
                    .items
                    .iter()
                    .map(|item| ConfirmationLine {
                        name: item.product_name.clone(),
                        quantity: item.quantity,
                    })
                    .collect(),
            },
        );
    }
}

/// A session the gateway knows about but we do not. Needs a human.
fn report_missing_order(session: &GatewaySession) {
    sentry::with_scope(
        |scope| {
            scope.set_tag("payment_session", &session.id);
            if let Some(reference) = &session.client_reference {
                scope.set_tag("client_reference", reference);
            }
        },
        || {
            error!(
                session_id = %session.id,
                client_reference = session.client_reference.as_deref().unwrap_or("-"),
                payment_status = ?session.payment_status,
                "Gateway session has no matching order"
            );
        },
    );
}

/// Money taken for an order that can no longer accept it. Needs a human.
fn report_rejected_payment(session: &GatewaySession, order: &Order) {
    sentry::with_scope(
        |scope| {
            scope.set_tag("payment_session", &session.id);
            scope.set_tag("order_id", order.id.to_string());
            scope.set_tag("order_status", order.status.as_str());
        },
        || {
            error!(
                session_id = %session.id,
                order_id = %order.id,
                status = %order.status,
                payment_reference = session.payment_reference.as_deref().unwrap_or("-"),
                "Paid gateway session for an order that cannot be paid"
            );
        },
    );
}
