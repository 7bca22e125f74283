//! Order ledger.
//!
//! The only writer of orders and line items. Status writes are
//! compare-and-set against the status the state machine was checked against;
//! a lost race is re-evaluated once against the fresh row, so concurrent
//! deliveries of the same event collapse into one transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use modesta_core::{Address, CustomerId, OrderId, OrderStatus, Price, Transition};

use crate::db::RepositoryError;
use crate::error::LedgerError;
use crate::models::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderView, Page, PaymentOutcome,
    ShippingInfo,
};
use crate::store::{CustomerStore, OrderStore};

/// Attempts at a conditional status write before giving up.
const CAS_ATTEMPTS: usize = 2;

/// Result of [`OrderLedger::apply_payment_outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentApplied {
    /// This call moved the order.
    Applied,
    /// The order was already in the target status.
    AlreadyApplied,
}

/// Result of [`OrderLedger::update_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order: Order,
    pub transition: Transition,
}

/// One page of orders plus the total matching the filter.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Orders and line items.
#[derive(Clone)]
pub struct OrderLedger {
    orders: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerStore>,
}

impl OrderLedger {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, customers: Arc<dyn CustomerStore>) -> Self {
        Self { orders, customers }
    }

    /// Create an order in `pending` with no payment session.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    #[instrument(skip(self, shipping_address, billing_address))]
    pub async fn create_pending_order(
        &self,
        customer_id: CustomerId,
        total: Price,
        shipping_address: Option<Address>,
        billing_address: Option<Address>,
    ) -> Result<Order, LedgerError> {
        let order = self
            .orders
            .insert_order(&NewOrder {
                customer_id,
                total,
                shipping_address,
                billing_address,
            })
            .await?;
        info!(order_id = %order.id, total = %order.total, "Pending order created");
        Ok(order)
    }

    /// Attach the gateway session to an order. Idempotent for the same id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AlreadyAttached` if the order already carries a
    /// different session, `LedgerError::SessionInUse` if another order carries
    /// this one, and `LedgerError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn attach_payment_session(
        &self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<(), LedgerError> {
        let attached = self
            .orders
            .set_payment_session(order_id, session_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => LedgerError::SessionInUse {
                    session_id: session_id.to_owned(),
                },
                other => other.into(),
            })?;
        if attached {
            return Ok(());
        }

        let order = self.orders.get(order_id).await?.ok_or(LedgerError::NotFound)?;
        match order.payment_session_id {
            Some(existing) if existing == session_id => Ok(()),
            Some(existing) => Err(LedgerError::AlreadyAttached { order_id, existing }),
            None => Err(LedgerError::Contended(order_id)),
        }
    }

    /// Write the re-priced line items of an order, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the items could not be written.
    pub async fn add_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, LedgerError> {
        Ok(self.orders.insert_items(order_id, items).await?)
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no such order exists.
    pub async fn get(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.orders.get(order_id).await?.ok_or(LedgerError::NotFound)
    }

    /// Order with its items and customer.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no such order exists.
    pub async fn view(&self, order_id: OrderId) -> Result<OrderView, LedgerError> {
        let order = self.get(order_id).await?;
        self.view_of(order).await
    }

    /// The order behind a gateway session, with its items and customer.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no order references the session.
    pub async fn get_by_session_id(&self, session_id: &str) -> Result<OrderView, LedgerError> {
        let order = self
            .orders
            .find_by_session(session_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        self.view_of(order).await
    }

    async fn view_of(&self, order: Order) -> Result<OrderView, LedgerError> {
        let items = self.orders.items(order.id).await?;
        let customer = self.customers.get(order.customer_id).await?.ok_or_else(|| {
            LedgerError::Unavailable(RepositoryError::DataCorruption(format!(
                "order {} references missing customer {}",
                order.id, order.customer_id
            )))
        })?;
        Ok(OrderView {
            order,
            items,
            customer,
        })
    }

    /// Move the order behind `session_id` to `target`, recording what the
    /// gateway reported. Only fields the outcome carries are written.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no order references the session and
    /// `LedgerError::IllegalTransition` if the current status does not allow it.
    #[instrument(skip(self, outcome))]
    pub async fn apply_payment_outcome(
        &self,
        session_id: &str,
        outcome: &PaymentOutcome,
        target: OrderStatus,
    ) -> Result<PaymentApplied, LedgerError> {
        let mut order = self
            .orders
            .find_by_session(session_id)
            .await?
            .ok_or(LedgerError::NotFound)?;

        for _ in 0..CAS_ATTEMPTS {
            if order.status.transition(target)? == Transition::AlreadyInState {
                debug!(order_id = %order.id, status = %target, "Payment outcome already applied");
                return Ok(PaymentApplied::AlreadyApplied);
            }

            if self
                .orders
                .apply_payment(session_id, order.status, target, outcome)
                .await?
            {
                info!(order_id = %order.id, from = %order.status, to = %target, "Payment outcome applied");
                return Ok(PaymentApplied::Applied);
            }

            order = self
                .orders
                .find_by_session(session_id)
                .await?
                .ok_or(LedgerError::NotFound)?;
        }

        warn!(order_id = %order.id, "Gave up applying payment outcome under contention");
        Err(LedgerError::Contended(order.id))
    }

    /// Move an order to `target` if the state machine allows it.
    ///
    /// Requesting the current status succeeds without a write.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::IllegalTransition` if the edge is not allowed and
    /// `LedgerError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<StatusChange, LedgerError> {
        let mut order = self.get(order_id).await?;

        for _ in 0..CAS_ATTEMPTS {
            let transition = order.status.transition(target)?;
            if transition == Transition::AlreadyInState {
                return Ok(StatusChange { order, transition });
            }

            if self
                .orders
                .compare_and_set_status(order_id, order.status, target)
                .await?
            {
                info!(order_id = %order_id, from = %order.status, to = %target, "Order status changed");
                let order = self.get(order_id).await?;
                return Ok(StatusChange { order, transition });
            }

            order = self.get(order_id).await?;
        }

        warn!(order_id = %order_id, "Gave up changing status under contention");
        Err(LedgerError::Contended(order_id))
    }

    /// Replace the carrier and tracking details of an order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the order does not exist.
    #[instrument(skip(self, shipping))]
    pub async fn update_shipping(
        &self,
        order_id: OrderId,
        shipping: &ShippingInfo,
    ) -> Result<Order, LedgerError> {
        let order = self
            .orders
            .update_shipping(order_id, shipping)
            .await?
            .ok_or(LedgerError::NotFound)?;
        info!(order_id = %order_id, "Shipping details updated");
        Ok(order)
    }

    /// Orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    pub async fn list(&self, filter: OrderFilter, page: Page) -> Result<OrderPage, LedgerError> {
        let orders = self.orders.list(filter, page).await?;
        let total = self.orders.count(filter).await?;
        Ok(OrderPage {
            orders,
            total,
            page: page.page(),
            per_page: page.per_page(),
        })
    }

    /// All orders of one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, LedgerError> {
        Ok(self.orders.list_for_customer(customer_id).await?)
    }

    /// Line items of an order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, LedgerError> {
        Ok(self.orders.items(order_id).await?)
    }

    /// Cancel `pending` orders without a payment session created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` if the store cannot be reached.
    #[instrument(skip(self))]
    pub async fn cancel_orphans(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError> {
        let cancelled = self.orders.cancel_orphans(cutoff).await?;
        if cancelled > 0 {
            info!(cancelled, "Cancelled orphaned pending orders");
        }
        Ok(cancelled)
    }
}
