//! Errors returned by the order lifecycle services.
//!
//! Each service has its own enum so callers can match on exactly the outcomes
//! that service can produce. The HTTP layers map them onto status codes:
//! validation → 400, conflict → 409, not found → 404, transient → 502/503.

use thiserror::Error;

use modesta_core::{
    CustomerId, EmailError, IllegalTransition, OrderId, ProductId, RatingError,
};

use crate::db::RepositoryError;
use crate::gateway::GatewayError;

/// Errors from the customer directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The email address is malformed. Nothing was written.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The name is empty.
    #[error("customer name cannot be empty")]
    MissingName,

    #[error("customer {0} not found")]
    NotFound(CustomerId),

    /// Unknown email, deleted customer, or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The password does not meet the minimum length.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Hashing or verifying a credential failed.
    #[error("credential error: {0}")]
    Credential(String),

    /// The customer store could not be reached.
    #[error("customer store unavailable: {0}")]
    Unavailable(#[source] RepositoryError),
}

/// Errors from the order ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("order not found")]
    NotFound,

    /// The order already carries a different payment session.
    #[error("order {order_id} already has payment session {existing}")]
    AlreadyAttached { order_id: OrderId, existing: String },

    /// The session id is already attached to a different order.
    #[error("payment session {session_id} belongs to another order")]
    SessionInUse { session_id: String },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// The order kept changing underneath a compare-and-set.
    #[error("order {0} was modified concurrently")]
    Contended(OrderId),

    /// The order store could not be reached.
    #[error("order store unavailable: {0}")]
    Unavailable(#[source] RepositoryError),
}

impl From<RepositoryError> for LedgerError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Unavailable(other),
        }
    }
}

/// Errors from starting a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error(
        "quantity for product {product_id} must be between 1 and {}",
        crate::services::MAX_LINE_QUANTITY
    )]
    InvalidQuantity { product_id: ProductId },

    /// The re-priced cart is larger than an order can hold.
    #[error("order total {total} exceeds the maximum of {}", crate::services::MAX_ORDER_TOTAL)]
    TotalTooLarge { total: modesta_core::Price },

    /// Catalog prices of the cart are in more than one currency, or not in the
    /// store currency.
    #[error("product {product_id} is not sold in {expected}")]
    CurrencyMismatch {
        product_id: ProductId,
        expected: modesta_core::CurrencyCode,
    },

    /// The product does not exist or is not for sale.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Customer(#[from] DirectoryError),

    /// The catalog could not be read.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] RepositoryError),

    /// No order was created and no payment session was requested.
    #[error("could not create order: {0}")]
    OrderCreationFailed(#[source] LedgerError),

    /// The order exists in `pending` without a session.
    #[error("payment gateway unavailable for order {order_id}: {source}")]
    GatewayUnavailable {
        order_id: OrderId,
        #[source]
        source: GatewayError,
    },

    /// The session exists at the gateway but the order does not reference it.
    #[error("could not attach session {session_id} to order {order_id}: {source}")]
    SessionAttachFailed {
        order_id: OrderId,
        session_id: String,
        #[source]
        source: LedgerError,
    },

    /// The order and session exist but the line items were not written.
    #[error("line items for order {order_id} were not saved: {source}")]
    ItemsIncomplete {
        order_id: OrderId,
        session_id: String,
        #[source]
        source: LedgerError,
    },
}

impl CheckoutError {
    /// Whether the caller supplied bad input (as opposed to an infrastructure failure).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::InvalidQuantity { .. }
                | Self::TotalTooLarge { .. }
                | Self::CurrencyMismatch { .. }
                | Self::Customer(
                    DirectoryError::InvalidEmail(_) | DirectoryError::MissingName
                )
        )
    }
}

/// Errors from reconciling a payment session.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The gateway could not be reached. Safe to retry.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(#[source] GatewayError),

    /// No local order references this session.
    #[error("no order for payment session {session_id}")]
    OrderNotFound { session_id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from the review evaluator.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    /// The order is not a fulfilled order of this customer containing the product.
    #[error("not eligible to review this product with order {order_id}")]
    NotEligible { order_id: OrderId },

    #[error("this product has already been reviewed for this order")]
    DuplicateReview,

    #[error("review comment must be at most {max} characters")]
    CommentTooLong { max: usize },

    #[error("review store unavailable: {0}")]
    Unavailable(#[source] RepositoryError),
}

impl From<RepositoryError> for ReviewError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(_) => Self::DuplicateReview,
            other => Self::Unavailable(other),
        }
    }
}

/// Errors from back-office operations.
#[derive(Debug, Error)]
pub enum BackOfficeError {
    #[error(transparent)]
    Forbidden(#[from] crate::auth::Forbidden),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Bad input that is not covered by a domain error.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}
