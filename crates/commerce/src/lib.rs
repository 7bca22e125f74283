//! Modesta order lifecycle.
//!
//! Everything between "a shopper submitted a cart" and "an admin marked the
//! order fulfilled" lives here:
//!
//! - [`services::CustomerDirectory`] resolves checkout contact details to a customer
//! - [`services::OrderLedger`] owns orders, line items, and status writes
//! - [`services::CheckoutOrchestrator`] opens a payment session for a new order
//! - [`services::ReconciliationService`] applies gateway truth to the ledger
//! - [`services::ReviewEligibility`] decides who may review what
//! - [`services::BackOffice`] is the admin surface, gated by [`auth::AuthorizationGate`]
//!
//! Storage sits behind the traits in [`store`]; [`db`] implements them for
//! `PostgreSQL`. The payment provider sits behind [`gateway::PaymentGateway`]
//! with a Stripe Checkout implementation.
//!
//! # Migrations
//!
//! Migrations live in `crates/commerce/migrations/` and run via:
//! ```bash
//! cargo run -p modesta-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod services;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use auth::{AuthorizationGate, Caller, Forbidden};
pub use config::{CommerceConfig, ConfigError, ProfileMergePolicy};
pub use error::{
    BackOfficeError, CheckoutError, DirectoryError, LedgerError, ReconcileError, ReviewError,
};
pub use services::Commerce;
pub use store::Stores;

/// Embedded schema migrations for the `shop` schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
