//! Modesta Core - Shared types library.
//!
//! This crate provides common types used across all Modesta components:
//! - `commerce` - Order lifecycle (checkout, reconciliation, reviews)
//! - `storefront` - Public-facing shop API
//! - `admin` - Back-office API for orders and customers
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, ratings,
//!   addresses, and the order status state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
