//! Core types for Modesta.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod price;
pub mod rating;
pub mod status;

pub use address::Address;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, CurrencyCodeError, Price};
pub use rating::{Rating, RatingError};
pub use status::*;
