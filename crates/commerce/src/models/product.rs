//! Catalog products as seen by checkout.

use chrono::{DateTime, Utc};
use serde::Serialize;

use modesta_core::{Price, ProductId};

/// A product (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Authoritative unit price; carts are always re-priced from this.
    pub price: Price,
    /// Inactive products cannot be bought.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
}
