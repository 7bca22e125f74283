//! Session-related types.
//!
//! The cart and wishlist live only in the session. Cart items carry a name and
//! price snapshot for display; checkout re-prices everything from the catalog.

use serde::{Deserialize, Serialize};

use modesta_commerce::services::{CartLine, MAX_LINE_QUANTITY};
use modesta_core::{CurrencyCode, CustomerId, Email, Price, ProductId};

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    /// Logged in with a one-time credential that must be replaced.
    pub must_reset: bool,
}

/// A cart line as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCart {
    pub items: Vec<CartItem>,
}

impl SessionCart {
    /// Add an item, merging with an existing line for the same product.
    /// A merged line never exceeds [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, item: CartItem) {
        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .saturating_add(item.quantity)
                    .min(MAX_LINE_QUANTITY);
                line.name = item.name;
                line.unit_price = item.unit_price;
            }
            None => self.items.push(item),
        }
    }

    /// Set the quantity of a line; zero removes it. Returns whether the line existed.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.items.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns whether it existed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.product_id != product_id);
        self.items.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |count, line| count.saturating_add(line.quantity))
    }

    /// Display subtotal from the snapshot prices. `None` if lines disagree on currency.
    #[must_use]
    pub fn subtotal(&self, currency: CurrencyCode) -> Option<Price> {
        self.items.iter().try_fold(Price::zero(currency), |total, line| {
            total.checked_add(line.unit_price.times(line.quantity))
        })
    }

    /// Lines to submit at checkout.
    #[must_use]
    pub fn checkout_lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|line| CartLine {
                product_id: line.product_id,
                quantity: i64::from(line.quantity),
                name: Some(line.name.clone()),
                unit_price: Some(line.unit_price.amount),
            })
            .collect()
    }
}

/// Products saved for later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    pub product_ids: Vec<ProductId>,
}

impl Wishlist {
    /// Add a product. Returns `false` if it was already saved.
    pub fn add(&mut self, product_id: ProductId) -> bool {
        if self.product_ids.contains(&product_id) {
            return false;
        }
        self.product_ids.push(product_id);
        true
    }

    /// Remove a product. Returns whether it was saved.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| *id != product_id);
        self.product_ids.len() != before
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the shopper's cart.
    pub const CART: &str = "cart";

    /// Key for the shopper's wishlist.
    pub const WISHLIST: &str = "wishlist";
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: i64, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Price::new(Decimal::new(cents, 2), CurrencyCode::USD),
            quantity,
        }
    }

    #[test]
    fn test_add_merges_lines() {
        let mut cart = SessionCart::default();
        cart.add(item(1, 10_000, 1));
        cart.add(item(2, 2_500, 2));
        cart.add(item(1, 10_000, 1));

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.item_count(), 4);
        assert_eq!(
            cart.subtotal(CurrencyCode::USD),
            Some(Price::new(Decimal::new(25_000, 2), CurrencyCode::USD))
        );
    }

    #[test]
    fn test_merged_line_is_capped() {
        let mut cart = SessionCart::default();
        cart.add(item(1, 10_000, 600));
        cart.add(item(1, 10_000, 600));

        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = SessionCart::default();
        cart.add(item(1, 10_000, 3));

        assert!(cart.set_quantity(ProductId::new(1), 5));
        assert_eq!(cart.items[0].quantity, 5);
        assert!(!cart.set_quantity(ProductId::new(9), 1));
        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert!(cart.is_empty());
        assert!(!cart.remove(ProductId::new(1)));
    }

    #[test]
    fn test_checkout_lines_carry_quantities() {
        let mut cart = SessionCart::default();
        cart.add(item(7, 4_999, 2));
        let lines = cart.checkout_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, ProductId::new(7));
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_wishlist_dedupes() {
        let mut wishlist = Wishlist::default();
        assert!(wishlist.add(ProductId::new(3)));
        assert!(!wishlist.add(ProductId::new(3)));
        assert!(wishlist.remove(ProductId::new(3)));
        assert!(wishlist.product_ids.is_empty());
    }
}
