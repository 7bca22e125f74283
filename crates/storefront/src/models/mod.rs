//! Types the storefront keeps in the shopper's session.

pub mod session;

pub use session::{CartItem, CurrentCustomer, SessionCart, Wishlist, keys as session_keys};
