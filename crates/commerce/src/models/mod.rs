//! Domain types for the order lifecycle.
//!
//! These are validated values: rows from the database and payloads from the
//! gateway are converted into them at the boundary and never passed around raw.

pub mod admin;
pub mod customer;
pub mod order;
pub mod product;
pub mod review;

pub use admin::{AdminUser, NewAdminUser};
pub use customer::{Customer, CustomerCredential, CustomerIdentity, CustomerProfile, NewCustomer};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderView, Page, PaymentOutcome,
    ShippingInfo,
};
pub use product::{NewProduct, Product};
pub use review::{NewReview, Review};
