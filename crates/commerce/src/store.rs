//! Storage traits the services are written against.
//!
//! Each trait maps to one aggregate. [`crate::db::PgStore`] implements all of
//! them on a `PostgreSQL` pool; [`crate::memory::MemoryStore`] implements them in
//! memory for tests. Services hold `Arc<dyn …>` handles, bundled in [`Stores`].
//!
//! Writes that guard a state change (`set_payment_session`, `apply_payment`,
//! `compare_and_set_status`) are single conditional statements and report
//! whether a row changed. Deciding what a zero-row result means is left to the
//! ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use modesta_core::{CustomerId, Email, OrderId, OrderStatus, ProductId};

use crate::db::RepositoryError;
use crate::models::{
    AdminUser, Customer, CustomerCredential, CustomerProfile, NewAdminUser, NewCustomer, NewOrder,
    NewOrderItem, NewProduct, NewReview, Order, OrderFilter, OrderItem, Page, PaymentOutcome,
    Product, Review, ShippingInfo,
};

/// Customers and their login credentials.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Case-insensitive lookup, including soft-deleted customers.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError>;

    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Insert a customer together with its credential.
    ///
    /// Returns `RepositoryError::Conflict` when the email is already taken.
    async fn insert(
        &self,
        customer: &NewCustomer,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError>;

    /// Overwrite the profile fields and clear any soft delete.
    async fn update_profile(
        &self,
        id: CustomerId,
        profile: &CustomerProfile,
    ) -> Result<Customer, RepositoryError>;

    /// Active customers, newest first.
    async fn list(&self, page: Page) -> Result<Vec<Customer>, RepositoryError>;

    /// Returns `false` if the customer does not exist or is already deleted.
    async fn soft_delete(&self, id: CustomerId) -> Result<bool, RepositoryError>;

    async fn credential(
        &self,
        id: CustomerId,
    ) -> Result<Option<CustomerCredential>, RepositoryError>;

    /// Replace the password hash and clear `must_reset`.
    async fn set_password(&self, id: CustomerId, password_hash: &str)
    -> Result<(), RepositoryError>;
}

/// Orders and line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a `pending` order with no payment session.
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Set the session id unless a different one is already set.
    ///
    /// Returns `true` if the row now carries `session_id`.
    async fn set_payment_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<bool, RepositoryError>;

    /// Insert all items in one transaction.
    async fn insert_items(
        &self,
        id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError>;

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;

    /// `UPDATE … SET status = to WHERE id = $1 AND status = expected`.
    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;

    /// Move the order behind `session_id` from `expected` to `to`, writing the
    /// payment reference and address snapshots in the same statement.
    async fn apply_payment(
        &self,
        session_id: &str,
        expected: OrderStatus,
        to: OrderStatus,
        outcome: &PaymentOutcome,
    ) -> Result<bool, RepositoryError>;

    async fn update_shipping(
        &self,
        id: OrderId,
        shipping: &ShippingInfo,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Newest first.
    async fn list(&self, filter: OrderFilter, page: Page) -> Result<Vec<Order>, RepositoryError>;

    async fn count(&self, filter: OrderFilter) -> Result<u64, RepositoryError>;

    async fn list_for_customer(&self, customer_id: CustomerId)
    -> Result<Vec<Order>, RepositoryError>;

    /// Cancel `pending` orders without a session created before `cutoff`.
    async fn cancel_orphans(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Fulfilled orders of `customer_id` that contain `product_id`.
    async fn fulfilled_orders_containing(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Vec<OrderId>, RepositoryError>;
}

/// Catalog lookups used for re-pricing.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products among `ids` that exist; missing ids are simply absent.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn insert(&self, product: &NewProduct) -> Result<Product, RepositoryError>;
}

/// Reviews.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Whether `customer_id` has reviewed `product_id` through any order.
    async fn exists_for(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Returns `RepositoryError::Conflict` on a duplicate (customer, product, order).
    async fn insert(&self, review: &NewReview) -> Result<Review, RepositoryError>;

    async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError>;
}

/// Back-office users.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_by_token_hash(&self, token_hash: &str)
    -> Result<Option<AdminUser>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` when the email is already taken.
    async fn insert(&self, admin: &NewAdminUser) -> Result<AdminUser, RepositoryError>;
}

/// One handle per aggregate, shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub customers: Arc<dyn CustomerStore>,
    pub orders: Arc<dyn OrderStore>,
    pub products: Arc<dyn ProductStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub admins: Arc<dyn AdminStore>,
}

impl Stores {
    /// Every store backed by one value implementing all of the traits.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: CustomerStore + OrderStore + ProductStore + ReviewStore + AdminStore + 'static,
    {
        Self {
            customers: store.clone(),
            orders: store.clone(),
            products: store.clone(),
            reviews: store.clone(),
            admins: store,
        }
    }

    /// Stores backed by a `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_shared(Arc::new(crate::db::PgStore::new(pool)))
    }
}
