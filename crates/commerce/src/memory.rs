//! In-memory implementation of the storage traits.
//!
//! Each conditional write takes the lock once and checks its guard inside it,
//! which gives the same single-statement atomicity the `PostgreSQL` queries rely
//! on. Used by unit tests and the cross-crate scenario tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use modesta_core::{
    AdminUserId, CustomerId, Email, OrderId, OrderItemId, OrderStatus, ProductId, ReviewId,
};

use crate::db::RepositoryError;
use crate::models::{
    AdminUser, Customer, CustomerCredential, CustomerProfile, NewAdminUser, NewCustomer, NewOrder,
    NewOrderItem, NewProduct, NewReview, Order, OrderFilter, OrderItem, Page, PaymentOutcome,
    Product, Review, ShippingInfo,
};
use crate::store::{AdminStore, CustomerStore, OrderStore, ProductStore, ReviewStore};

/// All storage traits over `HashMap`s behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    customers: Vec<Customer>,
    credentials: HashMap<CustomerId, CustomerCredential>,
    products: Vec<Product>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    reviews: Vec<Review>,
    admins: Vec<(AdminUser, String)>,
    fail_item_inserts: bool,
    unavailable: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the tables and fail if the store has been marked unavailable.
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.check_available()?;
        Ok(tables)
    }

    /// Make every operation fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }

    /// Make `insert_items` fail (after validating nothing was written).
    pub fn fail_item_inserts(&self, fail: bool) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_item_inserts = fail;
    }

    /// Backdate an order, for sweep tests.
    pub fn set_created_at(&self, id: OrderId, created_at: DateTime<Utc>) {
        if let Ok(mut tables) = self.tables()
            && let Some(order) = tables.order_mut(id)
        {
            order.created_at = created_at;
        }
    }

    /// Force an order into a status without going through the state machine.
    pub fn force_status(&self, id: OrderId, status: OrderStatus) {
        if let Ok(mut tables) = self.tables()
            && let Some(order) = tables.order_mut(id)
        {
            order.status = status;
        }
    }

    /// Deactivate a product.
    pub fn deactivate_product(&self, id: ProductId) {
        if let Ok(mut tables) = self.tables()
            && let Some(product) = tables.products.iter_mut().find(|p| p.id == id)
        {
            product.active = false;
        }
    }
}

fn paginate<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    rows.iter()
        .skip(offset)
        .take(page.per_page() as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .customers
            .iter()
            .find(|c| c.email.same_mailbox(email))
            .cloned())
    }

    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(
        &self,
        customer: &NewCustomer,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .customers
            .iter()
            .any(|c| c.email.same_mailbox(&customer.email))
        {
            return Err(RepositoryError::Conflict(
                "email already registered".to_owned(),
            ));
        }

        let now = Utc::now();
        let record = Customer {
            id: CustomerId::new(tables.next_id()),
            name: customer.profile.name.clone(),
            email: customer.email.clone(),
            phone: customer.profile.phone.clone(),
            address: customer.profile.address.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.credentials.insert(
            record.id,
            CustomerCredential {
                customer_id: record.id,
                password_hash: password_hash.to_owned(),
                must_reset: true,
            },
        );
        tables.customers.push(record.clone());
        Ok(record)
    }

    async fn update_profile(
        &self,
        id: CustomerId,
        profile: &CustomerProfile,
    ) -> Result<Customer, RepositoryError> {
        let mut tables = self.tables()?;
        let customer = tables
            .customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        customer.name.clone_from(&profile.name);
        customer.phone.clone_from(&profile.phone);
        customer.address.clone_from(&profile.address);
        customer.deleted_at = None;
        customer.updated_at = Utc::now();
        Ok(customer.clone())
    }

    async fn list(&self, page: Page) -> Result<Vec<Customer>, RepositoryError> {
        let tables = self.tables()?;
        let mut active: Vec<Customer> = tables
            .customers
            .iter()
            .filter(|c| !c.is_deleted())
            .cloned()
            .collect();
        active.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(&active, page))
    }

    async fn soft_delete(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        match tables
            .customers
            .iter_mut()
            .find(|c| c.id == id && !c.is_deleted())
        {
            Some(customer) => {
                customer.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn credential(
        &self,
        id: CustomerId,
    ) -> Result<Option<CustomerCredential>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.credentials.get(&id).cloned())
    }

    async fn set_password(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let credential = tables
            .credentials
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(&mut credential.password_hash);
        credential.must_reset = false;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let record = Order {
            id: OrderId::new(tables.next_id()),
            customer_id: order.customer_id,
            payment_session_id: None,
            payment_intent_id: None,
            status: OrderStatus::Pending,
            total: order.total,
            shipping_address: order.shipping_address.clone(),
            billing_address: order.billing_address.clone(),
            shipping: ShippingInfo::default(),
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(record.clone());
        Ok(record)
    }

    async fn set_payment_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .orders
            .iter()
            .any(|o| o.id != id && o.payment_session_id.as_deref() == Some(session_id))
        {
            return Err(RepositoryError::Conflict(
                "payment session belongs to another order".to_owned(),
            ));
        }
        let Some(order) = tables.order_mut(id) else {
            return Ok(false);
        };
        match order.payment_session_id.as_deref() {
            None => {
                order.payment_session_id = Some(session_id.to_owned());
                order.updated_at = Utc::now();
                Ok(true)
            }
            Some(existing) => Ok(existing == session_id),
        }
    }

    async fn insert_items(
        &self,
        id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.fail_item_inserts {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        if !tables.orders.iter().any(|o| o.id == id) {
            return Err(RepositoryError::NotFound);
        }

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            inserted.push(OrderItem {
                id: OrderItemId::new(tables.next_id()),
                order_id: id,
                product_id: Some(item.product_id),
                product_name: item.product_name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
            });
        }
        tables.items.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.payment_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.order_id == id)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        match tables.order_mut(id) {
            Some(order) if order.status == expected => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_payment(
        &self,
        session_id: &str,
        expected: OrderStatus,
        to: OrderStatus,
        outcome: &PaymentOutcome,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let Some(order) = tables.orders.iter_mut().find(|o| {
            o.payment_session_id.as_deref() == Some(session_id) && o.status == expected
        }) else {
            return Ok(false);
        };

        order.status = to;
        if outcome.payment_intent_id.is_some() {
            order.payment_intent_id.clone_from(&outcome.payment_intent_id);
        }
        if outcome.shipping_address.is_some() {
            order.shipping_address.clone_from(&outcome.shipping_address);
        }
        if outcome.billing_address.is_some() {
            order.billing_address.clone_from(&outcome.billing_address);
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_shipping(
        &self,
        id: OrderId,
        shipping: &ShippingInfo,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables()?;
        Ok(tables.order_mut(id).map(|order| {
            order.shipping = shipping.clone();
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn list(&self, filter: OrderFilter, page: Page) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables()?;
        let mut matching: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(&matching, page))
    }

    async fn count(&self, filter: OrderFilter) -> Result<u64, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .orders
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .count() as u64)
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables()?;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn cancel_orphans(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables()?;
        let mut cancelled = 0;
        for order in tables.orders.iter_mut().filter(|o| {
            o.status == OrderStatus::Pending
                && o.payment_session_id.is_none()
                && o.created_at < cutoff
        }) {
            order.status = OrderStatus::Cancelled;
            order.updated_at = Utc::now();
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn fulfilled_orders_containing(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id && o.status == OrderStatus::Fulfilled)
            .filter(|o| {
                tables
                    .items
                    .iter()
                    .any(|i| i.order_id == o.id && i.product_id == Some(product_id))
            })
            .map(|o| o.id)
            .collect())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn insert(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let record = Product {
            id: ProductId::new(tables.next_id()),
            name: product.name.clone(),
            price: product.price,
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.products.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn exists_for(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .reviews
            .iter()
            .any(|r| r.customer_id == customer_id && r.product_id == product_id))
    }

    async fn insert(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.reviews.iter().any(|r| {
            r.customer_id == review.customer_id
                && r.product_id == review.product_id
                && r.order_id == review.order_id
        }) {
            return Err(RepositoryError::Conflict("review already exists".to_owned()));
        }

        let record = Review {
            id: ReviewId::new(tables.next_id()),
            customer_id: review.customer_id,
            product_id: review.product_id,
            order_id: review.order_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        tables.reviews.push(record.clone());
        Ok(record)
    }

    async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let tables = self.tables()?;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(reviews)
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AdminUser>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .admins
            .iter()
            .find(|(_, hash)| hash == token_hash)
            .map(|(admin, _)| admin.clone()))
    }

    async fn insert(&self, admin: &NewAdminUser) -> Result<AdminUser, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .admins
            .iter()
            .any(|(a, _)| a.email.same_mailbox(&admin.email))
        {
            return Err(RepositoryError::Conflict(
                "admin email already registered".to_owned(),
            ));
        }

        let record = AdminUser {
            id: AdminUserId::new(tables.next_id()),
            email: admin.email.clone(),
            name: admin.name.clone(),
            role: admin.role,
            created_at: Utc::now(),
        };
        tables.admins.push((record.clone(), admin.token_hash.clone()));
        Ok(record)
    }
}
