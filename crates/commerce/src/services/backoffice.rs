//! Back-office operations.
//!
//! Every method takes the [`Caller`] and asks the [`AuthorizationGate`] first.
//! Viewers may read; admins may change orders and customers; creating other
//! admins needs a super admin.

use std::fmt::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use modesta_core::{AdminRole, CustomerId, Email, OrderId, OrderStatus, Transition};

use crate::auth::{AuthorizationGate, Caller, generate_api_token, hash_api_token};
use crate::error::BackOfficeError;
use crate::models::{
    AdminUser, Customer, NewAdminUser, NewProduct, Order, OrderFilter, OrderView, Page, Product,
    ShippingInfo,
};
use crate::notify::{Notification, Notifier, notify_detached};
use crate::store::{AdminStore, ProductStore};

use super::directory::CustomerDirectory;
use super::ledger::{OrderLedger, OrderPage, StatusChange};
use super::sweep::OrphanSweep;

/// A customer with their order history.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub orders: Vec<Order>,
}

/// A newly created admin and the only copy of its API token.
#[derive(Debug)]
pub struct IssuedAdmin {
    pub admin: AdminUser,
    pub token: String,
}

/// Admin surface over the ledger and directory.
#[derive(Clone)]
pub struct BackOffice {
    gate: AuthorizationGate,
    ledger: OrderLedger,
    directory: CustomerDirectory,
    sweep: OrphanSweep,
    products: Arc<dyn ProductStore>,
    admins: Arc<dyn AdminStore>,
    notifier: Arc<dyn Notifier>,
}

impl BackOffice {
    #[must_use]
    pub fn new(
        gate: AuthorizationGate,
        ledger: OrderLedger,
        directory: CustomerDirectory,
        sweep: OrphanSweep,
        products: Arc<dyn ProductStore>,
        admins: Arc<dyn AdminStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gate,
            ledger,
            directory,
            sweep,
            products,
            admins,
            notifier,
        }
    }

    /// Resolve a bearer token to a caller. Unknown tokens are anonymous.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Store` if the admin store cannot be reached.
    pub async fn caller_for_token(&self, token: &str) -> Result<Caller, BackOfficeError> {
        let admin = self
            .admins
            .find_by_token_hash(&hash_api_token(token))
            .await?;
        Ok(admin.map_or(Caller::Anonymous, Caller::Admin))
    }

    /// Orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is staff.
    pub async fn list_orders(
        &self,
        caller: &Caller,
        filter: OrderFilter,
        page: Page,
    ) -> Result<OrderPage, BackOfficeError> {
        self.gate.require_staff(caller)?;
        Ok(self.ledger.list(filter, page).await?)
    }

    /// One order with its items and customer.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is staff, or
    /// `LedgerError::NotFound` if the order does not exist.
    pub async fn order_detail(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<OrderView, BackOfficeError> {
        self.gate.require_staff(caller)?;
        Ok(self.ledger.view(order_id).await?)
    }

    /// Move an order to a new status and tell the customer.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is an admin, or
    /// `LedgerError::IllegalTransition` if the state machine forbids it.
    #[instrument(skip(self, caller), fields(caller = %caller))]
    pub async fn set_order_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, BackOfficeError> {
        self.gate.require_admin(caller)?;
        let change = self.ledger.update_status(order_id, status).await?;

        if change.transition == Transition::Applied {
            info!(order_id = %order_id, status = %status, "Order status set by back office");
            let customer = self.directory.get(change.order.customer_id).await?;
            if !customer.is_deleted() {
                notify_detached(
                    &self.notifier,
                    Notification::StatusChanged {
                        to: customer.email,
                        customer_name: customer.name,
                        order_id,
                        status,
                        tracking: change.order.shipping.tracking_number.clone(),
                    },
                );
            }
        }

        Ok(change)
    }

    /// Replace the shipping details of an order.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is an admin.
    pub async fn update_shipping(
        &self,
        caller: &Caller,
        order_id: OrderId,
        shipping: &ShippingInfo,
    ) -> Result<Order, BackOfficeError> {
        self.gate.require_admin(caller)?;
        Ok(self.ledger.update_shipping(order_id, shipping).await?)
    }

    /// All orders matching `filter` as CSV, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is staff.
    pub async fn export_orders_csv(
        &self,
        caller: &Caller,
        filter: OrderFilter,
    ) -> Result<String, BackOfficeError> {
        self.gate.require_staff(caller)?;

        let mut csv = String::from(
            "order_id,created_at,status,customer_id,total,currency,payment_session_id,carrier,tracking_number\n",
        );
        let mut page_number = 1;
        loop {
            let page = Page::new(Some(page_number), Some(Page::MAX_PER_PAGE));
            let batch = self.ledger.list(filter, page).await?;
            for order in &batch.orders {
                let _ = writeln!(
                    csv,
                    "{},{},{},{},{},{},{},{},{}",
                    order.id,
                    order.created_at.to_rfc3339(),
                    order.status,
                    order.customer_id,
                    order.total.amount,
                    order.total.currency_code,
                    csv_field(order.payment_session_id.as_deref()),
                    csv_field(order.shipping.carrier.as_deref()),
                    csv_field(order.shipping.tracking_number.as_deref()),
                );
            }
            if batch.orders.len() < page.per_page() as usize {
                break;
            }
            page_number += 1;
        }
        Ok(csv)
    }

    /// Active customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is staff.
    pub async fn list_customers(
        &self,
        caller: &Caller,
        page: Page,
    ) -> Result<Vec<Customer>, BackOfficeError> {
        self.gate.require_staff(caller)?;
        Ok(self.directory.list(page).await?)
    }

    /// A customer and their orders.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is staff.
    pub async fn customer_detail(
        &self,
        caller: &Caller,
        customer_id: CustomerId,
    ) -> Result<CustomerDetail, BackOfficeError> {
        self.gate.require_staff(caller)?;
        let customer = self.directory.get(customer_id).await?;
        let orders = self.ledger.list_for_customer(customer_id).await?;
        Ok(CustomerDetail { customer, orders })
    }

    /// Soft-delete a customer.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is an admin.
    #[instrument(skip(self, caller), fields(caller = %caller))]
    pub async fn delete_customer(
        &self,
        caller: &Caller,
        customer_id: CustomerId,
    ) -> Result<(), BackOfficeError> {
        self.gate.require_admin(caller)?;
        Ok(self.directory.soft_delete(customer_id).await?)
    }

    /// Run the orphan sweep now.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is an admin.
    pub async fn sweep_orphans(&self, caller: &Caller) -> Result<u64, BackOfficeError> {
        self.gate.require_admin(caller)?;
        Ok(self.sweep.run().await?)
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is an admin and
    /// `BackOfficeError::InvalidInput` for a blank name or negative price.
    pub async fn add_product(
        &self,
        caller: &Caller,
        product: NewProduct,
    ) -> Result<Product, BackOfficeError> {
        self.gate.require_admin(caller)?;
        let name = product.name.trim();
        if name.is_empty() {
            return Err(BackOfficeError::InvalidInput("product name cannot be empty".into()));
        }
        if product.price.amount.is_sign_negative() || product.price.to_minor_units().is_none() {
            return Err(BackOfficeError::InvalidInput(format!(
                "invalid price: {}",
                product.price.amount
            )));
        }
        let product = self
            .products
            .insert(&NewProduct {
                name: name.to_owned(),
                price: product.price,
            })
            .await?;
        info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Create an admin user and issue its API token.
    ///
    /// # Errors
    ///
    /// Returns `BackOfficeError::Forbidden` unless the caller is a super admin
    /// (or the system), and `BackOfficeError::InvalidInput` for a bad email or
    /// one that is already taken.
    #[instrument(skip(self, caller, email, name), fields(caller = %caller))]
    pub async fn create_admin(
        &self,
        caller: &Caller,
        email: &str,
        name: &str,
        role: AdminRole,
    ) -> Result<IssuedAdmin, BackOfficeError> {
        self.gate.require_role(caller, AdminRole::SuperAdmin)?;
        let email = Email::parse(email)
            .map_err(|e| BackOfficeError::InvalidInput(format!("invalid email: {e}")))?;

        let token = generate_api_token();
        let admin = self
            .admins
            .insert(&NewAdminUser {
                email,
                name: name.trim().to_owned(),
                role,
                token_hash: hash_api_token(&token),
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    BackOfficeError::InvalidInput("an admin with this email already exists".into())
                } else {
                    e.into()
                }
            })?;

        info!(admin_id = %admin.id, role = %admin.role, "Admin user created");
        Ok(IssuedAdmin { admin, token })
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or line break.
///
/// A leading `=`, `+`, `-`, `@`, tab or carriage return gets a `'` prefix so
/// spreadsheets read the cell as text rather than a formula.
fn csv_field(value: Option<&str>) -> String {
    let value = value.unwrap_or_default();
    let value = if value.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{value}")
    } else {
        value.to_owned()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use modesta_core::{AdminUserId, CurrencyCode, Price};

    use super::*;
    use crate::auth::Forbidden;
    use crate::error::LedgerError;
    use crate::services::fixtures::{Harness, harness, identity, product, usd};
    use crate::services::{CartLine, CheckoutRequest, CheckoutStarted};

    fn admin(role: AdminRole) -> Caller {
        Caller::Admin(AdminUser {
            id: AdminUserId::new(1),
            email: Email::parse("ops@modesta.shop").unwrap(),
            name: "Ops".into(),
            role,
            created_at: Utc::now(),
        })
    }

    async fn checkout(h: &Harness, email: &str) -> CheckoutStarted {
        let product_id = product(&h.store, "Maxi Skirt", usd(4_500)).await;
        h.commerce
            .checkout()
            .start_checkout(&CheckoutRequest {
                lines: vec![CartLine {
                    product_id,
                    quantity: 2,
                    name: None,
                    unit_price: None,
                }],
                customer: identity("Safiya", email),
                shipping_address: None,
                billing_address: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_gate_runs_before_anything_else() {
        let h = harness();
        let office = h.commerce.back_office();
        h.store.set_unavailable(true);

        let err = office
            .list_orders(&Caller::Anonymous, OrderFilter::default(), Page::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::Forbidden(Forbidden::Unauthenticated)));

        let err = office
            .set_order_status(&admin(AdminRole::Viewer), OrderId::new(1), OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackOfficeError::Forbidden(Forbidden::InsufficientRole { required: AdminRole::Admin })
        ));

        let err = office
            .delete_customer(&Caller::Customer(CustomerId::new(1)), CustomerId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_status_change_notifies_customer() {
        let h = harness();
        let started = checkout(&h, "safiya@example.com").await;
        let office = h.commerce.back_office();
        let caller = admin(AdminRole::Admin);

        office
            .update_shipping(
                &caller,
                started.order_id,
                &ShippingInfo {
                    carrier: Some("DHL".into()),
                    tracking_number: Some("JD0001".into()),
                    ..ShippingInfo::default()
                },
            )
            .await
            .unwrap();
        office
            .set_order_status(&caller, started.order_id, OrderStatus::Paid)
            .await
            .unwrap();
        let repeat = office
            .set_order_status(&caller, started.order_id, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(repeat.transition, Transition::AlreadyInState);

        let sent = h.notifier.wait_for(2).await;
        let changes: Vec<_> = sent
            .iter()
            .filter_map(|n| match n {
                Notification::StatusChanged {
                    status, tracking, ..
                } => Some((*status, tracking.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![(OrderStatus::Paid, Some("JD0001".to_owned()))]);
    }

    #[tokio::test]
    async fn test_illegal_status_change_is_reported() {
        let h = harness();
        let started = checkout(&h, "safiya@example.com").await;

        let err = h
            .commerce
            .back_office()
            .set_order_status(&admin(AdminRole::Admin), started.order_id, OrderStatus::Fulfilled)
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::Ledger(LedgerError::IllegalTransition(_))));
    }

    #[tokio::test]
    async fn test_viewer_can_read_and_export() {
        let h = harness();
        let started = checkout(&h, "safiya@example.com").await;
        checkout(&h, "noor@example.com").await;
        let office = h.commerce.back_office();
        let viewer = admin(AdminRole::Viewer);

        let page = office
            .list_orders(&viewer, OrderFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let detail = office.order_detail(&viewer, started.order_id).await.unwrap();
        assert_eq!(detail.items[0].quantity, 2);

        let csv = office
            .export_orders_csv(&viewer, OrderFilter::default())
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("order_id,created_at,status"));
        assert!(csv.contains(&started.session_id));
    }

    #[tokio::test]
    async fn test_delete_customer_keeps_orders() {
        let h = harness();
        let started = checkout(&h, "safiya@example.com").await;
        let office = h.commerce.back_office();
        let caller = admin(AdminRole::Admin);
        let customer_id = h
            .commerce
            .ledger()
            .get(started.order_id)
            .await
            .unwrap()
            .customer_id;

        office.delete_customer(&caller, customer_id).await.unwrap();

        assert!(office.list_customers(&caller, Page::default()).await.unwrap().is_empty());
        let detail = office.customer_detail(&caller, customer_id).await.unwrap();
        assert!(detail.customer.is_deleted());
        assert_eq!(detail.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_create_admin_and_resolve_token() {
        let h = harness();
        let office = h.commerce.back_office();

        let err = office
            .create_admin(&admin(AdminRole::Admin), "new@modesta.shop", "New", AdminRole::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::Forbidden(_)));

        let issued = office
            .create_admin(&Caller::System, "new@modesta.shop", "New", AdminRole::Viewer)
            .await
            .unwrap();
        assert!(issued.token.starts_with(crate::auth::API_TOKEN_PREFIX));

        let caller = office.caller_for_token(&issued.token).await.unwrap();
        assert!(matches!(caller, Caller::Admin(a) if a.id == issued.admin.id));
        assert!(matches!(
            office.caller_for_token("mdst_unknown").await.unwrap(),
            Caller::Anonymous
        ));

        let err = office
            .create_admin(&Caller::System, "NEW@modesta.shop", "Again", AdminRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_product_validates() {
        let h = harness();
        let office = h.commerce.back_office();
        let caller = admin(AdminRole::Admin);

        let product = office
            .add_product(
                &caller,
                NewProduct {
                    name: "  Kaftan ".into(),
                    price: usd(8_900),
                },
            )
            .await
            .unwrap();
        assert_eq!(product.name, "Kaftan");
        assert!(product.active);

        let err = office
            .add_product(
                &caller,
                NewProduct {
                    name: "Kaftan".into(),
                    price: Price::new(Decimal::new(-1, 0), CurrencyCode::USD),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackOfficeError::InvalidInput(_)));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field(None), "");
        assert_eq!(csv_field(Some("DHL")), "DHL");
        assert_eq!(csv_field(Some("a,b")), "\"a,b\"");
        assert_eq!(csv_field(Some("say \"hi\"")), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_field_neutralises_formulas() {
        assert_eq!(csv_field(Some("=1+1")), "'=1+1");
        assert_eq!(csv_field(Some("+44 20")), "'+44 20");
        assert_eq!(csv_field(Some("-5")), "'-5");
        assert_eq!(csv_field(Some("@SUM(A1)")), "'@SUM(A1)");
        assert_eq!(csv_field(Some("\tx")), "'\tx");
        assert_eq!(csv_field(Some("=A1,B1")), "\"'=A1,B1\"");
        assert_eq!(csv_field(Some("JD-0001")), "JD-0001");
    }

    #[tokio::test]
    async fn test_export_neutralises_admin_entered_formulas() {
        let h = harness();
        let started = checkout(&h, "safiya@example.com").await;
        let office = h.commerce.back_office();
        let caller = admin(AdminRole::Admin);
        office
            .update_shipping(
                &caller,
                started.order_id,
                &ShippingInfo {
                    carrier: Some("@DHL".into()),
                    tracking_number: Some("=HYPERLINK(\"http://x\")".into()),
                    ..ShippingInfo::default()
                },
            )
            .await
            .unwrap();

        let csv = office
            .export_orders_csv(&caller, OrderFilter::default())
            .await
            .unwrap();
        assert!(csv.contains(",'@DHL,"));
        assert!(csv.contains("\"'=HYPERLINK(\"\"http://x\"\")\""));
        assert!(!csv.contains(",=HYPERLINK"));
    }
}
