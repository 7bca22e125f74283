//! Business logic services.
//!
//! Each service holds `Arc` handles to the stores it needs and is cheap to
//! clone. [`Commerce`] wires all of them from one set of stores, one gateway,
//! and one notifier, which is what the HTTP binaries and the CLI share.

mod backoffice;
mod catalog;
mod checkout;
mod directory;
mod ledger;
mod reconciliation;
mod reviews;
mod sweep;

pub use backoffice::{BackOffice, CustomerDetail, IssuedAdmin};
pub use catalog::{Catalog, MAX_ORDER_TOTAL, PricedCart};
pub use checkout::{
    CartLine, CheckoutOrchestrator, CheckoutRequest, CheckoutStarted, MAX_LINE_QUANTITY,
};
pub use directory::{CustomerDirectory, MIN_PASSWORD_LENGTH, ResolvedCustomer};
pub use ledger::{OrderLedger, OrderPage, PaymentApplied, StatusChange};
pub use reconciliation::{ReconciliationResult, ReconciliationService};
pub use reviews::{MAX_COMMENT_LENGTH, ReviewEligibility};
pub use sweep::OrphanSweep;

use std::sync::Arc;

use crate::auth::AuthorizationGate;
use crate::config::CommerceConfig;
use crate::gateway::PaymentGateway;
use crate::notify::Notifier;
use crate::store::Stores;

/// Every service, wired once.
#[derive(Clone)]
pub struct Commerce {
    inner: Arc<CommerceInner>,
}

struct CommerceInner {
    config: CommerceConfig,
    catalog: Catalog,
    directory: CustomerDirectory,
    ledger: OrderLedger,
    checkout: CheckoutOrchestrator,
    reconciliation: ReconciliationService,
    reviews: ReviewEligibility,
    sweep: OrphanSweep,
    back_office: BackOffice,
}

impl Commerce {
    /// Wire the services.
    #[must_use]
    pub fn new(
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: CommerceConfig,
    ) -> Self {
        let catalog = Catalog::new(Arc::clone(&stores.products), config.currency);
        let directory = CustomerDirectory::new(Arc::clone(&stores.customers), config.profile_policy);
        let ledger = OrderLedger::new(Arc::clone(&stores.orders), Arc::clone(&stores.customers));
        let checkout = CheckoutOrchestrator::new(
            catalog.clone(),
            directory.clone(),
            ledger.clone(),
            Arc::clone(&gateway),
            Arc::clone(&notifier),
            config.clone(),
        );
        let reconciliation =
            ReconciliationService::new(ledger.clone(), gateway, Arc::clone(&notifier));
        let reviews = ReviewEligibility::new(Arc::clone(&stores.orders), Arc::clone(&stores.reviews));
        let sweep = OrphanSweep::new(ledger.clone(), config.orphan_ttl);
        let back_office = BackOffice::new(
            AuthorizationGate::new(),
            ledger.clone(),
            directory.clone(),
            sweep.clone(),
            Arc::clone(&stores.products),
            Arc::clone(&stores.admins),
            notifier,
        );

        Self {
            inner: Arc::new(CommerceInner {
                config,
                catalog,
                directory,
                ledger,
                checkout,
                reconciliation,
                reviews,
                sweep,
                back_office,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CommerceConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn directory(&self) -> &CustomerDirectory {
        &self.inner.directory
    }

    #[must_use]
    pub fn ledger(&self) -> &OrderLedger {
        &self.inner.ledger
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    #[must_use]
    pub fn reconciliation(&self) -> &ReconciliationService {
        &self.inner.reconciliation
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewEligibility {
        &self.inner.reviews
    }

    #[must_use]
    pub fn sweep(&self) -> &OrphanSweep {
        &self.inner.sweep
    }

    #[must_use]
    pub fn back_office(&self) -> &BackOffice {
        &self.inner.back_office
    }
}
