//! Customer directory.
//!
//! Resolves the contact details typed at checkout to exactly one customer
//! record per email address (case-insensitive). First-time shoppers get an
//! account with a generated one-time password that must be replaced at first
//! login.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use modesta_core::{CustomerId, Email};

use crate::config::ProfileMergePolicy;
use crate::db::RepositoryError;
use crate::error::DirectoryError;
use crate::models::{Customer, CustomerIdentity, CustomerProfile, NewCustomer, Page};
use crate::store::CustomerStore;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of the generated one-time credential.
const CREDENTIAL_LENGTH: usize = 16;

/// Outcome of [`CustomerDirectory::find_or_create`].
#[derive(Debug)]
pub struct ResolvedCustomer {
    pub customer: Customer,
    /// Set only when this call created the customer. Shown once, never stored.
    pub one_time_credential: Option<SecretString>,
}

impl ResolvedCustomer {
    /// Whether this call created the customer.
    #[must_use]
    pub const fn created(&self) -> bool {
        self.one_time_credential.is_some()
    }
}

/// Customer lookup, creation, and credentials.
#[derive(Clone)]
pub struct CustomerDirectory {
    customers: Arc<dyn CustomerStore>,
    policy: ProfileMergePolicy,
}

impl CustomerDirectory {
    #[must_use]
    pub fn new(customers: Arc<dyn CustomerStore>, policy: ProfileMergePolicy) -> Self {
        Self { customers, policy }
    }

    /// Return the customer for `identity.email`, creating it if needed.
    ///
    /// An existing customer has its profile refreshed according to the
    /// configured [`ProfileMergePolicy`]. A soft-deleted customer is restored.
    /// When two checkouts race to create the same email, the loser reads the
    /// winner's row, so both end up with the same customer id.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::InvalidEmail` or `DirectoryError::MissingName`
    /// before touching the store, and `DirectoryError::Unavailable` if the
    /// store cannot be reached.
    #[instrument(skip(self, identity))]
    pub async fn find_or_create(
        &self,
        identity: &CustomerIdentity,
    ) -> Result<ResolvedCustomer, DirectoryError> {
        let (email, profile) = validate_identity(identity)?;

        let existing = self
            .customers
            .find_by_email(&email)
            .await
            .map_err(DirectoryError::Unavailable)?;

        match existing {
            Some(customer) => self.refresh(customer, profile).await,
            None => self.create(email, profile).await,
        }
    }

    async fn create(
        &self,
        email: Email,
        profile: CustomerProfile,
    ) -> Result<ResolvedCustomer, DirectoryError> {
        let credential = generate_credential();
        let password_hash = hash_password(credential.expose_secret())?;
        let new_customer = NewCustomer {
            email: email.clone(),
            profile: profile.clone(),
        };

        match self.customers.insert(&new_customer, &password_hash).await {
            Ok(customer) => {
                info!(customer_id = %customer.id, "Customer created at checkout");
                Ok(ResolvedCustomer {
                    customer,
                    one_time_credential: Some(credential),
                })
            }
            Err(RepositoryError::Conflict(_)) => {
                // Another checkout created the same email first.
                let winner = self
                    .customers
                    .find_by_email(&email)
                    .await
                    .map_err(DirectoryError::Unavailable)?
                    .ok_or(DirectoryError::Unavailable(RepositoryError::NotFound))?;
                self.refresh(winner, profile).await
            }
            Err(e) => Err(DirectoryError::Unavailable(e)),
        }
    }

    async fn refresh(
        &self,
        current: Customer,
        incoming: CustomerProfile,
    ) -> Result<ResolvedCustomer, DirectoryError> {
        let merged = match self.policy {
            ProfileMergePolicy::Overwrite => CustomerProfile {
                name: incoming.name,
                phone: incoming.phone.or_else(|| current.phone.clone()),
                address: incoming.address.or_else(|| current.address.clone()),
            },
            ProfileMergePolicy::FillBlanks => incoming.fill_blanks_from(&current),
        };

        let unchanged = merged.name == current.name
            && merged.phone == current.phone
            && merged.address == current.address;
        if unchanged && !current.is_deleted() {
            return Ok(ResolvedCustomer {
                customer: current,
                one_time_credential: None,
            });
        }

        if current.is_deleted() {
            info!(customer_id = %current.id, "Restoring soft-deleted customer at checkout");
        }

        let customer = self
            .customers
            .update_profile(current.id, &merged)
            .await
            .map_err(DirectoryError::Unavailable)?;

        Ok(ResolvedCustomer {
            customer,
            one_time_credential: None,
        })
    }

    /// Get a customer by id, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::NotFound` if no such customer exists.
    pub async fn get(&self, id: CustomerId) -> Result<Customer, DirectoryError> {
        self.customers
            .get(id)
            .await
            .map_err(DirectoryError::Unavailable)?
            .ok_or(DirectoryError::NotFound(id))
    }

    /// Active customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Unavailable` if the store cannot be reached.
    pub async fn list(&self, page: Page) -> Result<Vec<Customer>, DirectoryError> {
        self.customers
            .list(page)
            .await
            .map_err(DirectoryError::Unavailable)
    }

    /// Soft-delete a customer. Their orders are kept.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::NotFound` if the customer does not exist or is
    /// already deleted.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: CustomerId) -> Result<(), DirectoryError> {
        let deleted = self
            .customers
            .soft_delete(id)
            .await
            .map_err(DirectoryError::Unavailable)?;
        if !deleted {
            return Err(DirectoryError::NotFound(id));
        }
        info!(customer_id = %id, "Customer soft-deleted");
        Ok(())
    }

    /// Login with email and password.
    ///
    /// Returns the customer and whether the password must be replaced before
    /// anything else.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::InvalidCredentials` if the email/password is
    /// wrong or the customer was deleted.
    #[instrument(skip(self, email, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Customer, bool), DirectoryError> {
        let email = Email::parse(email).map_err(|_| DirectoryError::InvalidCredentials)?;

        let customer = self
            .customers
            .find_by_email(&email)
            .await
            .map_err(DirectoryError::Unavailable)?
            .filter(|c| !c.is_deleted())
            .ok_or(DirectoryError::InvalidCredentials)?;

        let credential = self
            .customers
            .credential(customer.id)
            .await
            .map_err(DirectoryError::Unavailable)?
            .ok_or(DirectoryError::InvalidCredentials)?;

        verify_password(password, &credential.password_hash)?;
        Ok((customer, credential.must_reset))
    }

    /// Replace a customer's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::WeakPassword` if the new password is too short
    /// and `DirectoryError::InvalidCredentials` if the current one is wrong.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        id: CustomerId,
        current: &str,
        new: &str,
    ) -> Result<(), DirectoryError> {
        validate_password(new)?;

        let credential = self
            .customers
            .credential(id)
            .await
            .map_err(DirectoryError::Unavailable)?
            .ok_or(DirectoryError::NotFound(id))?;
        verify_password(current, &credential.password_hash)?;

        let password_hash = hash_password(new)?;
        self.customers
            .set_password(id, &password_hash)
            .await
            .map_err(DirectoryError::Unavailable)?;

        info!(customer_id = %id, "Customer password changed");
        Ok(())
    }
}

/// Validate the email and normalise the profile fields.
fn validate_identity(
    identity: &CustomerIdentity,
) -> Result<(Email, CustomerProfile), DirectoryError> {
    let email = Email::parse(&identity.email)?;

    let name = identity.name.trim();
    if name.is_empty() {
        return Err(DirectoryError::MissingName);
    }

    let phone = identity
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned);
    let address = identity.address.clone().filter(|a| !a.is_blank());

    Ok((
        email,
        CustomerProfile {
            name: name.to_owned(),
            phone,
            address,
        },
    ))
}

fn generate_credential() -> SecretString {
    let credential: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_LENGTH)
        .map(char::from)
        .collect();
    SecretString::from(credential)
}

/// Validate password meets requirements.
const fn validate_password(password: &str) -> Result<(), DirectoryError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(DirectoryError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Credential(e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), DirectoryError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        warn!(error = %e, "Stored password hash is malformed");
        DirectoryError::Credential(e.to_string())
    })?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| DirectoryError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use modesta_core::Address;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::services::fixtures::identity;

    fn directory(policy: ProfileMergePolicy) -> (Arc<MemoryStore>, CustomerDirectory) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CustomerDirectory::new(store, policy))
    }

    fn address(line1: &str) -> Address {
        Address {
            line1: line1.into(),
            city: "Dubai".into(),
            postal_code: "00000".into(),
            country: "AE".into(),
            ..Address::default()
        }
    }

    #[tokio::test]
    async fn test_first_checkout_creates_customer_with_credential() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);

        let resolved = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();
        assert!(resolved.created());
        let credential = resolved.one_time_credential.unwrap();
        assert_eq!(credential.expose_secret().len(), CREDENTIAL_LENGTH);

        let (customer, must_reset) = directory
            .authenticate("AMIRA@example.com", credential.expose_secret())
            .await
            .unwrap();
        assert_eq!(customer.id, resolved.customer.id);
        assert!(must_reset);
    }

    #[tokio::test]
    async fn test_email_match_is_case_insensitive() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);

        let first = directory
            .find_or_create(&identity("Amira", "Amira@Example.com"))
            .await
            .unwrap();
        let second = directory
            .find_or_create(&identity("Amira K", "amira@example.com"))
            .await
            .unwrap();

        assert!(!second.created());
        assert_eq!(first.customer.id, second.customer.id);
        assert_eq!(second.customer.name, "Amira K");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_fields_not_supplied() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);
        let mut with_address = identity("Amira", "amira@example.com");
        with_address.address = Some(address("1 Sheikh Zayed Rd"));
        with_address.phone = Some("+971500000000".into());
        directory.find_or_create(&with_address).await.unwrap();

        let resolved = directory
            .find_or_create(&identity("Amira Khan", "amira@example.com"))
            .await
            .unwrap();
        assert_eq!(resolved.customer.name, "Amira Khan");
        assert_eq!(resolved.customer.address, Some(address("1 Sheikh Zayed Rd")));
        assert_eq!(resolved.customer.phone.as_deref(), Some("+971500000000"));
    }

    #[tokio::test]
    async fn test_fill_blanks_keeps_existing_values() {
        let (_, directory) = directory(ProfileMergePolicy::FillBlanks);
        directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();

        let mut later = identity("Someone Else", "amira@example.com");
        later.address = Some(address("2 Al Wasl Rd"));
        let resolved = directory.find_or_create(&later).await.unwrap();

        assert_eq!(resolved.customer.name, "Amira");
        assert_eq!(resolved.customer.address, Some(address("2 Al Wasl Rd")));
    }

    #[tokio::test]
    async fn test_invalid_identity_writes_nothing() {
        let (store, directory) = directory(ProfileMergePolicy::Overwrite);

        let err = directory
            .find_or_create(&identity("Amira", "not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidEmail(_)));

        let err = directory
            .find_or_create(&identity("   ", "amira@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::MissingName));

        assert!(CustomerStore::list(store.as_ref(), Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_is_unavailable() {
        let (store, directory) = directory(ProfileMergePolicy::Overwrite);
        store.set_unavailable(true);

        let err = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_concurrent_first_checkouts_share_one_customer() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);
        let a = identity("Amira", "amira@example.com");
        let b = identity("Amira", "AMIRA@example.com");

        let (first, second) =
            tokio::join!(directory.find_or_create(&a), directory.find_or_create(&b));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.customer.id, second.customer.id);
        assert_eq!(
            directory.list(Page::default()).await.unwrap().len(),
            1,
            "exactly one customer row"
        );
    }

    #[tokio::test]
    async fn test_soft_deleted_customer_is_restored_by_checkout() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);
        let created = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();
        directory.soft_delete(created.customer.id).await.unwrap();
        assert!(matches!(
            directory.soft_delete(created.customer.id).await,
            Err(DirectoryError::NotFound(_))
        ));

        let again = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();
        assert_eq!(again.customer.id, created.customer.id);
        assert!(!again.customer.is_deleted());
    }

    #[tokio::test]
    async fn test_change_password() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);
        let created = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();
        let credential = created.one_time_credential.unwrap();
        let id = created.customer.id;

        assert!(matches!(
            directory.change_password(id, credential.expose_secret(), "short").await,
            Err(DirectoryError::WeakPassword { min: 8 })
        ));
        assert!(matches!(
            directory.change_password(id, "wrong-password", "a-long-password").await,
            Err(DirectoryError::InvalidCredentials)
        ));

        directory
            .change_password(id, credential.expose_secret(), "a-long-password")
            .await
            .unwrap();
        let (_, must_reset) = directory
            .authenticate("amira@example.com", "a-long-password")
            .await
            .unwrap();
        assert!(!must_reset);
    }

    #[tokio::test]
    async fn test_deleted_customer_cannot_log_in() {
        let (_, directory) = directory(ProfileMergePolicy::Overwrite);
        let created = directory
            .find_or_create(&identity("Amira", "amira@example.com"))
            .await
            .unwrap();
        let credential = created.one_time_credential.unwrap();
        directory.soft_delete(created.customer.id).await.unwrap();

        assert!(matches!(
            directory
                .authenticate("amira@example.com", credential.expose_secret())
                .await,
            Err(DirectoryError::InvalidCredentials)
        ));
    }
}
