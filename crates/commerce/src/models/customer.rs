//! Customer records and the identity supplied at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use modesta_core::{Address, CustomerId, Email};

/// A customer (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Stored with the casing the shopper typed; matched case-insensitively.
    pub email: Email,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when an admin removes the customer. Orders keep pointing at the row.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Customer {
    /// Whether the customer has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Contact details as submitted by a shopper, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Mutable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

impl CustomerProfile {
    /// Keep every field of `self` that is set, falling back to `current`.
    #[must_use]
    pub fn fill_blanks_from(self, current: &Customer) -> Self {
        let blank = |s: &str| s.trim().is_empty();
        Self {
            name: if blank(&current.name) { self.name } else { current.name.clone() },
            phone: current
                .phone
                .clone()
                .filter(|p| !blank(p))
                .or(self.phone),
            address: current
                .address
                .clone()
                .filter(|a| !a.is_blank())
                .or(self.address),
        }
    }
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: Email,
    pub profile: CustomerProfile,
}

/// Login credential attached to a customer.
#[derive(Clone)]
pub struct CustomerCredential {
    pub customer_id: CustomerId,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// The credential was generated for the customer and must be replaced.
    pub must_reset: bool,
}

impl std::fmt::Debug for CustomerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerCredential")
            .field("customer_id", &self.customer_id)
            .field("password_hash", &"[REDACTED]")
            .field("must_reset", &self.must_reset)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn customer(name: &str, phone: Option<&str>, address: Option<Address>) -> Customer {
        Customer {
            id: CustomerId::new(1),
            name: name.to_owned(),
            email: Email::parse("amira@example.com").unwrap(),
            phone: phone.map(str::to_owned),
            address,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn address(city: &str) -> Address {
        Address {
            line1: "1 Jalan Ampang".into(),
            city: city.into(),
            postal_code: "50450".into(),
            country: "MY".into(),
            ..Address::default()
        }
    }

    #[test]
    fn test_fill_blanks_keeps_existing_values() {
        let current = customer("Amira", Some("+60 12 345"), Some(address("Kuala Lumpur")));
        let incoming = CustomerProfile {
            name: "Amira H.".into(),
            phone: Some("+60 99 999".into()),
            address: Some(address("Penang")),
        };
        let merged = incoming.fill_blanks_from(&current);
        assert_eq!(merged.name, "Amira");
        assert_eq!(merged.phone.as_deref(), Some("+60 12 345"));
        assert_eq!(merged.address.unwrap().city, "Kuala Lumpur");
    }

    #[test]
    fn test_fill_blanks_writes_empty_fields() {
        let current = customer("", None, Some(Address::default()));
        let incoming = CustomerProfile {
            name: "Amira".into(),
            phone: Some("+60 12 345".into()),
            address: Some(address("Penang")),
        };
        let merged = incoming.fill_blanks_from(&current);
        assert_eq!(merged.name, "Amira");
        assert_eq!(merged.phone.as_deref(), Some("+60 12 345"));
        assert_eq!(merged.address.unwrap().city, "Penang");
    }

    #[test]
    fn test_credential_debug_redacts_hash() {
        let credential = CustomerCredential {
            customer_id: CustomerId::new(3),
            password_hash: "$argon2id$v=19$secret".into(),
            must_reset: true,
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("argon2id"));
    }
}
