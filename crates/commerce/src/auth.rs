//! Who is calling, and whether they may.
//!
//! HTTP layers resolve a request to a [`Caller`] (session cookie on the
//! storefront, bearer token on the admin API). Every back-office operation then
//! asks the [`AuthorizationGate`] before touching data.

use core::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};
use thiserror::Error;

use modesta_core::{AdminRole, CustomerId};

use crate::models::AdminUser;

/// Prefix of generated admin API tokens.
pub const API_TOKEN_PREFIX: &str = "mdst_";
const API_TOKEN_RANDOM_LEN: usize = 40;

/// The party making a request.
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    Customer(CustomerId),
    Admin(AdminUser),
    /// Operator tooling and background tasks, which are trusted.
    System,
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Customer(id) => write!(f, "customer:{id}"),
            Self::Admin(admin) => write!(f, "admin:{}", admin.id),
            Self::System => f.write_str("system"),
        }
    }
}

/// Access denied by the [`AuthorizationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Forbidden {
    /// No identity was presented.
    #[error("authentication required")]
    Unauthenticated,
    /// The caller is not an admin, or its role is too low.
    #[error("requires the {required} role")]
    InsufficientRole { required: AdminRole },
}

/// Single decision point for back-office access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Allow admins with at least `required`, and the system caller.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden::Unauthenticated` for anonymous callers and
    /// `Forbidden::InsufficientRole` for everyone else who falls short.
    pub fn require_role(&self, caller: &Caller, required: AdminRole) -> Result<(), Forbidden> {
        match caller {
            Caller::System => Ok(()),
            Caller::Admin(admin) if admin.role >= required => Ok(()),
            Caller::Anonymous => Err(Forbidden::Unauthenticated),
            Caller::Admin(_) | Caller::Customer(_) => Err(Forbidden::InsufficientRole { required }),
        }
    }

    /// Gate for operations that change data.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationGate::require_role`].
    pub fn require_admin(&self, caller: &Caller) -> Result<(), Forbidden> {
        self.require_role(caller, AdminRole::Admin)
    }

    /// Gate for read-only back-office views.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationGate::require_role`].
    pub fn require_staff(&self, caller: &Caller) -> Result<(), Forbidden> {
        self.require_role(caller, AdminRole::Viewer)
    }
}

/// Generate a new admin API token. Only its hash is ever stored.
#[must_use]
pub fn generate_api_token() -> String {
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{API_TOKEN_PREFIX}{random}")
}

/// Hex SHA-256 digest of an API token, as stored in `admin_user.token_hash`.
#[must_use]
pub fn hash_api_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use modesta_core::{AdminUserId, Email};

    use super::*;

    fn admin(role: AdminRole) -> Caller {
        Caller::Admin(AdminUser {
            id: AdminUserId::new(1),
            email: Email::parse("ops@modesta.shop").unwrap(),
            name: "Ops".into(),
            role,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_require_admin() {
        let gate = AuthorizationGate::new();
        assert!(gate.require_admin(&admin(AdminRole::Admin)).is_ok());
        assert!(gate.require_admin(&admin(AdminRole::SuperAdmin)).is_ok());
        assert!(gate.require_admin(&Caller::System).is_ok());
        assert_eq!(
            gate.require_admin(&admin(AdminRole::Viewer)),
            Err(Forbidden::InsufficientRole {
                required: AdminRole::Admin
            })
        );
        assert_eq!(
            gate.require_admin(&Caller::Customer(CustomerId::new(9))),
            Err(Forbidden::InsufficientRole {
                required: AdminRole::Admin
            })
        );
        assert_eq!(
            gate.require_admin(&Caller::Anonymous),
            Err(Forbidden::Unauthenticated)
        );
    }

    #[test]
    fn test_viewers_may_read() {
        let gate = AuthorizationGate::new();
        assert!(gate.require_staff(&admin(AdminRole::Viewer)).is_ok());
        assert!(gate.require_staff(&Caller::Customer(CustomerId::new(9))).is_err());
    }

    #[test]
    fn test_api_tokens() {
        let token = generate_api_token();
        assert!(token.starts_with(API_TOKEN_PREFIX));
        assert_eq!(token.len(), API_TOKEN_PREFIX.len() + API_TOKEN_RANDOM_LEN);
        assert_ne!(token, generate_api_token());

        let hash = hash_api_token(&token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_token(&format!(" {token}\n")));
    }

    #[test]
    fn test_caller_display() {
        assert_eq!(Caller::Customer(CustomerId::new(4)).to_string(), "customer:4");
        assert_eq!(admin(AdminRole::Admin).to_string(), "admin:1");
    }
}
