//! Back-office users.

use chrono::{DateTime, Utc};
use serde::Serialize;

use modesta_core::{AdminRole, AdminUserId, Email};

/// An admin user (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an admin user. Only the token's SHA-256 digest is stored.
#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub token_hash: String,
}
