//! `shop.admin_user`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use modesta_core::{AdminRole, AdminUserId, Email};

use super::{PgStore, RepositoryError};
use crate::models::{AdminUser, NewAdminUser};
use crate::store::AdminStore;

#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: i64,
    email: String,
    name: String,
    role: AdminRole,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminUser {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AdminUserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(
            "SELECT id, email, name, role, created_at FROM shop.admin_user WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, admin: &NewAdminUser) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(
            r"
            INSERT INTO shop.admin_user (email, name, role, token_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, role, created_at
            ",
        )
        .bind(&admin.email)
        .bind(&admin.name)
        .bind(admin.role)
        .bind(&admin.token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "admin email already registered"))?;

        row.try_into()
    }
}
