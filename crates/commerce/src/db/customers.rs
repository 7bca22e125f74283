//! `shop.customer` and `shop.customer_credential`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use modesta_core::{Address, CustomerId, Email};

use super::{PgStore, RepositoryError, limit_offset};
use crate::models::{Customer, CustomerCredential, CustomerProfile, NewCustomer, Page};
use crate::store::CustomerStore;

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, address, created_at, updated_at, deleted_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: String,
    phone: Option<String>,
    address: Option<Json<Address>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            name: row.name,
            email,
            phone: row.phone,
            address: row.address.map(|Json(a)| a),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    customer_id: i64,
    password_hash: String,
    must_reset: bool,
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE lower(email) = $1"
        ))
        .bind(email.match_key())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(
        &self,
        customer: &NewCustomer,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO shop.customer (name, email, phone, address)
            VALUES ($1, $2, $3, $4)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(&customer.profile.name)
        .bind(&customer.email)
        .bind(customer.profile.phone.as_deref())
        .bind(customer.profile.address.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "email already registered"))?;

        sqlx::query(
            r"
            INSERT INTO shop.customer_credential (customer_id, password_hash, must_reset)
            VALUES ($1, $2, TRUE)
            ",
        )
        .bind(row.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn update_profile(
        &self,
        id: CustomerId,
        profile: &CustomerProfile,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE shop.customer
            SET name = $2, phone = $3, address = $4, deleted_at = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&profile.name)
        .bind(profile.phone.as_deref())
        .bind(profile.address.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn list(&self, page: Page) -> Result<Vec<Customer>, RepositoryError> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS} FROM shop.customer
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn soft_delete(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.customer
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn credential(
        &self,
        id: CustomerId,
    ) -> Result<Option<CustomerCredential>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT customer_id, password_hash, must_reset
            FROM shop.customer_credential
            WHERE customer_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CustomerCredential {
            customer_id: CustomerId::new(r.customer_id),
            password_hash: r.password_hash,
            must_reset: r.must_reset,
        }))
    }

    async fn set_password(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.customer_credential
            SET password_hash = $2, must_reset = FALSE, updated_at = NOW()
            WHERE customer_id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
