//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! modesta admin create -e admin@example.com -n "Admin Name" -r super_admin
//! ```
//!
//! The command prints the new admin's API token once. It is stored only as a
//! hash; a lost token means creating the admin again under another email.
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use std::io::Write;

use modesta_commerce::services::IssuedAdmin;
use modesta_commerce::{Caller, Commerce};
use modesta_core::AdminRole;

use super::CliError;

/// Create a new admin user and issue its API token.
///
/// The CLI acts as [`Caller::System`], so it can create the first super admin.
///
/// # Errors
///
/// Returns `CliError::InvalidArgument` for an unknown role and
/// `CliError::BackOffice` if the email is invalid or already taken.
pub async fn create_user(
    commerce: &Commerce,
    email: &str,
    name: &str,
    role: &str,
) -> Result<IssuedAdmin, CliError> {
    let role: AdminRole = role.parse().map_err(|_| {
        CliError::InvalidArgument(format!(
            "invalid role: {role}. Valid roles: super_admin, admin, viewer"
        ))
    })?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let issued = commerce
        .back_office()
        .create_admin(&Caller::System, email, name, role)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        issued.admin.id,
        issued.admin.email,
        issued.admin.role
    );
    Ok(issued)
}

/// Print the token where only the operator sees it, never into logs.
///
/// # Errors
///
/// Returns `CliError::Io` if the output cannot be written.
pub fn print_token(out: &mut impl Write, issued: &IssuedAdmin) -> Result<(), CliError> {
    writeln!(out, "API token for {}:", issued.admin.email)?;
    writeln!(out, "{}", issued.token)?;
    writeln!(out, "Store it now; it cannot be shown again.")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::fixtures;

    #[tokio::test]
    async fn test_create_first_super_admin() {
        let (_, commerce) = fixtures::commerce();
        let issued = create_user(&commerce, "ops@modesta.test", "Ops", "super_admin")
            .await
            .unwrap();
        assert_eq!(issued.admin.role, AdminRole::SuperAdmin);

        let caller = commerce
            .back_office()
            .caller_for_token(&issued.token)
            .await
            .unwrap();
        assert!(matches!(caller, Caller::Admin(admin) if admin.id == issued.admin.id));

        let mut out = Vec::new();
        print_token(&mut out, &issued).unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(&issued.token));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_role_and_duplicates() {
        let (_, commerce) = fixtures::commerce();
        let err = create_user(&commerce, "ops@modesta.test", "Ops", "owner")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));

        create_user(&commerce, "ops@modesta.test", "Ops", "admin")
            .await
            .unwrap();
        let err = create_user(&commerce, "ops@modesta.test", "Ops", "viewer")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::BackOffice(_)));
    }
}
