//! Modesta CLI - database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! modesta migrate
//!
//! # Create an admin user and print its API token
//! modesta admin create -e admin@example.com -n "Admin Name" -r super_admin
//!
//! # Cancel orphaned orders, export orders
//! modesta orders sweep
//! modesta orders export --status paid
//!
//! # Add a product
//! modesta products add --name "Linen Abaya" --price 89.00
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use modesta_core::OrderStatus;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "modesta")]
#[command(author, version, about = "Modesta CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Order maintenance
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin role (`super_admin`, `admin`, `viewer`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Cancel unpaid orders that never got a payment session
    Sweep,
    /// Write orders as CSV to stdout
    Export {
        /// Only orders in this status (`pending`, `paid`, `fulfilled`, `cancelled`)
        #[arg(short, long)]
        status: Option<OrderStatus>,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// Add a product priced in the store currency
    Add {
        #[arg(short, long)]
        name: String,

        /// Unit price, e.g. 89.00
        #[arg(short, long)]
        price: Decimal,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr so CSV exports and tokens on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modesta_cli=info,modesta_commerce=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, name, role } => {
                let commerce = commands::commerce(pool)?;
                let issued = commands::admin::create_user(&commerce, &email, &name, &role).await?;
                commands::admin::print_token(&mut std::io::stdout().lock(), &issued)?;
            }
        },
        Commands::Orders { action } => {
            let commerce = commands::commerce(pool)?;
            match action {
                OrdersAction::Sweep => {
                    commands::orders::sweep(&commerce).await?;
                }
                OrdersAction::Export { status } => {
                    commands::orders::export(&commerce, status, &mut std::io::stdout().lock())
                        .await?;
                }
            }
        }
        Commands::Products { action } => match action {
            ProductsAction::Add { name, price } => {
                let commerce = commands::commerce(pool)?;
                commands::products::add(&commerce, &name, price).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_status() {
        let cli = Cli::try_parse_from(["modesta", "orders", "export", "--status", "paid"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Orders {
                action: OrdersAction::Export {
                    status: Some(OrderStatus::Paid)
                }
            })
        ));

        let cli = Cli::try_parse_from(["modesta", "orders", "export", "--status", "shipped"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_parse_product_price() {
        let cli = Cli::try_parse_from([
            "modesta", "products", "add", "--name", "Linen Abaya", "--price", "89.00",
        ]);
        let Ok(Cli {
            command: Commands::Products {
                action: ProductsAction::Add { name, price },
            },
        }) = cli
        else {
            panic!("expected products add");
        };
        assert_eq!(name, "Linen Abaya");
        assert_eq!(price, Decimal::new(8_900, 2));
    }
}
