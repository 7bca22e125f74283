//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `STOREFRONT_BASE_URL` - Storefront URL, for links in customer email
//! - `ORPHAN_ORDER_TTL_HOURS` - Age at which unpaid orders without a payment session are cancelled (default: 24)
//! - `ORPHAN_SWEEP_INTERVAL_SECS` - Run the orphan sweep in the background at this interval
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - status change email
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;

use modesta_commerce::config::{
    EmailConfig, get_database_url, get_env_or_default, get_optional_env, parse_env,
};
use modesta_commerce::{CommerceConfig, ConfigError};

const DEFAULT_STOREFRONT_BASE_URL: &str = "http://localhost:3000";

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub commerce: CommerceConfig,
    /// Background orphan sweep interval; no background sweep when `None`
    pub sweep_interval: Option<Duration>,
    /// SMTP settings; mail is only logged when absent
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host: IpAddr = parse_env("ADMIN_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = parse_env("ADMIN_PORT", 3001)?;

        let commerce = CommerceConfig::from_env(get_env_or_default(
            "STOREFRONT_BASE_URL",
            DEFAULT_STOREFRONT_BASE_URL,
        ))?;
        let sweep_interval = sweep_interval(get_optional_env("ORPHAN_SWEEP_INTERVAL_SECS"))?;
        let email = EmailConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            commerce,
            sweep_interval,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn sweep_interval(raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let invalid = |reason: &str| {
        ConfigError::InvalidEnvVar("ORPHAN_SWEEP_INTERVAL_SECS".to_string(), reason.to_string())
    };
    let secs: u64 = raw.trim().parse().map_err(|_| invalid("not a number"))?;
    if secs == 0 {
        return Err(invalid("must be positive"));
    }
    Ok(Some(Duration::from_secs(secs)))
}
