//! Shared configuration for the order lifecycle, loaded from environment variables.
//!
//! The storefront, admin, and CLI binaries each build their own config struct;
//! the pieces they have in common (Stripe, SMTP, checkout settings) and the env
//! helpers live here.
//!
//! # Environment Variables
//!
//! ## Checkout
//! - `STORE_CURRENCY` - Settlement currency (default: USD)
//! - `CUSTOMER_PROFILE_POLICY` - `overwrite` (default) or `fill_blanks`
//! - `ORPHAN_ORDER_TTL_HOURS` - Age after which sessionless pending orders are cancelled (default: 24)
//!
//! ## Stripe
//! - `STRIPE_SECRET_KEY` - API secret key (required where payments are made)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret (optional; webhook disabled without it)
//! - `STRIPE_API_BASE` - API base URL (default: <https://api.stripe.com>)
//!
//! ## Email (all optional; mail is logged instead of sent when `SMTP_HOST` is unset)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `EMAIL_FROM` - Sender address

use std::collections::HashMap;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use modesta_core::CurrencyCode;

use crate::gateway::SESSION_ID_PLACEHOLDER;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// How a repeat checkout treats the stored customer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileMergePolicy {
    /// Replace name, phone, and address with whatever the latest checkout supplied.
    #[default]
    Overwrite,
    /// Only write fields that are currently empty.
    FillBlanks,
}

impl FromStr for ProfileMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "fill_blanks" | "merge" => Ok(Self::FillBlanks),
            other => Err(format!("unknown profile policy: {other}")),
        }
    }
}

/// Settings the checkout and sweep services need.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Public base URL of the storefront (no trailing slash).
    pub base_url: String,
    /// Currency every order settles in.
    pub currency: CurrencyCode,
    pub profile_policy: ProfileMergePolicy,
    /// Pending orders without a payment session older than this are cancelled.
    pub orphan_ttl: chrono::Duration,
}

impl CommerceConfig {
    pub const DEFAULT_ORPHAN_TTL_HOURS: i64 = 24;

    /// Defaults for everything except the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            currency: CurrencyCode::default(),
            profile_policy: ProfileMergePolicy::default(),
            orphan_ttl: chrono::Duration::hours(Self::DEFAULT_ORPHAN_TTL_HOURS),
        }
    }

    /// Load checkout settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a value cannot be parsed.
    pub fn from_env(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let defaults = Self::new(base_url);
        let ttl_hours: i64 = parse_env(
            "ORPHAN_ORDER_TTL_HOURS",
            Self::DEFAULT_ORPHAN_TTL_HOURS,
        )?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ORPHAN_ORDER_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            currency: parse_env("STORE_CURRENCY", defaults.currency)?,
            profile_policy: parse_env("CUSTOMER_PROFILE_POLICY", defaults.profile_policy)?,
            orphan_ttl: chrono::Duration::hours(ttl_hours),
            ..defaults
        })
    }

    /// Where the gateway sends the shopper after paying.
    #[must_use]
    pub fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
            self.base_url
        )
    }

    /// Where the gateway sends the shopper after abandoning payment.
    #[must_use]
    pub fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.base_url)
    }
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: Option<SecretString>,
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl StripeConfig {
    pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

    /// Load Stripe configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the secret key is missing or fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_optional_env("STRIPE_WEBHOOK_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "STRIPE_WEBHOOK_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret,
            api_base: get_env_or_default("STRIPE_API_BASE", Self::DEFAULT_API_BASE),
        })
    }
}

/// SMTP configuration for transactional email.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailConfig {
    /// Load SMTP settings. Returns `None` when `SMTP_HOST` is not set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `SMTP_HOST` is set but the rest is incomplete.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", 587)?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if the variable is unset.
pub fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
#[must_use]
pub fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
#[must_use]
pub fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value is set but does not parse.
pub fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming `primary_key` if neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Load and validate a secret from environment.
///
/// # Errors
///
/// Returns `ConfigError` if the variable is missing, looks like a placeholder,
/// or has too little entropy.
pub fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-stripe-key-here", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength("sk_test_51Hq8Zk2eZvKYlo2C9xQ7rT0uW4", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_profile_policy_parse() {
        assert_eq!(
            "overwrite".parse::<ProfileMergePolicy>(),
            Ok(ProfileMergePolicy::Overwrite)
        );
        assert_eq!(
            "Fill-Blanks".parse::<ProfileMergePolicy>(),
            Ok(ProfileMergePolicy::FillBlanks)
        );
        assert!("sometimes".parse::<ProfileMergePolicy>().is_err());
    }

    #[test]
    fn test_redirect_urls() {
        let config = CommerceConfig::new("https://modesta.shop/");
        assert_eq!(
            config.success_url(),
            "https://modesta.shop/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(config.cancel_url(), "https://modesta.shop/checkout/cancel");
        assert_eq!(config.orphan_ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_live_super_sensitive"),
            webhook_secret: Some(SecretString::from("whsec_super_sensitive")),
            api_base: StripeConfig::DEFAULT_API_BASE.to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("api.stripe.com"));
        assert!(!debug_output.contains("super_sensitive"));
    }
}
