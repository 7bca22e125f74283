//! Fire-and-forget customer email.
//!
//! Order processing never waits on mail. Services hand a [`Notification`] to
//! [`notify_detached`], which sends it on a background task and logs failures.
//! SMTP delivery uses lettre with plain-text Askama templates; without SMTP
//! configuration the [`LogNotifier`] records what would have been sent.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};

use modesta_core::{Email, OrderId, OrderStatus, Price};

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A line on the order confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationLine {
    pub name: String,
    pub quantity: u32,
}

/// A message to a customer.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Payment was received for an order.
    OrderConfirmed {
        to: Email,
        customer_name: String,
        order_id: OrderId,
        total: Price,
        lines: Vec<ConfirmationLine>,
    },
    /// An admin moved an order to a new status.
    StatusChanged {
        to: Email,
        customer_name: String,
        order_id: OrderId,
        status: OrderStatus,
        tracking: Option<String>,
    },
    /// A customer account was created at checkout with a one-time password.
    WelcomeCredential {
        to: Email,
        customer_name: String,
        credential: SecretString,
    },
}

#[derive(Template)]
#[template(path = "email/order_confirmed.txt")]
struct OrderConfirmedText<'a> {
    customer_name: &'a str,
    order_id: OrderId,
    total: &'a Price,
    lines: &'a [ConfirmationLine],
}

#[derive(Template)]
#[template(path = "email/status_changed.txt")]
struct StatusChangedText<'a> {
    customer_name: &'a str,
    order_id: OrderId,
    status: OrderStatus,
    tracking: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/welcome_credential.txt")]
struct WelcomeCredentialText<'a> {
    customer_name: &'a str,
    email: &'a str,
    credential: &'a str,
}

impl Notification {
    /// Recipient address.
    #[must_use]
    pub const fn recipient(&self) -> &Email {
        match self {
            Self::OrderConfirmed { to, .. }
            | Self::StatusChanged { to, .. }
            | Self::WelcomeCredential { to, .. } => to,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OrderConfirmed { .. } => "order_confirmed",
            Self::StatusChanged { .. } => "status_changed",
            Self::WelcomeCredential { .. } => "welcome_credential",
        }
    }

    /// Subject line and plain-text body.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Template` if rendering fails.
    pub fn render(&self) -> Result<(String, String), NotifyError> {
        Ok(match self {
            Self::OrderConfirmed {
                customer_name,
                order_id,
                total,
                lines,
                ..
            } => (
                format!("Your Modesta order #{order_id} is confirmed"),
                OrderConfirmedText {
                    customer_name,
                    order_id: *order_id,
                    total,
                    lines,
                }
                .render()?,
            ),
            Self::StatusChanged {
                customer_name,
                order_id,
                status,
                tracking,
                ..
            } => (
                format!("Order #{order_id} is now {status}"),
                StatusChangedText {
                    customer_name,
                    order_id: *order_id,
                    status: *status,
                    tracking: tracking.as_deref(),
                }
                .render()?,
            ),
            Self::WelcomeCredential {
                to,
                customer_name,
                credential,
            } => (
                "Welcome to Modesta".to_owned(),
                WelcomeCredentialText {
                    customer_name,
                    email: to.as_str(),
                    credential: credential.expose_secret(),
                }
                .render()?,
            ),
        })
    }
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Send on a background task. Failures are logged at warn and otherwise ignored.
pub fn notify_detached(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            warn!(
                kind = notification.kind(),
                error = %e,
                "Failed to send notification"
            );
        }
    });
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (subject, body) = notification.render()?;
        let to = notification.recipient();

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(email).await?;
        info!(kind = notification.kind(), "Email sent");
        Ok(())
    }
}

/// Logs instead of sending. Used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (subject, _) = notification.render()?;
        info!(
            kind = notification.kind(),
            to = %notification.recipient(),
            subject = %subject,
            "Email not sent (SMTP not configured)"
        );
        Ok(())
    }
}

/// Build the notifier for the given configuration.
///
/// # Errors
///
/// Returns error if SMTP is configured but the relay cannot be set up.
pub fn from_config(config: Option<&EmailConfig>) -> Result<Arc<dyn Notifier>, SmtpError> {
    Ok(match config {
        Some(config) => Arc::new(SmtpNotifier::new(config)?),
        None => Arc::new(LogNotifier),
    })
}

/// Keeps every notification in memory.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Yield to the runtime until at least `count` notifications arrived or
    /// the detached tasks have had ample chances to run.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::task::yield_now().await;
        }
        self.sent()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        notification.render()?;
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}
