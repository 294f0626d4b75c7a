//! Notification of duty changes
//!
//! The rotation engine only learns whether telling people about a new
//! person-on-duty worked; how the message travels is decided here.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────┐
//! │      RotationTrigger       │
//! │  advance -> persist -> ... │
//! └────────────────────────────┘
//!               │ notify_current(name)
//!        ┌──────┴──────┐
//!        ▼             ▼
//!   ┌─────────┐   ┌─────────┐
//!   │   Log   │   │ Webhook │
//!   │Notifier │   │Notifier │
//!   └─────────┘   └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sheriff::notifications::{Notifier, WebhookConfig, WebhookNotifier};
//!
//! let config = WebhookConfig::new("https://chat.example.com/v2/room/ops/notification")
//!     .with_auth_token("secret-token")
//!     .with_room("ops");
//!
//! let notifier = WebhookNotifier::new(config)?;
//! notifier.notify_current("alice").await?;
//! ```

pub mod template;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::NotifierConfig;

pub use template::{
    MessageTemplate, DEFAULT_QUESTION_TEMPLATE, DEFAULT_TEMPLATE, DEFAULT_TOPIC_TEMPLATE,
};
pub use webhook::{WebhookConfig, WebhookNotifier};

/// Errors that can occur while notifying
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Notifier temporarily unavailable
    #[error("Notifier temporarily unavailable: {0}")]
    Unavailable(String),

    /// Message template could not be compiled or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Generic error
    #[error("Notification error: {0}")]
    Other(String),
}

impl NotifyError {
    /// Whether another attempt may succeed.
    ///
    /// Client errors (4xx other than 429) and configuration problems are
    /// final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable(_) => true,
            Self::InvalidConfig(_) | Self::Template(_) | Self::Other(_) => false,
        }
    }
}

/// Outcome of a delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was delivered
    pub success: bool,
    /// Notifier that handled the delivery
    pub channel: String,
    /// Optional detail about the delivery
    pub message: Option<String>,
    /// Time of the delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Successful delivery
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Successful delivery with a detail message
    pub fn success_with_message(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Failed delivery
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Receives the name of every new person-on-duty, and relays questions
/// to them
///
/// Implementations run outside the rotation loop; a slow or failing
/// notifier never holds up the next advance.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name used in logs and events
    fn name(&self) -> &str;

    /// Tell the team that `person` is now on duty and update the room topic
    async fn notify_current(&self, person: &str) -> Result<DeliveryStatus, NotifyError>;

    /// Ask `person`, who is on duty, to look at a question from `asker`
    async fn relay_question(
        &self,
        person: &str,
        asker: &str,
    ) -> Result<DeliveryStatus, NotifyError>;
}

// ============================================================================
// Log notifier
// ============================================================================

/// Notifier that only writes the rendered message to the log
pub struct LogNotifier {
    template: MessageTemplate,
}

impl LogNotifier {
    /// Log notifier with the default message
    pub fn new() -> Self {
        Self {
            template: MessageTemplate::default(),
        }
    }

    /// Log notifier with a custom message template
    pub fn with_template(template: MessageTemplate) -> Self {
        Self { template }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_current(&self, person: &str) -> Result<DeliveryStatus, NotifyError> {
        let message = self.template.render(person)?;
        let topic = self.template.render_topic(person)?;
        tracing::info!(person = %person, message = %message, topic = %topic, "Person-on-duty changed");
        Ok(DeliveryStatus::success_with_message(self.name(), message))
    }

    async fn relay_question(
        &self,
        person: &str,
        asker: &str,
    ) -> Result<DeliveryStatus, NotifyError> {
        let message = self.template.render_question(person, asker)?;
        tracing::info!(person = %person, asker = %asker, message = %message, "Question relayed");
        Ok(DeliveryStatus::success_with_message(self.name(), message))
    }
}

/// Build the notifier described by `config`.
///
/// A configured webhook URL selects [`WebhookNotifier`]; otherwise the
/// assignment is only logged.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let template = MessageTemplate::new(&config.template)?
        .with_topic(&config.topic_template)?
        .with_question(&config.question_template)?
        .with_room(config.room.clone());

    let Some(url) = config.webhook_url.as_deref() else {
        tracing::info!("No webhook configured, duty changes will only be logged");
        return Ok(Arc::new(LogNotifier::with_template(template)));
    };

    let mut webhook = WebhookConfig::new(url)
        .with_template(config.template.clone())
        .with_topic_template(config.topic_template.clone())
        .with_question_template(config.question_template.clone())
        .with_timeout(config.timeout_secs)
        .with_max_retries(config.max_retries);
    if let Some(token) = &config.auth_token {
        webhook = webhook.with_auth_token(token.clone());
    }
    if let Some(room) = &config.room {
        webhook = webhook.with_room(room.clone());
    }

    Ok(Arc::new(WebhookNotifier::new(webhook)?))
}
