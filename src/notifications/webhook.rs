//! Webhook notifier
//!
//! Posts the rendered announcement, together with the new room topic, as
//! JSON to a chat room notification endpoint, retrying transient failures
//! with exponential backoff. Relayed questions go to the same endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    DeliveryStatus, MessageTemplate, Notifier, NotifyError, DEFAULT_QUESTION_TEMPLATE,
    DEFAULT_TEMPLATE, DEFAULT_TOPIC_TEMPLATE,
};
use crate::utils::retry::{retry_if, BackoffPolicy};

/// Webhook notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Room name included in the payload and the template
    pub room: Option<String>,
    /// Handlebars message template
    #[serde(default = "default_template")]
    pub template: String,
    /// Handlebars room topic template
    #[serde(default = "default_topic_template")]
    pub topic_template: String,
    /// Handlebars question ping template
    #[serde(default = "default_question_template")]
    pub question_template: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: BackoffPolicy,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_topic_template() -> String {
    DEFAULT_TOPIC_TEMPLATE.to_string()
}

fn default_question_template() -> String {
    DEFAULT_QUESTION_TEMPLATE.to_string()
}

fn default_timeout() -> u64 {
    10
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            room: None,
            template: default_template(),
            topic_template: default_topic_template(),
            question_template: default_question_template(),
            timeout_secs: default_timeout(),
            retry: BackoffPolicy::default(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the room name
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Set the message template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Set the room topic template
    pub fn with_topic_template(mut self, template: impl Into<String>) -> Self {
        self.topic_template = template.into();
        self
    }

    /// Set the question ping template
    pub fn with_question_template(mut self, template: impl Into<String>) -> Self {
        self.question_template = template.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries, keeping the current delays
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replace the whole retry policy
    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Webhook notifier
///
/// # Payload Format
///
/// ```json
/// {
///   "event": "duty_changed",
///   "from": "sheriff",
///   "message_format": "text",
///   "color": "green",
///   "notify": true,
///   "message": "Today's person-on-duty is alice",
///   "person": "alice",
///   "room": "ops",
///   "topic": "Current person on-duty: alice"
/// }
/// ```
///
/// A relayed question has `"event": "question"`, an `"asker"` field and no
/// topic.
pub struct WebhookNotifier {
    config: WebhookConfig,
    template: MessageTemplate,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        config.validate().map_err(NotifyError::InvalidConfig)?;

        let template = MessageTemplate::new(&config.template)?
            .with_topic(&config.topic_template)?
            .with_question(&config.question_template)?
            .with_room(config.room.clone());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            template,
            client,
        })
    }

    /// Create a webhook notifier with just a URL
    pub fn from_url(url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(&self, event: &str, person: &str, message: &str) -> serde_json::Value {
        serde_json::json!({
            "event": event,
            "from": "sheriff",
            "message_format": "text",
            "color": "green",
            "notify": true,
            "message": message,
            "person": person,
            "room": self.config.room,
        })
    }

    async fn post_once(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.config.url);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!(url = %self.config.url, status = %status, "Webhook accepted");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Err(NotifyError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn deliver(
        &self,
        person: &str,
        payload: &serde_json::Value,
    ) -> Result<DeliveryStatus, NotifyError> {
        match retry_if(
            &self.config.retry,
            || self.post_once(payload),
            NotifyError::is_retryable,
        )
        .await
        {
            Ok(()) => {
                tracing::info!(url = %self.config.url, person = %person, "Webhook delivered");
                Ok(DeliveryStatus::success_with_message(
                    self.name(),
                    format!("Delivered to {}", self.config.url),
                ))
            }
            Err(e) => {
                tracing::error!(url = %self.config.url, error = %e, "Failed to deliver webhook");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify_current(&self, person: &str) -> Result<DeliveryStatus, NotifyError> {
        let message = self.template.render(person)?;
        let mut payload = self.build_payload("duty_changed", person, &message);
        payload["topic"] = self.template.render_topic(person)?.into();

        self.deliver(person, &payload).await
    }

    async fn relay_question(
        &self,
        person: &str,
        asker: &str,
    ) -> Result<DeliveryStatus, NotifyError> {
        let message = self.template.render_question(person, asker)?;
        let mut payload = self.build_payload("question", person, &message);
        payload["asker"] = asker.into();

        self.deliver(person, &payload).await
    }
}
