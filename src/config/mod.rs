//! Configuration management for sheriff
//!
//! Settings come from an optional TOML file and are then overridden by
//! `SHERIFF_*` environment variables. Missing settings fall back to
//! defaults, so an empty environment plus a team roster is enough to run.
//!
//! ```toml
//! [team]
//! members = ["alice", "bob", "carol"]
//! daysoff_file = "daysoff.txt"
//! state_file = "cache.txt"
//! question_interval_secs = 10
//!
//! [trigger]
//! schedule = "0 9 * * Mon-Fri"
//!
//! [notifier]
//! webhook_url = "https://chat.example.com/v2/room/ops/notification"
//! room = "ops"
//! topic_template = "Current person on-duty: {{name}}"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::notifications::{DEFAULT_QUESTION_TEMPLATE, DEFAULT_TEMPLATE, DEFAULT_TOPIC_TEMPLATE};
use crate::scheduler::TriggerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roster and persistence paths
    pub team: TeamConfig,

    /// Rotation schedule
    pub trigger: TriggerConfig,

    /// Announcement delivery
    pub notifier: NotifierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Roster and persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Names taking part in the rotation
    pub members: Vec<String>,

    /// Availability records file
    pub daysoff_file: PathBuf,

    /// Rotation index file
    pub state_file: PathBuf,

    /// Minimum seconds between two questions relayed to the sheriff
    pub question_interval_secs: u64,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            daysoff_file: PathBuf::from("daysoff.txt"),
            state_file: PathBuf::from("cache.txt"),
            question_interval_secs: 10,
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Webhook endpoint; announcements are only logged when absent
    pub webhook_url: Option<String>,

    /// Bearer token for the webhook
    pub auth_token: Option<String>,

    /// Room name passed to the template and the payload
    pub room: Option<String>,

    /// Handlebars announcement template
    pub template: String,

    /// Handlebars room topic template, set on every duty change
    pub topic_template: String,

    /// Handlebars template for questions relayed to the sheriff
    pub question_template: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after a failed delivery
    pub max_retries: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            auth_token: None,
            room: None,
            template: DEFAULT_TEMPLATE.to_string(),
            topic_template: DEFAULT_TOPIC_TEMPLATE.to_string(),
            question_template: DEFAULT_QUESTION_TEMPLATE.to_string(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load the file at `path` if it exists, then apply environment overrides.
    ///
    /// A missing file means defaults; a path that exists but is not a
    /// regular file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            if !path.is_file() {
                anyhow::bail!("{} is not a file", path.display());
            }
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `SHERIFF_*` environment variables; empty values are ignored
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(members) = env_var("SHERIFF_TEAM_MEMBERS") {
            self.team.members = split_members(&members);
        }
        if let Some(path) = env_var("SHERIFF_TEAM_DAYSOFF_FILE") {
            self.team.daysoff_file = PathBuf::from(path);
        }
        if let Some(path) = env_var("SHERIFF_TEAM_STATE_FILE") {
            self.team.state_file = PathBuf::from(path);
        }
        if let Some(secs) = env_var("SHERIFF_TEAM_QUESTION_INTERVAL_SECS") {
            match secs.parse() {
                Ok(secs) => self.team.question_interval_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "Ignoring non-numeric SHERIFF_TEAM_QUESTION_INTERVAL_SECS"),
            }
        }
        if let Some(schedule) = env_var("SHERIFF_TRIGGER_SCHEDULE") {
            self.trigger.schedule = schedule;
        }
        if let Some(url) = env_var("SHERIFF_NOTIFY_WEBHOOK_URL") {
            self.notifier.webhook_url = Some(url);
        }
        if let Some(token) = env_var("SHERIFF_NOTIFY_AUTH_TOKEN") {
            self.notifier.auth_token = Some(token);
        }
        if let Some(room) = env_var("SHERIFF_NOTIFY_ROOM") {
            self.notifier.room = Some(room);
        }
        if let Some(template) = env_var("SHERIFF_NOTIFY_TEMPLATE") {
            self.notifier.template = template;
        }
        if let Some(template) = env_var("SHERIFF_NOTIFY_TOPIC_TEMPLATE") {
            self.notifier.topic_template = template;
        }
        if let Some(template) = env_var("SHERIFF_NOTIFY_QUESTION_TEMPLATE") {
            self.notifier.question_template = template;
        }
        if let Some(level) = env_var("SHERIFF_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_var("SHERIFF_LOG_FORMAT") {
            self.logging.format = format;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.team.members.iter().all(|m| m.trim().is_empty()) {
            anyhow::bail!("team.members must name at least one person (SHERIFF_TEAM_MEMBERS)");
        }

        self.trigger
            .validate()
            .context("trigger.schedule is not a usable cron expression")?;

        if let Some(url) = &self.notifier.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("notifier.webhook_url must start with http:// or https://");
            }
        }

        if self.notifier.timeout_secs == 0 {
            anyhow::bail!("notifier.timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_members(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
