//! sheriff - duty rotation for small teams
//!
//! Rotates a single person-on-duty ("sheriff") through a fixed roster on a
//! cron schedule, skipping whoever declared the day off.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`availability`] - Days off per person and their text file
//! - [`rotation`] - Round-robin engine and the persisted rotation index
//! - [`scheduler`] - Cron trigger that advances, persists and notifies
//! - [`commands`] - Chat and operator commands against the duty desk
//! - [`notifications`] - Announcing the new person-on-duty
//! - [`config`] - Configuration management and settings
//! - [`error`] - Crate-wide error type
//! - [`utils`] - Atomic writes, backoff and formatting helpers
//!
//! # Example
//!
//! ```no_run
//! use sheriff::config::Config;
//! use sheriff::scheduler::RotationTrigger;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let handle = RotationTrigger::from_config(&config)?.spawn();
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod availability;
pub mod commands;
pub mod config;
pub mod error;
pub mod notifications;
pub mod rotation;
pub mod scheduler;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::availability::{Availability, AvailabilityStore, DayOff};
    pub use crate::commands::{parse_line, Command, DutyDesk, Reply};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::notifications::{LogNotifier, Notifier, WebhookNotifier};
    pub use crate::rotation::{Assignment, FileStateStore, RotationEngine, StateStore};
    pub use crate::scheduler::{RotationTrigger, TriggerConfig, TriggerEvent, TriggerHandle};
}

// Direct re-exports for convenience
pub use availability::{AvailabilityStore, DayOff};
pub use rotation::{Assignment, RotationEngine};
