//! Recurring rotation trigger
//!
//! A cron expression decides when the duty changes hands. The trigger loop
//! serializes timer fires and operator commands, persists every new index,
//! and reports outcomes as [`TriggerEvent`]s.
//!
//! # Architecture
//!
//! ```text
//!   cron timer ──┐
//!                ▼
//!   commands ──▶ RotationTrigger ──▶ DutyDesk (engine + availability)
//!                │         │
//!                │         └──▶ StateStore (last_idx)
//!                ▼
//!           Notifier task ──▶ TriggerEvent broadcast
//! ```
//!
//! # Modules
//!
//! - [`trigger`] - Trigger loop, handles and events
//! - [`error`] - Scheduler error types
//!
//! # Example
//!
//! ```ignore
//! use sheriff::scheduler::{RotationTrigger, TriggerConfig};
//!
//! let trigger = RotationTrigger::new(TriggerConfig::default(), desk, state, notifier)?;
//! let handle = trigger.spawn();
//!
//! let outcome = handle.switch_now().await?;
//! println!("Now on duty: {}", outcome.assignment);
//!
//! handle.shutdown().await?;
//! ```

pub mod error;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use trigger::{
    next_fire, parse_cron, AdvanceOutcome, AdvanceReason, CommandSender, RotationTrigger,
    TriggerConfig, TriggerEvent, TriggerHandle, DEFAULT_SCHEDULE,
};
