//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Cron expression could not be parsed
    InvalidSchedule { expr: String, reason: String },

    /// The schedule never fires again
    NoUpcomingFire { expr: String },

    /// Trigger configuration error
    TriggerConfigError { field: String, reason: String },

    /// Trigger execution error
    TriggerExecutionFailed { reason: String },

    /// The trigger loop is gone and cannot take requests
    LoopStopped,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSchedule { expr, reason } => {
                write!(f, "Invalid schedule expression '{}': {}", expr, reason)
            }
            Self::NoUpcomingFire { expr } => {
                write!(f, "Schedule '{}' has no upcoming fire time", expr)
            }
            Self::TriggerConfigError { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::TriggerExecutionFailed { reason } => {
                write!(f, "Trigger execution failed: {}", reason)
            }
            Self::LoopStopped => write!(f, "Trigger loop is not running"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid schedule error
    pub fn invalid_schedule(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-upcoming-fire error
    pub fn no_upcoming_fire(expr: impl Into<String>) -> Self {
        Self::NoUpcomingFire { expr: expr.into() }
    }

    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a trigger execution error
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::TriggerExecutionFailed {
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TriggerExecutionFailed { .. })
    }
}
