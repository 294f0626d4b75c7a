//! Unified error handling for the sheriff crate
//!
//! Domain modules keep their own error types; this module wraps them into a
//! single `Error` so the binary and the trigger loop can treat them
//! uniformly.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sheriff::error::{Error, ErrorCategory};
//!
//! fn report(err: &Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), error = %err, "continuing");
//!     } else {
//!         tracing::error!(error = %err, "fatal");
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::notifications::NotifyError;
pub use crate::rotation::RotationError;
pub use crate::scheduler::error::SchedulerError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Reading or writing persisted files
    Storage,
    /// Startup configuration problems
    Config,
    /// Trigger and timing problems
    Scheduler,
    /// Roster and rotation problems
    Rotation,
    /// Outbound notification problems
    Notification,
}

impl ErrorCategory {
    /// Short lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Rotation => "rotation",
            Self::Notification => "notification",
        }
    }
}

/// Unified error type for the sheriff crate
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a persisted file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A persisted file exists but cannot be understood
    #[error("Malformed file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// Roster and rotation errors
    #[error("Rotation error: {0}")]
    Rotation(#[from] RotationError),

    /// Trigger errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create an I/O error tagged with the file it concerns
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-file error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the scheduling loop may continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Malformed { .. } => true,
            Self::Rotation(_) => false,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Notify(_) => true,
            Self::Config(_) => false,
        }
    }

    /// Error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } | Self::Malformed { .. } => ErrorCategory::Storage,
            Self::Rotation(_) => ErrorCategory::Rotation,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Notify(_) => ErrorCategory::Notification,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = Error::io(
            "/tmp/daysoff.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/daysoff.txt"));
        assert!(msg.contains("denied"));
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_rotation_error_is_fatal() {
        let err: Error = RotationError::EmptyRoster.into();
        assert_eq!(err.category(), ErrorCategory::Rotation);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("no team members configured");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
        assert_eq!(err.category().as_str(), "config");
    }

    #[test]
    fn test_notify_error_is_recoverable() {
        let err: Error = NotifyError::Unavailable("hub down".to_string()).into();
        assert!(err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Notification);
    }
}
