//! Error taxonomy for the task engines.

use thiserror::Error;

/// Errors surfaced by the store adapter and the mutation engines.
///
/// `Corrupt` is per-record and never fatal to a listing: callers log and
/// skip. Recurrence failures are swallowed at the engine boundary so the
/// primary task write always succeeds.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced task, property or user does not exist or is soft-deleted.
    #[error("{0} not found")]
    NotFound(String),

    /// A stored record's embedded JSON could not be parsed.
    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Bulk operation received no task ids.
    #[error("no task ids supplied")]
    EmptyOperation,

    /// Bulk operation targets were all outside the caller's access set.
    #[error("no accessible tasks in the requested set")]
    NoAccessibleTasks,

    /// Recurrence pattern references an unsupported shape.
    #[error("invalid recurrence pattern: {0}")]
    InvalidRecurrence(String),

    /// Malformed input to task creation or update.
    #[error("{0}")]
    Validation(String),

    /// Status transition rejected by the state machine.
    #[error("cannot move task from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::fields::Status,
        to: crate::fields::Status,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
