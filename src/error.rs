//! Error types for wfm
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid config)
//! - 4: Operation failed (io, serialization, lock contention)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskId;

/// Exit codes for the wfm CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for wfm operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task not found with id: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown reference type: {0}")]
    UnknownReferenceType(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::TaskNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::UnknownReferenceType(_)
            | Error::UnknownTaskType(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured fields for machine-readable error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::UnknownReferenceType(value) => {
                Some(serde_json::json!({ "reference_type": value }))
            }
            Error::UnknownTaskType(value) => Some(serde_json::json!({ "task_type": value })),
            Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path.to_string_lossy() }))
            }
            _ => None,
        }
    }
}

/// Result type alias for wfm operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_split_user_and_operation_errors() {
        assert_eq!(Error::TaskNotFound(3).exit_code(), exit_codes::USER_ERROR);
        assert_eq!(
            Error::UnknownTaskType("X".to_string()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::LockFailed(PathBuf::from("tasks.lock")).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn not_found_carries_task_id() {
        let err = Error::TaskNotFound(12);
        assert_eq!(err.to_string(), "Task not found with id: 12");
        assert_eq!(err.details(), Some(serde_json::json!({ "task_id": 12 })));
        assert!(Error::InvalidArgument("x".to_string()).details().is_none());
    }
}
