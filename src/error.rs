//! Error types for taskzen
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid config, not signed in)
//! - 3: Auth failure (sign-in/out rejected by the identity provider)
//! - 4: Operation failed (persistence, IO, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tz CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const AUTH_FAILED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskzen operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found: {subtask} (task {task})")]
    SubtaskNotFound { task: String, subtask: String },

    // Auth failures (exit code 3)
    #[error("Authentication failed: {0}")]
    Auth(String),

    // Operation failures (exit code 4)
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotSignedIn
            | Error::TaskNotFound(_)
            | Error::SubtaskNotFound { .. } => exit_codes::USER_ERROR,

            // Auth failures
            Error::Auth(_) => exit_codes::AUTH_FAILED,

            // Operation failures
            Error::Persistence(_)
            | Error::SubscriptionClosed
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured detail payload for JSON error envelopes, when any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::SubtaskNotFound { task, subtask } => Some(serde_json::json!({
                "task": task,
                "subtask": subtask,
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskzen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error body for JSON envelopes
#[derive(serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let kind = match err.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            exit_codes::AUTH_FAILED => "auth_failed",
            _ => "operation_failed",
        };
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind,
            details: err.details(),
        }
    }
}
