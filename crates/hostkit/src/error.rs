//! Error types for host bootstrap and administrative operations.

use crate::types::Stage;
use thiserror::Error;

/// Categories of hostkit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A bootstrap stage exited non-zero
    Bootstrap,
    /// A record the configurator needs does not exist
    NotFound,
    /// The administrative API rejected a call
    Remote,
    /// Transport problem talking to the instance
    Network,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Bootstrap => "Bootstrap stage failed",
            Self::NotFound => "Record not found",
            Self::Remote => "Administrative API error",
            Self::Network => "Could not reach the instance",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while driving the host application.
#[derive(Debug, Error)]
pub enum Error {
    /// A host CLI stage exited with a non-zero status
    #[error("{stage} failed (exit code {}): {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    StageFailed {
        /// Stage that failed
        stage: Stage,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Tail of the host's standard error
        stderr: String,
    },

    /// The host executable could not be started
    #[error("failed to execute {program}: {message}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        message: String,
    },

    /// A record looked up by the configurator does not exist
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of record ("module", "user", "group", "template")
        kind: &'static str,
        /// Identifier that was looked up
        name: String,
    },

    /// Authentication against the administrative API failed
    #[error("authentication failed for '{login}' on database '{database}'")]
    AuthFailed {
        /// Login used
        login: String,
        /// Database used
        database: String,
    },

    /// The administrative API returned an error payload
    #[error("remote error in {method}: {message}")]
    Remote {
        /// Model method that failed
        method: String,
        /// Error message from the server
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Unexpected response shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StageFailed { .. } | Self::Spawn { .. } => ErrorCategory::Bootstrap,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Remote { .. } | Self::AuthFailed { .. } => ErrorCategory::Remote,
            Self::Http(_) => ErrorCategory::Network,
            Self::InvalidResponse(_) => ErrorCategory::Other,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http(format!("HTTP {code}")),
            other => Self::Http(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for hostkit operations.
pub type Result<T> = std::result::Result<T, Error>;
