//! Error types for source extraction and dependency installation.
//!
//! Errors are categorized so the caller can tell a resolution problem
//! (clone failed) from a dependency problem (manifest install failed).

use std::path::PathBuf;
use thiserror::Error;

/// Categories of sourcekit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Cloning a source repository failed
    Resolution,
    /// Installing a dependency manifest failed
    Dependency,
    /// Filesystem or ownership problem
    Filesystem,
    /// A required external tool is missing
    ToolNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Resolution => "Source resolution failed",
            Self::Dependency => "Dependency installation failed",
            Self::Filesystem => "Filesystem error",
            Self::ToolNotFound => "Required tool not found",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Resolution => "Check the repository URL, the pinned ref and your credentials",
            Self::Dependency => "Inspect the manifest and the installer output, then re-run",
            Self::Filesystem => "Check directory permissions and free space",
            Self::ToolNotFound => "Install the missing tool and make sure it is on $PATH",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while materializing sources.
#[derive(Debug, Error)]
pub enum Error {
    /// `git clone` exited with a non-zero status
    #[error("failed to clone {source_name} ({url} @ {git_ref}): {stderr}")]
    CloneFailed {
        /// Name of the source entry
        source_name: String,
        /// Clone URL
        url: String,
        /// Pinned ref
        git_ref: String,
        /// Standard error output of the clone
        stderr: String,
    },

    /// A dependency manifest failed to install
    #[error("failed to install dependencies from {}: {stderr}", .manifest.display())]
    InstallFailed {
        /// Manifest that failed
        manifest: PathBuf,
        /// Standard error output of the installer
        stderr: String,
    },

    /// The virtual environment could not be created
    #[error("failed to create virtual environment at {}: {stderr}", .path.display())]
    VenvFailed {
        /// Virtual environment root
        path: PathBuf,
        /// Standard error output of the venv tool
        stderr: String,
    },

    /// Owner or group name does not exist on this system
    #[error("unknown {kind} '{name}'")]
    UnknownPrincipal {
        /// "user" or "group"
        kind: &'static str,
        /// Name that failed to resolve
        name: String,
    },

    /// External tool could not be executed
    #[error("failed to execute {tool}: {message}")]
    ToolNotFound {
        /// Tool name
        tool: String,
        /// Underlying OS error
        message: String,
    },

    /// IO error on a specific path
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Directory walk error
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Build an IO error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CloneFailed { .. } => ErrorCategory::Resolution,
            Self::InstallFailed { .. } | Self::VenvFailed { .. } => ErrorCategory::Dependency,
            Self::UnknownPrincipal { .. } | Self::Io { .. } | Self::Walk(_) => {
                ErrorCategory::Filesystem
            }
            Self::ToolNotFound { .. } => ErrorCategory::ToolNotFound,
        }
    }
}

/// Result type for sourcekit operations.
pub type Result<T> = std::result::Result<T, Error>;
