//! Unified error types for the mountgate workspace.
//!
//! Every variant is fatal for the launcher: per-line problems in the access
//! list are not errors, they are reported as diagnostics by the parser and
//! the offending line is dropped.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MountgateError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or document is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The access-list file failed an ownership, type, or permission check.
    #[error("unsafe config file {path}: {reason}")]
    UnsafeConfigFile {
        /// Path of the rejected file.
        path: PathBuf,
        /// Which check failed.
        reason: String,
    },

    /// The requested hostname cannot be used as a match key or path component.
    #[error("invalid hostname: {reason}")]
    InvalidHostname {
        /// Why the hostname was rejected.
        reason: String,
    },

    /// A system call failed.
    #[error("{call}: {source}")]
    Syscall {
        /// Rendered call, e.g. `mount("/pool/db","db",,MS_BIND,)`.
        call: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A permission or privilege error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },
}

impl MountgateError {
    /// Builds a [`MountgateError::Syscall`] from anything convertible into an
    /// I/O error (including `nix::errno::Errno`).
    pub fn syscall(call: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        Self::Syscall {
            call: call.into(),
            source: source.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountgateError>;
