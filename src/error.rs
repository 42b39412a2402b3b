//! Error kinds the build orchestrator branches on.
//!
//! A [`CompletionError`] aborts a whole run, a [`PackageError`] only skips the
//! language it was raised for.

use std::path::PathBuf;

/// Failure while building a single language package.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageError {
    /// The language code has no files in the repository
    NotFound(String),
    /// The archive could not be created or written
    Archive { path: PathBuf, reason: String },
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageError::NotFound(code) => {
                write!(
                    f,
                    "Language {} does not exist in the repository",
                    code
                )
            }
            PackageError::Archive { path, reason } => {
                write!(f, "Can not create ZIP file {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for PackageError {}

/// Failure while fetching translation completion from the translation service.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// The request never got a response (connection refused, TLS failure, ...)
    Transport(String),
    /// The service answered with something other than HTTP 200
    HttpStatus(u16),
    /// The response body is not the expected JSON
    Parse(String),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Transport(cause) => {
                write!(f, "Translation service request failed: {}", cause)
            }
            CompletionError::HttpStatus(status) => {
                write!(f, "Unexpected HTTP status {}", status)
            }
            CompletionError::Parse(cause) => {
                write!(
                    f,
                    "Invalid return from the translation service (cannot parse as JSON): {}",
                    cause
                )
            }
        }
    }
}

impl std::error::Error for CompletionError {}
