//! Error taxonomy for the workspace tools

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for workspace operations.
///
/// Every variant is fatal for the running invocation. Soft conditions such as
/// a clamped duration are reported through operation outcomes instead.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not allowed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("No more extensions left for workspace '{0}'")]
    ExtensionsExhausted(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid database entry {}: {reason}", path.display())]
    Record { path: PathBuf, reason: String },

    #[error(
        "Release incomplete: database entry moved to {}, but directory {} could not be moved: {reason}",
        record.display(),
        directory.display()
    )]
    PartialRelease {
        record: PathBuf,
        directory: PathBuf,
        reason: String,
    },
}

impl WsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WsError>;
