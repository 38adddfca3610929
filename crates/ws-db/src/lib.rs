//! Record persistence for the workspace tools
//!
//! Provides:
//! - `WorkspaceRecord`, one TOML file per workspace, with a decoder for the
//!   legacy four-line layout
//! - `RecordDatabase`, the per-filesystem directory of active and trashed
//!   records, including trash generation naming

mod database;
mod legacy;
mod record;

pub use database::*;
pub use record::*;

use std::path::PathBuf;
use thiserror::Error;
use ws_privilege::PrivilegeError;
use ws_util::WsError;

/// Record errors
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unreadable database entry {}: {reason}", path.display())]
    Unrecoverable { path: PathBuf, reason: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No more extensions left")]
    ExtensionsExhausted,

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
}

impl From<toml::ser::Error> for RecordError {
    fn from(e: toml::ser::Error) -> Self {
        RecordError::Serialization(e.to_string())
    }
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<RecordError> for WsError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Unrecoverable { path, reason } => WsError::Record { path, reason },
            RecordError::Io { path, source } => {
                WsError::io(format!("database entry {}", path.display()), source)
            }
            RecordError::Serialization(reason) => WsError::Record {
                path: PathBuf::new(),
                reason,
            },
            RecordError::ExtensionsExhausted => WsError::ExtensionsExhausted(String::new()),
            RecordError::Privilege(e) => e.into(),
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;
