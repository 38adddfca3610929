//! Linux privilege handling for the workspace tools
//!
//! Provides:
//! - Capability brackets around single privileged syscalls, in POSIX
//!   capability mode or setuid mode
//! - Interrupt masking and umask tightening for the duration of a mutation
//! - Resolution of the calling identity and its groups
//! - Directory relocation with an external-mover fallback for cross-device moves
//! - A recording mock strategy for unprivileged tests

mod capability;
mod guard;
mod identity;
mod mock;
mod mover;

pub use capability::*;
pub use guard::*;
pub use identity::*;
pub use mock::*;
pub use mover::*;

use thiserror::Error;
use ws_util::WsError;

/// Errors from privilege transitions
#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("Could not raise {cap}: {reason}")]
    RaiseFailed { cap: Capability, reason: String },

    #[error("Could not lower {cap}: {reason}")]
    LowerFailed { cap: Capability, reason: String },

    #[error("{0} is already raised")]
    Reentrant(Capability),

    #[error("Could not switch effective identity: {0}")]
    IdentitySwitch(String),

    #[error("Could not reduce the permitted set: {0}")]
    Initialize(String),
}

impl From<PrivilegeError> for WsError {
    fn from(e: PrivilegeError) -> Self {
        WsError::Privilege(e.to_string())
    }
}

pub type PrivilegeResult<T> = Result<T, PrivilegeError>;
