//! Small enums shared between the policy store and the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which lifecycle operation a request belongs to.
///
/// Filesystem selection and limit resolution depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// First-time allocation or reuse of an existing workspace
    Allocate,
    /// Allocation request with the extend flag set
    Extend,
    Release,
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allocate => "allocate",
            Self::Extend => "extend",
            Self::Release => "release",
            Self::Restore => "restore",
        };
        f.write_str(s)
    }
}

/// How privileged syscalls get their elevation. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeMode {
    /// Raise single POSIX capabilities in the effective set around each syscall
    #[default]
    Capabilities,
    /// Switch the effective uid between root and the database owner
    Setuid,
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capabilities => f.write_str("capabilities"),
            Self::Setuid => f.write_str("setuid"),
        }
    }
}
