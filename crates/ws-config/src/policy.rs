//! Validated policy structures

use crate::schema::{RawConfig, RawFilesystem, RawUserException};
use crate::validation::parse_space_selection;
use std::collections::HashMap;
use std::path::PathBuf;
use ws_util::PrivilegeMode;

/// Default recursive move utility
pub const DEFAULT_MOVER: &str = "/bin/mv";

/// Validated policy ready for use by the engine
#[derive(Debug, Clone)]
pub struct Policy {
    /// Global fallback for implicit filesystem selection
    pub default_filesystem: Option<String>,

    /// Global duration cap in days
    pub duration: Option<i64>,

    /// Global extension count
    pub max_extensions: Option<i64>,

    /// Reminder lead time used when the caller gives none
    pub reminder_default: i64,

    /// Owner of every database entry
    pub db_owner: DbOwner,

    pub privilege: PrivilegeMode,

    /// Match supplementary groups too, not only the current group
    pub check_all_groups: bool,

    pub mover: PathBuf,

    /// Filesystems in declaration order
    pub filesystems: Vec<FilesystemPolicy>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            default_filesystem: raw.default,
            duration: raw.duration,
            max_extensions: raw.maxextensions,
            reminder_default: raw.reminderdefault,
            db_owner: DbOwner {
                uid: raw.dbuid,
                gid: raw.dbgid,
            },
            privilege: raw.privilege,
            check_all_groups: raw.check_all_groups,
            mover: raw.mover.unwrap_or_else(|| PathBuf::from(DEFAULT_MOVER)),
            filesystems: raw
                .workspaces
                .into_iter()
                .map(FilesystemPolicy::from_raw)
                .collect(),
        }
    }

    /// Get filesystem by name
    pub fn filesystem(&self, name: &str) -> Option<&FilesystemPolicy> {
        self.filesystems.iter().find(|fs| fs.name == name)
    }
}

/// uid/gid owning the record files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbOwner {
    pub uid: u32,
    pub gid: u32,
}

/// How a storage pool is picked for a new workspace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpaceSelection {
    #[default]
    Random,
    /// Caller uid modulo pool count
    Uid,
    /// Caller gid modulo pool count
    Gid,
    /// Pool with the most free bytes
    MostSpace,
}

/// Validated filesystem definition
#[derive(Debug, Clone)]
pub struct FilesystemPolicy {
    pub name: String,
    pub spaces: Vec<PathBuf>,
    pub space_selection: SpaceSelection,
    pub database: PathBuf,
    pub deleted: String,
    pub duration: Option<i64>,
    pub max_extensions: Option<i64>,
    pub allocatable: bool,
    pub extendable: bool,
    pub restorable: bool,
    pub user_acl: Vec<String>,
    pub group_acl: Vec<String>,
    pub user_defaults: Vec<String>,
    pub group_defaults: Vec<String>,
    pub prefix_hook: Option<PathBuf>,
    pub user_exceptions: HashMap<String, UserException>,
}

impl FilesystemPolicy {
    fn from_raw(raw: RawFilesystem) -> Self {
        let space_selection = raw
            .spaceselection
            .as_deref()
            .map(|s| parse_space_selection(s).unwrap_or_default())
            .unwrap_or_default();

        Self {
            name: raw.name,
            spaces: raw.spaces,
            space_selection,
            database: raw.database,
            deleted: raw.deleted,
            duration: raw.duration,
            max_extensions: raw.maxextensions,
            allocatable: raw.allocatable,
            extendable: raw.extendable,
            restorable: raw.restorable,
            user_acl: raw.user_acl,
            group_acl: raw.group_acl,
            user_defaults: raw.userdefault,
            group_defaults: raw.groupdefault,
            prefix_hook: raw.prefix_hook,
            user_exceptions: raw
                .userexceptions
                .into_iter()
                .map(|(user, e)| (user, UserException::from_raw(e)))
                .collect(),
        }
    }

    /// True when any ACL entry exists; access is then denied by default.
    pub fn has_acl(&self) -> bool {
        !self.user_acl.is_empty() || !self.group_acl.is_empty()
    }
}

/// Per-user override of the filesystem limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserException {
    pub duration: Option<i64>,
    pub max_extensions: Option<i64>,
}

impl UserException {
    fn from_raw(raw: RawUserException) -> Self {
        Self {
            duration: raw.duration,
            max_extensions: raw.maxextensions,
        }
    }
}
