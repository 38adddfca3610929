//! Results reported by the lifecycle engine

use std::path::PathBuf;
use ws_db::WorkspaceRecord;
use ws_privilege::MoveMethod;
use ws_util::TrashName;

/// A requested duration above the ceiling was cut down. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub requested: i64,
    pub granted: i64,
}

/// What allocate did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    Created,
    /// Existing workspace returned unchanged
    Reused,
    /// `consumed` is false for privileged or metadata-only extensions
    Extended { consumed: bool },
}

#[derive(Debug, Clone)]
pub struct Allocation {
    pub kind: AllocationKind,
    pub filesystem: String,
    pub record: WorkspaceRecord,
    pub clamped: Option<Clamped>,
}

impl Allocation {
    pub fn workspace(&self) -> &PathBuf {
        &self.record.workspace
    }
}

#[derive(Debug, Clone)]
pub struct Release {
    pub filesystem: String,
    pub generation: i64,
    pub trashed_record: PathBuf,
    pub trashed_directory: PathBuf,
    /// Entries wiped when the data was deleted right away
    pub deleted_files: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Restore {
    pub filesystem: String,
    /// Where the trashed directory ended up, inside the target workspace
    pub destination: PathBuf,
    pub method: MoveMethod,
}

/// A released workspace that can still be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restorable {
    pub filesystem: String,
    pub name: TrashName,
}

impl Restorable {
    /// Release time, encoded as the generation suffix
    pub fn released_at(&self) -> i64 {
        self.name.generation()
    }
}
