//! Per-filesystem record database
//!
//! Active records live directly in the database directory, trashed ones in
//! its trash subdirectory with a generation suffix:
//!
//! ```text
//! <database>/alice-proj1
//! <database>/<deleted>/alice-proj1-1700864000
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};
use ws_config::FilesystemPolicy;
use ws_privilege::{Capability, CapabilityGuard};
use ws_util::{TrashName, WorkspaceName};

use crate::{RecordError, RecordResult, WorkspaceRecord};

/// Record directory of one filesystem
#[derive(Debug, Clone)]
pub struct RecordDatabase {
    filesystem: String,
    root: PathBuf,
    deleted: String,
}

impl RecordDatabase {
    pub fn new(filesystem: impl Into<String>, root: impl Into<PathBuf>, deleted: impl Into<String>) -> Self {
        Self {
            filesystem: filesystem.into(),
            root: root.into(),
            deleted: deleted.into(),
        }
    }

    pub fn for_filesystem(fs: &FilesystemPolicy) -> Self {
        Self::new(&fs.name, &fs.database, &fs.deleted)
    }

    /// Name of the trash subdirectory, shared with the storage pools
    pub fn deleted(&self) -> &str {
        &self.deleted
    }

    pub fn trash_root(&self) -> PathBuf {
        self.root.join(&self.deleted)
    }

    /// File name of an active record, `<owner>-<name>`
    pub fn record_key(owner: &str, name: &WorkspaceName) -> String {
        format!("{owner}-{name}")
    }

    pub fn active_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn trash_path(&self, trash_name: &str) -> PathBuf {
        self.trash_root().join(trash_name)
    }

    /// Read the active record for `key`, `None` when there is none
    pub fn find_active(&self, key: &str) -> RecordResult<Option<WorkspaceRecord>> {
        let path = self.active_path(key);
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_file() => WorkspaceRecord::read(&path).map(Some),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RecordError::io(path, e)),
        }
    }

    /// Generation suffix for the next release of `key`.
    ///
    /// Never smaller than `now`, and always past every generation already in
    /// the trash for the same key.
    pub fn next_generation(&self, key: &str, now: i64) -> RecordResult<i64> {
        let newest = self
            .trash_generations(key)?
            .into_iter()
            .max();
        Ok(match newest {
            Some(prev) if prev >= now => prev + 1,
            _ => now,
        })
    }

    fn trash_generations(&self, key: &str) -> RecordResult<Vec<i64>> {
        let prefix = format!("{key}-");
        Ok(self
            .trash_entries()?
            .into_iter()
            .filter_map(|entry| {
                let stamp = entry.strip_prefix(&prefix)?;
                if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                stamp.parse().ok()
            })
            .collect())
    }

    fn trash_entries(&self) -> RecordResult<Vec<String>> {
        let trash = self.trash_root();
        let dir = match fs::read_dir(&trash) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RecordError::io(trash, e)),
        };
        let mut names = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| RecordError::io(&trash, e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Trashed records of `owner`, oldest first. Entries that do not parse
    /// as trash names are skipped.
    pub fn list_trash(&self, owner: &str) -> RecordResult<Vec<TrashName>> {
        let prefix = format!("{owner}-");
        let mut names: Vec<TrashName> = self
            .trash_entries()?
            .into_iter()
            .filter(|n| n.starts_with(&prefix))
            .filter_map(|n| match TrashName::parse_for(&n, owner) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(filesystem = %self.filesystem, entry = %n, error = %e, "Skipping malformed trash entry");
                    None
                }
            })
            .collect();
        names.sort_by(|a, b| {
            a.generation()
                .cmp(&b.generation())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(names)
    }

    /// Rename the active record `key` into the trash as `<key>-<generation>`.
    /// Returns the new path.
    pub fn move_to_trash(&self, key: &str, generation: i64, guard: &CapabilityGuard) -> RecordResult<PathBuf> {
        let from = self.active_path(key);
        let to = self.trash_path(&format!("{key}-{generation}"));

        guard
            .run_as_db_owner(&[Capability::DacOverride, Capability::Fowner], || {
                fs::rename(&from, &to)
            })?
            .map_err(|e| RecordError::io(&from, e))?;

        debug!(
            filesystem = %self.filesystem,
            from = %from.display(),
            to = %to.display(),
            "Moved database entry to trash"
        );
        Ok(to)
    }

    /// Delete the trashed record `entry`, after a restore or a data wipe
    pub fn remove_trash(&self, entry: &str, guard: &CapabilityGuard) -> RecordResult<()> {
        let path = self.trash_path(entry);
        guard
            .run_as_db_owner(&[Capability::DacOverride], || fs::remove_file(&path))?
            .map_err(|e| RecordError::io(&path, e))?;
        debug!(path = %path.display(), "Removed trashed database entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ws_privilege::MockPrivilege;

    fn setup() -> (tempfile::TempDir, RecordDatabase) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".removed")).unwrap();
        let db = RecordDatabase::new("scratch", dir.path(), ".removed");
        (dir, db)
    }

    #[test]
    fn generation_starts_at_now() {
        let (_dir, db) = setup();
        assert_eq!(db.next_generation("alice-proj1", 1_700_000_000).unwrap(), 1_700_000_000);
    }

    #[test]
    fn generation_is_strictly_increasing_within_one_second() {
        let (dir, db) = setup();
        fs::write(dir.path().join(".removed/alice-proj1-1700000000"), "").unwrap();
        // different workspace sharing the prefix must not count
        fs::write(dir.path().join(".removed/alice-proj1-x-1800000000"), "").unwrap();

        assert_eq!(db.next_generation("alice-proj1", 1_700_000_000).unwrap(), 1_700_000_001);
        assert_eq!(db.next_generation("alice-proj1", 1_700_000_500).unwrap(), 1_700_000_500);
    }

    #[test]
    fn missing_trash_directory_means_no_generations() {
        let dir = tempfile::tempdir().unwrap();
        let db = RecordDatabase::new("scratch", dir.path(), ".removed");
        assert_eq!(db.next_generation("alice-x", 5).unwrap(), 5);
        assert!(db.list_trash("alice").unwrap().is_empty());
    }

    #[test]
    fn list_trash_filters_by_owner() {
        let (dir, db) = setup();
        for name in ["alice-b-20", "alice-a-10", "alicex-a-5", "bob-a-1", "alice-junk"] {
            fs::write(dir.path().join(".removed").join(name), "").unwrap();
        }
        let names: Vec<String> = db
            .list_trash("alice")
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(names, vec!["alice-a-10", "alice-b-20"]);
    }

    #[test]
    fn list_trash_handles_hyphenated_owners() {
        let (dir, db) = setup();
        for name in ["john-doe-proj1-10", "john-doe-7", "john-a-5"] {
            fs::write(dir.path().join(".removed").join(name), "").unwrap();
        }
        let listed = db.list_trash("john-doe").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner(), "john-doe");
        assert_eq!(listed[0].name(), "proj1");
    }

    #[test]
    fn move_and_remove_trash() {
        let (dir, db) = setup();
        let mock = MockPrivilege::default();
        let guard = mock.guard();
        fs::write(dir.path().join("alice-proj1"), "x").unwrap();

        let trashed = db.move_to_trash("alice-proj1", 42, &guard).unwrap();
        assert_eq!(trashed, dir.path().join(".removed/alice-proj1-42"));
        assert!(db.find_active("alice-proj1").unwrap().is_none());

        db.remove_trash("alice-proj1-42", &guard).unwrap();
        assert!(!trashed.exists());
        assert!(mock.is_balanced());
    }
}
