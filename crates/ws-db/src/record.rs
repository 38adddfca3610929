//! Workspace records

use nix::unistd::{Gid, Uid, chown};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;
use ws_config::DbOwner;
use ws_privilege::{Capability, CapabilityGuard, InterruptMask};

use crate::{RecordError, RecordResult, legacy};

/// Mode of a record file
const RECORD_MODE: u32 = 0o644;
/// Mode of a group workspace's record; the execute bit marks it as shared
const GROUP_RECORD_MODE: u32 = 0o744;

/// Metadata of one workspace, persisted as one TOML file named
/// `<owner>-<name>` in the filesystem's database directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Live directory of the workspace
    pub workspace: PathBuf,

    /// Epoch seconds
    pub expiration: i64,

    /// Extensions left. Only non-privileged callers are held to >= 0.
    pub extensions: i64,

    #[serde(default)]
    pub acctcode: String,

    /// Days before expiration a reminder is due, 0 disables
    #[serde(default)]
    pub reminder: i64,

    #[serde(default)]
    pub mailaddress: String,

    /// Set for workspaces shared with or readable by a group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Epoch seconds of release, absent while active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<i64>,
}

/// Result of decoding a record file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDecode {
    Structured(WorkspaceRecord),
    Legacy(WorkspaceRecord),
    Unrecoverable(String),
}

impl RecordDecode {
    pub fn decode(content: &str) -> Self {
        let structured_err = match toml::from_str::<WorkspaceRecord>(content) {
            Ok(record) => return RecordDecode::Structured(record),
            Err(e) => e.message().to_string(),
        };
        match legacy::decode(content) {
            Ok(record) => RecordDecode::Legacy(record),
            Err(legacy_err) => RecordDecode::Unrecoverable(format!(
                "{structured_err} (legacy layout: {legacy_err})"
            )),
        }
    }
}

impl WorkspaceRecord {
    /// Read and decode a record file. Legacy files are accepted and are
    /// rewritten in the structured layout by the next write.
    pub fn read(path: &Path) -> RecordResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        match RecordDecode::decode(&content) {
            RecordDecode::Structured(record) => Ok(record),
            RecordDecode::Legacy(record) => {
                debug!(path = %path.display(), "Read legacy database entry");
                Ok(record)
            }
            RecordDecode::Unrecoverable(reason) => Err(RecordError::Unrecoverable {
                path: path.to_path_buf(),
                reason,
            }),
        }
    }

    pub fn encode(&self) -> RecordResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn is_group_workspace(&self) -> bool {
        self.group.as_deref().is_some_and(|g| !g.is_empty())
    }

    pub fn file_mode(&self) -> u32 {
        if self.is_group_workspace() {
            GROUP_RECORD_MODE
        } else {
            RECORD_MODE
        }
    }

    /// Persist to `path`, owned by the database owner.
    ///
    /// SIGINT is ignored for the whole sequence so an interrupted tool never
    /// leaves a truncated file behind.
    pub fn write(&self, path: &Path, guard: &CapabilityGuard, db_owner: DbOwner) -> RecordResult<()> {
        let content = self.encode()?;
        let mode = self.file_mode();

        let _mask = InterruptMask::engage();

        guard
            .run_as_db_owner(&[Capability::DacOverride, Capability::Fowner], || {
                fs::write(path, &content)?;
                fs::set_permissions(path, fs::Permissions::from_mode(mode))
            })?
            .map_err(|e| RecordError::io(path, e))?;

        if !guard.writes_as_db_owner() {
            guard
                .run(&[Capability::Chown], || {
                    chown(
                        path,
                        Some(Uid::from_raw(db_owner.uid)),
                        Some(Gid::from_raw(db_owner.gid)),
                    )
                    .map_err(io::Error::from)
                })?
                .map_err(|e| RecordError::io(path, e))?;
        }

        debug!(path = %path.display(), mode = %format!("{mode:o}"), "Wrote database entry");
        Ok(())
    }

    /// Apply an extension. The caller persists the record afterwards.
    ///
    /// `new_expiration` of `None` only updates mail, reminder and comment.
    /// Empty strings and a zero reminder leave the stored values alone.
    /// An extension is consumed only when a non-privileged caller actually
    /// moves the expiration forward. Returns whether one was consumed.
    pub fn use_extension(
        &mut self,
        new_expiration: Option<i64>,
        mail: Option<&str>,
        reminder: Option<i64>,
        comment: Option<&str>,
        privileged: bool,
    ) -> RecordResult<bool> {
        let consumes = !privileged && new_expiration.is_some_and(|exp| exp > self.expiration);
        if consumes && self.extensions <= 0 {
            return Err(RecordError::ExtensionsExhausted);
        }

        if let Some(mail) = mail.filter(|m| !m.is_empty()) {
            self.mailaddress = mail.to_string();
        }
        if let Some(reminder) = reminder.filter(|r| *r != 0) {
            self.reminder = reminder;
        }
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            self.comment = Some(comment.to_string());
        }
        if consumes {
            self.extensions -= 1;
        }
        if let Some(expiration) = new_expiration {
            self.expiration = expiration;
        }
        Ok(consumes)
    }

    /// Stamp expiration and release time to `now`
    pub fn mark_released(&mut self, now: i64) {
        self.expiration = now;
        self.released = Some(now);
    }
}
