//! Workspace lifecycle engine
//!
//! ```text
//! ABSENT -> ACTIVE -> RELEASED (trash) -> RESTORED into another ACTIVE workspace
//! ```
//!
//! Every operation takes `now` explicitly so callers and tests control the
//! clock. Existence checks and creation are not locked against concurrent
//! invocations: two first-time allocations of the same name racing each other
//! both create, and the last record write wins.

use chrono::{DateTime, Local};
use nix::unistd::{AccessFlags, Gid, Uid, access, chown};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use ws_config::{FilesystemPolicy, Policy};
use ws_db::{RecordDatabase, RecordError, WorkspaceRecord};
use ws_privilege::{
    Capability, CapabilityGuard, CrossDeviceMover, Identity, TightUmask, group_name_of, lookup_group,
    lookup_user,
};
use ws_util::{Operation, TrashName, WorkspaceName, WsError, expiration_after};

use crate::{
    Allocation, AllocationKind, ExecPrefixHook, PolicyResolver, PrefixHook, Release,
    Restorable, Restore, select_pool,
};

const OWNER_ONLY: u32 = 0o700;
const GROUP_READ: u32 = 0o050;
const GROUP_WRITE: u32 = 0o020;
const SET_GID: u32 = 0o2000;

/// Who besides the owner gets into a new workspace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GroupMode {
    #[default]
    Private,
    /// Readable by the caller's current group
    Readable,
    /// Writable by the named group, setgid directory
    Shared(String),
}

#[derive(Debug, Clone)]
pub struct AllocateRequest {
    pub name: WorkspaceName,
    /// Pin the filesystem instead of searching
    pub filesystem: Option<String>,
    pub extend: bool,
    /// Days. `None` means the filesystem default, `Some(0)` on extend only
    /// updates mail, reminder and comment.
    pub duration: Option<i64>,
    pub reminder: Option<i64>,
    pub mail: Option<String>,
    /// Act on another user's workspace
    pub user: Option<String>,
    pub group: GroupMode,
    pub comment: Option<String>,
}

impl AllocateRequest {
    pub fn new(name: WorkspaceName) -> Self {
        Self {
            name,
            filesystem: None,
            extend: false,
            duration: None,
            reminder: None,
            mail: None,
            user: None,
            group: GroupMode::Private,
            comment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub name: WorkspaceName,
    pub filesystem: Option<String>,
    /// Privileged only: the record is named `<name>` without owner prefix
    pub bare_name: bool,
    /// Wipe the directory and its trashed record once both are in the trash
    pub delete_data: bool,
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Trash name, `owner-name-generation`
    pub trashed: String,
    pub target: WorkspaceName,
    pub owner: Option<String>,
    pub filesystem: Option<String>,
}

/// Performs allocate, extend, release and restore for one identity
pub struct LifecycleEngine {
    policy: Policy,
    identity: Identity,
    guard: CapabilityGuard,
    mover: CrossDeviceMover,
    prefix_hook: Option<Box<dyn PrefixHook>>,
}

impl LifecycleEngine {
    pub fn new(policy: Policy, identity: Identity, guard: CapabilityGuard) -> Self {
        let mover = CrossDeviceMover::new(&policy.mover);
        debug!(
            user = %identity.username,
            privileged = identity.privileged,
            mode = %guard.mode(),
            filesystems = policy.filesystems.len(),
            "Lifecycle engine initialized"
        );
        Self {
            policy,
            identity,
            guard,
            mover,
            prefix_hook: None,
        }
    }

    /// Use `hook` for every filesystem instead of the configured programs
    pub fn with_prefix_hook(mut self, hook: Box<dyn PrefixHook>) -> Self {
        self.prefix_hook = Some(hook);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn resolver(&self) -> PolicyResolver<'_> {
        PolicyResolver::new(&self.policy, &self.identity)
    }

    /// Allocate a new workspace, reuse an existing one, or extend it
    pub fn allocate(&self, req: &AllocateRequest, now: DateTime<Local>) -> Result<Allocation, WsError> {
        let privileged = self.identity.is_privileged();
        let op = if req.extend {
            Operation::Extend
        } else {
            Operation::Allocate
        };

        let other_user = self.other_user(req.user.as_deref());
        if let Some(user) = other_user
            && !privileged
            && !req.extend
        {
            return Err(WsError::denied(format!(
                "only root can allocate workspaces for user '{user}'"
            )));
        }
        if let GroupMode::Shared(group) = &req.group
            && !privileged
            && !self.identity.in_group(group)
        {
            return Err(WsError::denied(format!("you are not a member of group '{group}'")));
        }

        let owner = other_user.unwrap_or(self.identity.username.as_str());
        let key = RecordDatabase::record_key(owner, &req.name);
        let resolver = self.resolver();
        let order = resolver.search_order(req.filesystem.as_deref(), op)?;

        // First filesystem holding the record wins
        for fs in order.iter() {
            let db = RecordDatabase::for_filesystem(fs);
            let Some(record) = db.find_active(&key)? else {
                continue;
            };

            if req.extend {
                return self.extend(fs, &db, &key, record, req, now);
            }

            info!(
                filesystem = %fs.name,
                workspace = %record.workspace.display(),
                user = %self.identity.username,
                "Reusing workspace"
            );
            return Ok(Allocation {
                kind: AllocationKind::Reused,
                filesystem: fs.name.clone(),
                record,
                clamped: None,
            });
        }

        if req.extend {
            return Err(WsError::not_found(format!(
                "workspace '{}' does not exist, can not be extended",
                req.name
            )));
        }

        self.create(order.target(), &key, other_user, req, now)
    }

    fn extend(
        &self,
        fs: &FilesystemPolicy,
        db: &RecordDatabase,
        key: &str,
        mut record: WorkspaceRecord,
        req: &AllocateRequest,
        now: DateTime<Local>,
    ) -> Result<Allocation, WsError> {
        let privileged = self.identity.is_privileged();
        let foreign = self.other_user(req.user.as_deref()).is_some();

        if !fs.extendable {
            return Err(WsError::denied(format!(
                "workspaces can not be extended in filesystem '{}'",
                fs.name
            )));
        }

        // Extending someone else's workspace needs full access to it
        if foreign
            && !privileged
            && access(
                &record.workspace,
                AccessFlags::R_OK | AccessFlags::W_OK | AccessFlags::X_OK,
            )
            .is_err()
        {
            return Err(WsError::denied(format!(
                "you are not the owner of workspace '{}' and have no access to it",
                req.name
            )));
        }

        let (new_expiration, clamped) = match req.duration {
            Some(0) => (None, None),
            requested => {
                let resolver = self.resolver();
                let limits = resolver.limits(fs)?;
                let (days, clamped) = resolver.clamp_duration(requested, limits);
                (Some(expiration_after(now, days)), clamped)
            }
        };

        let consumed = record
            .use_extension(
                new_expiration,
                req.mail.as_deref(),
                req.reminder,
                req.comment.as_deref(),
                privileged,
            )
            .map_err(|e| match e {
                RecordError::ExtensionsExhausted => WsError::ExtensionsExhausted(req.name.to_string()),
                other => other.into(),
            })?;

        record.write(&db.active_path(key), &self.guard, self.policy.db_owner)?;

        info!(
            filesystem = %fs.name,
            workspace = %record.workspace.display(),
            user = %self.identity.username,
            extensions = record.extensions,
            expiration = record.expiration,
            consumed,
            "Extended workspace"
        );

        Ok(Allocation {
            kind: AllocationKind::Extended { consumed },
            filesystem: fs.name.clone(),
            record,
            clamped,
        })
    }

    fn create(
        &self,
        fs: &FilesystemPolicy,
        key: &str,
        other_user: Option<&str>,
        req: &AllocateRequest,
        now: DateTime<Local>,
    ) -> Result<Allocation, WsError> {
        if !fs.allocatable {
            return Err(WsError::denied(format!(
                "filesystem '{}' can not be used for allocation",
                fs.name
            )));
        }

        let resolver = self.resolver();
        let limits = resolver.limits(fs)?;
        let (days, clamped) = resolver.clamp_duration(req.duration, limits);

        // Owner and group of the new directory
        let (uid, mut gid) = match other_user {
            Some(user) => lookup_user(user)
                .ok_or_else(|| WsError::not_found(format!("user '{user}' does not exist")))?,
            None => (self.identity.uid, self.identity.gid),
        };
        let (mode, group) = match &req.group {
            GroupMode::Private => (OWNER_ONLY, None),
            GroupMode::Readable => {
                // The group the directory actually gets, not the caller's
                let name = match other_user {
                    Some(_) => group_name_of(gid),
                    None => self.identity.primary_group.clone(),
                };
                (OWNER_ONLY | GROUP_READ, Some(name))
            }
            GroupMode::Shared(name) => {
                gid = lookup_group(name)
                    .ok_or_else(|| WsError::not_found(format!("group '{name}' does not exist")))?;
                (OWNER_ONLY | GROUP_READ | GROUP_WRITE | SET_GID, Some(name.clone()))
            }
        };

        let pool = select_pool(fs, uid, gid)?;
        let mut parent = pool.to_path_buf();
        if let Some(segment) = self.prefix_for(fs, other_user.unwrap_or(self.identity.username.as_str())) {
            parent.push(segment);
        }
        let workspace = parent.join(key);

        let created = {
            let _umask = TightUmask::engage();
            self.guard
                .run(&[Capability::DacOverride], || fs::create_dir_all(&workspace))?
        };
        created.map_err(|e| {
            WsError::io(
                format!("could not create workspace directory {}", workspace.display()),
                e,
            )
        })?;

        let record = WorkspaceRecord {
            workspace,
            expiration: expiration_after(now, days),
            extensions: limits.max_extensions,
            acctcode: self.identity.primary_group.clone(),
            reminder: req.reminder.unwrap_or(self.policy.reminder_default),
            mailaddress: req.mail.clone().unwrap_or_default(),
            group,
            comment: req.comment.clone().filter(|c| !c.is_empty()),
            released: None,
        };

        let db = RecordDatabase::for_filesystem(fs);
        let finished = self
            .set_owner_and_mode(&record.workspace, uid, gid, mode)
            .and_then(|()| {
                record
                    .write(&db.active_path(key), &self.guard, self.policy.db_owner)
                    .map_err(WsError::from)
            });
        if let Err(e) = finished {
            self.remove_half_created(&record.workspace);
            return Err(e);
        }

        info!(
            filesystem = %fs.name,
            workspace = %record.workspace.display(),
            user = %self.identity.username,
            owner = uid,
            days,
            "Created workspace"
        );

        Ok(Allocation {
            kind: AllocationKind::Created,
            filesystem: fs.name.clone(),
            record,
            clamped,
        })
    }

    fn set_owner_and_mode(&self, path: &Path, uid: u32, gid: u32, mode: u32) -> Result<(), WsError> {
        self.guard
            .run(&[Capability::Chown], || {
                chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid))).map_err(io::Error::from)
            })?
            .map_err(|e| WsError::io(format!("could not change owner of {}", path.display()), e))?;

        self.guard
            .run(&[Capability::Fowner], || {
                fs::set_permissions(path, fs::Permissions::from_mode(mode))
            })?
            .map_err(|e| {
                WsError::io(format!("could not change permissions of {}", path.display()), e)
            })
    }

    fn remove_half_created(&self, path: &Path) {
        let removed = self
            .guard
            .run(&[Capability::DacOverride], || fs::remove_dir(path));
        match removed {
            Ok(Ok(())) => debug!(path = %path.display(), "Removed half-initialized workspace"),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Could not remove half-initialized workspace"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove half-initialized workspace"),
        }
    }

    fn prefix_for(&self, fs: &FilesystemPolicy, username: &str) -> Option<String> {
        match (&self.prefix_hook, &fs.prefix_hook) {
            (Some(hook), _) => hook.prefix(&fs.name, username),
            (None, Some(program)) => ExecPrefixHook::new(program).prefix(&fs.name, username),
            (None, None) => None,
        }
    }

    /// Move a workspace and its record into the trash
    pub fn release(&self, req: &ReleaseRequest, now: DateTime<Local>) -> Result<Release, WsError> {
        if req.bare_name && !self.identity.is_privileged() {
            return Err(WsError::denied("only root can release workspaces by bare name"));
        }
        let key = if req.bare_name {
            req.name.to_string()
        } else {
            RecordDatabase::record_key(&self.identity.username, &req.name)
        };

        let order = self.resolver().search_order(req.filesystem.as_deref(), Operation::Release)?;
        let mut found = None;
        for fs in order.iter() {
            let db = RecordDatabase::for_filesystem(fs);
            if let Some(record) = db.find_active(&key)? {
                found = Some((fs, db, record));
                break;
            }
        }
        let (fs, db, mut record) = found
            .ok_or_else(|| WsError::not_found(format!("workspace '{}' does not exist", req.name)))?;

        let stamp = now.timestamp();
        record.mark_released(stamp);
        record.write(&db.active_path(&key), &self.guard, self.policy.db_owner)?;

        let generation = db.next_generation(&key, stamp)?;
        let trashed_record = db.move_to_trash(&key, generation, &self.guard)?;

        let trashed_directory = trash_directory(&record.workspace, db.deleted())
            .join(format!("{key}-{generation}"));
        let moved = self.guard.run(&[Capability::DacOverride], || {
            self.mover.relocate(&record.workspace, &trashed_directory)
        });
        let method = match moved {
            Ok(Ok(method)) => method,
            Ok(Err(e)) => return Err(partial_release(trashed_record, &record.workspace, e.to_string())),
            Err(e) => return Err(partial_release(trashed_record, &record.workspace, e.to_string())),
        };

        info!(
            filesystem = %fs.name,
            workspace = %record.workspace.display(),
            user = %self.identity.username,
            trash = %trashed_directory.display(),
            method = ?method,
            "Released workspace"
        );

        let deleted_files = if req.delete_data {
            let count = self.delete_data(&trashed_directory)?;
            db.remove_trash(&format!("{key}-{generation}"), &self.guard)?;
            info!(
                filesystem = %fs.name,
                trash = %trashed_directory.display(),
                user = %self.identity.username,
                files = count,
                "Deleted released workspace data"
            );
            Some(count)
        } else {
            None
        };

        Ok(Release {
            filesystem: fs.name.clone(),
            generation,
            trashed_record,
            trashed_directory,
            deleted_files,
        })
    }

    /// Remove a trashed directory tree, returning how many entries it held
    fn delete_data(&self, directory: &Path) -> Result<u64, WsError> {
        self.guard
            .run(&[Capability::DacOverride, Capability::Fowner], || {
                let count = count_entries(directory);
                fs::remove_dir_all(directory).map(|()| count)
            })?
            .map_err(|e| WsError::io(format!("could not delete {}", directory.display()), e))
    }

    /// Move a released workspace into an existing active workspace
    pub fn restore(&self, req: &RestoreRequest) -> Result<Restore, WsError> {
        let privileged = self.identity.is_privileged();

        // Validated before anything touches the filesystem
        let shape = TrashName::parse(&req.trashed)?;

        let other_user = self.other_user(req.owner.as_deref());
        if let Some(user) = other_user
            && !privileged
        {
            return Err(WsError::denied(format!(
                "only root can restore workspaces for user '{user}'"
            )));
        }
        let owner = other_user.unwrap_or(self.identity.username.as_str());
        let trash_name = if req.trashed.starts_with(&format!("{owner}-")) {
            TrashName::parse_for(&req.trashed, owner)?
        } else if privileged {
            shape
        } else {
            return Err(WsError::denied(format!(
                "workspace '{shape}' does not belong to '{owner}'"
            )));
        };

        let order = self.resolver().search_order(req.filesystem.as_deref(), Operation::Restore)?;
        let (fs, db) = order
            .iter()
            .map(|fs| (fs, RecordDatabase::for_filesystem(fs)))
            .find(|(_, db)| db.trash_path(&trash_name.to_string()).is_file())
            .ok_or_else(|| WsError::not_found(format!("workspace '{trash_name}' does not exist")))?;

        if !fs.restorable {
            return Err(WsError::denied(format!(
                "workspaces can not be restored in filesystem '{}'",
                fs.name
            )));
        }

        let target_key = RecordDatabase::record_key(owner, &req.target);
        let target = db.find_active(&target_key)?.ok_or_else(|| {
            WsError::not_found(format!("target workspace '{}' does not exist", req.target))
        })?;

        let trashed = WorkspaceRecord::read(&db.trash_path(&trash_name.to_string()))?;
        let source = trash_directory(&trashed.workspace, db.deleted()).join(trash_name.to_string());
        let destination = target.workspace.join(trash_name.to_string());

        let method = self
            .guard
            .run(&[Capability::DacOverride, Capability::DacReadSearch], || {
                self.mover.relocate(&source, &destination)
            })?
            .map_err(|e| {
                WsError::io(
                    format!(
                        "moving {} to {} failed, database entry kept",
                        source.display(),
                        destination.display()
                    ),
                    e,
                )
            })?;

        // Only now is the trashed record expendable
        db.remove_trash(&trash_name.to_string(), &self.guard)?;

        info!(
            filesystem = %fs.name,
            from = %source.display(),
            to = %destination.display(),
            user = %self.identity.username,
            method = ?method,
            "Restored workspace"
        );

        Ok(Restore {
            filesystem: fs.name.clone(),
            destination,
            method,
        })
    }

    /// Released workspaces of `owner` (default: the caller) that can be
    /// restored, per filesystem
    pub fn list_restorable(
        &self,
        owner: Option<&str>,
        filesystem: Option<&str>,
    ) -> Result<Vec<Restorable>, WsError> {
        let other_user = self.other_user(owner);
        if let Some(user) = other_user
            && !self.identity.is_privileged()
        {
            return Err(WsError::denied(format!(
                "only root can list workspaces of user '{user}'"
            )));
        }
        let owner = other_user.unwrap_or(self.identity.username.as_str());

        let resolver = self.resolver();
        let filesystems = match filesystem {
            Some(name) => resolver
                .search_order(Some(name), Operation::Restore)?
                .iter()
                .collect(),
            None => resolver.valid_filesystems(),
        };

        let mut restorable = Vec::new();
        for fs in filesystems {
            let db = RecordDatabase::for_filesystem(fs);
            restorable.extend(db.list_trash(owner)?.into_iter().map(|name| Restorable {
                filesystem: fs.name.clone(),
                name,
            }));
        }
        Ok(restorable)
    }

    /// `user` when it names somebody other than the caller
    fn other_user<'a>(&self, user: Option<&'a str>) -> Option<&'a str> {
        user.filter(|u| !u.is_empty() && *u != self.identity.username)
    }
}

/// Entries below `dir`, symlinks not followed
fn count_entries(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => 1 + count_entries(&entry.path()),
            _ => 1,
        })
        .sum()
}

/// Trash directory next to a workspace directory
fn trash_directory(workspace: &Path, deleted: &str) -> PathBuf {
    workspace
        .parent()
        .unwrap_or_else(|| Path::new("/"))
        .join(deleted)
}

fn partial_release(record: PathBuf, directory: &Path, reason: String) -> WsError {
    WsError::PartialRelease {
        record,
        directory: directory.to_path_buf(),
        reason,
    }
}
