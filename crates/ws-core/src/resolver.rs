//! Filesystem selection, access control and limits

use tracing::{debug, warn};
use ws_config::{FilesystemPolicy, Policy};
use ws_privilege::Identity;
use ws_util::{Operation, WsError};

use crate::Clamped;

/// Effective limits for one identity on one filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Default and maximum lifetime in days
    pub duration: i64,
    pub max_extensions: i64,
}

/// Filesystems to scan for an existing record, in order. The first entry is
/// where a new workspace is created.
#[derive(Debug, Clone)]
pub struct SearchOrder<'a> {
    filesystems: Vec<&'a FilesystemPolicy>,
}

impl<'a> SearchOrder<'a> {
    pub fn target(&self) -> &'a FilesystemPolicy {
        self.filesystems[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a FilesystemPolicy> + '_ {
        self.filesystems.iter().copied()
    }

    pub fn names(&self) -> Vec<&'a str> {
        self.filesystems.iter().map(|fs| fs.name.as_str()).collect()
    }
}

/// Answers which filesystems an identity may use and with which limits
pub struct PolicyResolver<'a> {
    policy: &'a Policy,
    identity: &'a Identity,
}

impl<'a> PolicyResolver<'a> {
    pub fn new(policy: &'a Policy, identity: &'a Identity) -> Self {
        Self { policy, identity }
    }

    /// ACL check for one filesystem.
    ///
    /// No entries at all means open access. Otherwise only a listed user
    /// name or a listed group gets in; supplementary groups count only with
    /// `check_all_groups`.
    pub fn acl_allows(&self, fs: &FilesystemPolicy) -> bool {
        if self.identity.is_privileged() || !fs.has_acl() {
            return true;
        }

        if fs.user_acl.iter().any(|u| *u == self.identity.username) {
            return true;
        }

        fs.group_acl.iter().any(|g| {
            *g == self.identity.primary_group
                || (self.policy.check_all_groups && self.identity.groups.iter().any(|mine| mine == g))
        })
    }

    /// All filesystems passing the ACL check, in declaration order
    pub fn valid_filesystems(&self) -> Vec<&'a FilesystemPolicy> {
        self.policy
            .filesystems
            .iter()
            .filter(|fs| self.acl_allows(fs))
            .collect()
    }

    /// Implicit filesystem selection.
    ///
    /// Precedence: user default, primary group default, any group default
    /// (with `check_all_groups`), then the global default.
    pub fn default_filesystem(&self, op: Operation) -> Result<&'a FilesystemPolicy, WsError> {
        let mut by_user = None;
        let mut by_primary_group = None;
        let mut by_other_group = None;

        for fs in &self.policy.filesystems {
            // Only skipped for fresh allocations, an extension may target a
            // filesystem that is closed for new workspaces
            if op == Operation::Allocate && !fs.allocatable {
                continue;
            }

            if by_user.is_none() && fs.user_defaults.iter().any(|u| *u == self.identity.username) {
                by_user = Some(fs);
            }
            if by_primary_group.is_none()
                && fs.group_defaults.iter().any(|g| *g == self.identity.primary_group)
            {
                by_primary_group = Some(fs);
            }
            if self.policy.check_all_groups
                && by_other_group.is_none()
                && fs
                    .group_defaults
                    .iter()
                    .any(|g| self.identity.groups.iter().any(|mine| mine == g))
            {
                by_other_group = Some(fs);
            }
        }

        if let Some(fs) = by_user.or(by_primary_group).or(by_other_group) {
            return Ok(fs);
        }

        let name = self
            .policy
            .default_filesystem
            .as_deref()
            .ok_or_else(|| WsError::config("no default filesystem matches and no global default is set"))?;
        self.policy
            .filesystem(name)
            .ok_or_else(|| WsError::config(format!("default filesystem '{name}' is not defined")))
    }

    /// Build the search order for `op`.
    ///
    /// An explicit filesystem is the whole order. Otherwise every valid
    /// filesystem is searched, the resolved default first.
    pub fn search_order(&self, explicit: Option<&str>, op: Operation) -> Result<SearchOrder<'a>, WsError> {
        if let Some(name) = explicit {
            let fs = self
                .policy
                .filesystem(name)
                .ok_or_else(|| WsError::not_found(format!("filesystem '{name}' does not exist")))?;
            if !self.acl_allows(fs) {
                return Err(WsError::denied(format!(
                    "user '{}' may not use filesystem '{name}'",
                    self.identity.username
                )));
            }
            return Ok(SearchOrder {
                filesystems: vec![fs],
            });
        }

        let default = self.default_filesystem(op)?;
        if !self.acl_allows(default) {
            return Err(WsError::denied(format!(
                "user '{}' may not use the default filesystem '{}'",
                self.identity.username, default.name
            )));
        }

        let mut filesystems = vec![default];
        filesystems.extend(
            self.valid_filesystems()
                .into_iter()
                .filter(|fs| fs.name != default.name),
        );

        let order = SearchOrder { filesystems };
        debug!(operation = %op, order = ?order.names(), "Filesystem search order");
        Ok(order)
    }

    /// Limits for the identity on `fs`: user exception, then the
    /// filesystem's value, then the global one.
    pub fn limits(&self, fs: &FilesystemPolicy) -> Result<Limits, WsError> {
        let exception = fs.user_exceptions.get(&self.identity.username);

        let duration = exception
            .and_then(|e| e.duration)
            .or(fs.duration)
            .or(self.policy.duration)
            .ok_or_else(|| WsError::config(format!("no duration configured for '{}'", fs.name)))?;
        let max_extensions = exception
            .and_then(|e| e.max_extensions)
            .or(fs.max_extensions)
            .or(self.policy.max_extensions)
            .ok_or_else(|| WsError::config(format!("no maxextensions configured for '{}'", fs.name)))?;

        Ok(Limits {
            duration,
            max_extensions,
        })
    }

    /// Apply the duration ceiling. `None` asks for the default lifetime.
    /// The privileged identity is never clamped.
    pub fn clamp_duration(&self, requested: Option<i64>, limits: Limits) -> (i64, Option<Clamped>) {
        let Some(requested) = requested else {
            return (limits.duration, None);
        };
        if self.identity.is_privileged() && requested >= 0 {
            return (requested, None);
        }
        if requested > limits.duration || requested < 0 {
            warn!(
                requested,
                granted = limits.duration,
                "Duration longer than allowed, using the maximum"
            );
            return (
                limits.duration,
                Some(Clamped {
                    requested,
                    granted: limits.duration,
                }),
            );
        }
        (requested, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ws_config::parse_config;

    fn identity(user: &str, primary: &str, groups: &[&str]) -> Identity {
        Identity {
            uid: 1000,
            gid: 1000,
            username: user.into(),
            primary_group: primary.into(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            privileged: false,
        }
    }

    fn root() -> Identity {
        Identity {
            uid: 0,
            gid: 0,
            username: "root".into(),
            primary_group: "root".into(),
            groups: vec!["root".into()],
            privileged: true,
        }
    }

    fn policy(check_all_groups: bool) -> Policy {
        parse_config(&format!(
            r#"
            config_version = 1
            default = "scratch"
            duration = 30
            maxextensions = 3
            dbuid = 85
            dbgid = 85
            check_all_groups = {check_all_groups}

            [[workspaces]]
            name = "scratch"
            spaces = ["/mnt/a", "/mnt/b"]
            database = "/var/ws/scratch"
            deleted = ".removed"
            duration = 10
            maxextensions = 2

            [workspaces.userexceptions.carol]
            duration = 90

            [[workspaces]]
            name = "project"
            spaces = ["/mnt/p"]
            database = "/var/ws/project"
            deleted = ".removed"
            group_acl = ["physics"]
            userdefault = ["alice"]
            groupdefault = ["physics"]

            [[workspaces]]
            name = "archive"
            spaces = ["/mnt/z"]
            database = "/var/ws/archive"
            deleted = ".removed"
            allocatable = false
            user_acl = ["dave"]
            groupdefault = ["chem", "physics"]
            "#
        ))
        .unwrap()
    }

    #[test]
    fn empty_acl_admits_everyone() {
        let policy = policy(false);
        let me = identity("bob", "users", &["users"]);
        let resolver = PolicyResolver::new(&policy, &me);
        assert!(resolver.acl_allows(policy.filesystem("scratch").unwrap()));
    }

    #[test]
    fn group_acl_excluding_primary_group_denies() {
        let policy = policy(false);
        let me = identity("bob", "users", &["users", "physics"]);
        let resolver = PolicyResolver::new(&policy, &me);
        assert!(!resolver.acl_allows(policy.filesystem("project").unwrap()));
        assert_eq!(
            resolver.valid_filesystems().iter().map(|fs| fs.name.as_str()).collect::<Vec<_>>(),
            vec!["scratch"]
        );
    }

    #[test]
    fn supplementary_groups_count_when_enabled() {
        let policy = policy(true);
        let me = identity("bob", "users", &["users", "physics"]);
        let resolver = PolicyResolver::new(&policy, &me);
        assert!(resolver.acl_allows(policy.filesystem("project").unwrap()));
    }

    #[test]
    fn user_acl_match_and_privileged_bypass() {
        let policy = policy(false);
        let dave = identity("dave", "users", &["users"]);
        assert!(PolicyResolver::new(&policy, &dave).acl_allows(policy.filesystem("archive").unwrap()));

        let root = root();
        assert_eq!(PolicyResolver::new(&policy, &root).valid_filesystems().len(), 3);
    }

    #[test]
    fn user_default_beats_group_default() {
        let policy = policy(false);
        let me = identity("alice", "chem", &["chem"]);
        let resolver = PolicyResolver::new(&policy, &me);
        // archive matches alice's group for extensions, but her user default wins
        assert_eq!(resolver.default_filesystem(Operation::Extend).unwrap().name, "project");
    }

    #[test]
    fn non_allocatable_filesystems_are_skipped_for_new_workspaces() {
        let policy = policy(false);
        let me = identity("erin", "chem", &["chem"]);
        let resolver = PolicyResolver::new(&policy, &me);
        assert_eq!(resolver.default_filesystem(Operation::Extend).unwrap().name, "archive");
        assert_eq!(resolver.default_filesystem(Operation::Allocate).unwrap().name, "scratch");
    }

    #[test]
    fn missing_global_default_is_a_configuration_error() {
        let mut policy = policy(false);
        policy.default_filesystem = None;
        let me = identity("bob", "users", &["users"]);
        let err = PolicyResolver::new(&policy, &me)
            .default_filesystem(Operation::Allocate)
            .unwrap_err();
        assert!(matches!(err, WsError::Configuration(_)));
    }

    #[test]
    fn search_order_puts_default_first() {
        let policy = policy(false);
        let me = identity("alice", "physics", &["physics"]);
        let resolver = PolicyResolver::new(&policy, &me);
        let order = resolver.search_order(None, Operation::Allocate).unwrap();
        assert_eq!(order.names(), vec!["project", "scratch"]);
        assert_eq!(order.target().name, "project");
    }

    #[test]
    fn explicit_filesystem_is_checked() {
        let policy = policy(false);
        let me = identity("bob", "users", &["users"]);
        let resolver = PolicyResolver::new(&policy, &me);
        assert_eq!(
            resolver.search_order(Some("scratch"), Operation::Release).unwrap().names(),
            vec!["scratch"]
        );
        assert!(matches!(
            resolver.search_order(Some("project"), Operation::Allocate),
            Err(WsError::Authorization(_))
        ));
        assert!(matches!(
            resolver.search_order(Some("nope"), Operation::Allocate),
            Err(WsError::NotFound(_))
        ));
    }

    #[test]
    fn limits_precedence() {
        let policy = policy(false);
        let scratch = policy.filesystem("scratch").unwrap();
        let project = policy.filesystem("project").unwrap();

        let carol = identity("carol", "users", &["users"]);
        let resolver = PolicyResolver::new(&policy, &carol);
        assert_eq!(resolver.limits(scratch).unwrap(), Limits { duration: 90, max_extensions: 2 });
        assert_eq!(resolver.limits(project).unwrap(), Limits { duration: 30, max_extensions: 3 });

        let bob = identity("bob", "users", &["users"]);
        let resolver = PolicyResolver::new(&policy, &bob);
        assert_eq!(resolver.limits(scratch).unwrap(), Limits { duration: 10, max_extensions: 2 });
    }

    #[test]
    fn durations_are_clamped_for_users_only() {
        let policy = policy(false);
        let limits = Limits { duration: 10, max_extensions: 2 };

        let bob = identity("bob", "users", &["users"]);
        let resolver = PolicyResolver::new(&policy, &bob);
        assert_eq!(resolver.clamp_duration(None, limits), (10, None));
        assert_eq!(resolver.clamp_duration(Some(5), limits), (5, None));
        assert_eq!(
            resolver.clamp_duration(Some(50), limits),
            (10, Some(Clamped { requested: 50, granted: 10 }))
        );
        assert_eq!(resolver.clamp_duration(Some(-1), limits).0, 10);

        let root = root();
        assert_eq!(PolicyResolver::new(&policy, &root).clamp_duration(Some(50), limits), (50, None));
    }
}
