//! The calling identity

use nix::unistd::{Gid, Group, Uid, User, getgrouplist};
use std::ffi::CString;

use crate::{PrivilegeError, PrivilegeResult};

/// Who invoked the tool. Always resolved from the real uid/gid, never the
/// effective ones, since the binary runs with elevated effective credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub username: String,
    /// Name of the primary group
    pub primary_group: String,
    /// Names of all groups the user is in, primary included
    pub groups: Vec<String>,
    /// Real uid 0. Bypasses ACLs, limits and ownership checks.
    pub privileged: bool,
}

impl Identity {
    pub fn current() -> PrivilegeResult<Self> {
        let uid = Uid::current();
        let gid = Gid::current();

        let user = User::from_uid(uid)
            .map_err(|e| PrivilegeError::IdentitySwitch(format!("user lookup: {e}")))?
            .ok_or_else(|| PrivilegeError::IdentitySwitch(format!("no passwd entry for uid {uid}")))?;

        let primary_group = group_name(gid);
        let groups = CString::new(user.name.as_str())
            .ok()
            .and_then(|name| getgrouplist(&name, gid).ok())
            .map(|gids| gids.into_iter().map(group_name).collect())
            .unwrap_or_else(|| vec![primary_group.clone()]);

        Ok(Self {
            uid: uid.as_raw(),
            gid: gid.as_raw(),
            username: user.name,
            primary_group,
            groups,
            privileged: uid.is_root(),
        })
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.primary_group == group || self.groups.iter().any(|g| g == group)
    }
}

/// Resolve a user name to its uid and primary gid
pub fn lookup_user(name: &str) -> Option<(u32, u32)> {
    User::from_name(name)
        .ok()
        .flatten()
        .map(|u| (u.uid.as_raw(), u.gid.as_raw()))
}

/// Resolve a group name to its gid
pub fn lookup_group(name: &str) -> Option<u32> {
    Group::from_name(name).ok().flatten().map(|g| g.gid.as_raw())
}

/// Name of the group `gid`, or the number when it has no entry
pub fn group_name_of(gid: u32) -> String {
    group_name(Gid::from_raw(gid))
}

fn group_name(gid: Gid) -> String {
    Group::from_gid(gid)
        .ok()
        .flatten()
        .map(|g| g.name)
        .unwrap_or_else(|| gid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_identity_matches_process() {
        let me = Identity::current().unwrap();
        assert_eq!(me.uid, Uid::current().as_raw());
        assert_eq!(me.gid, Gid::current().as_raw());
        assert!(me.in_group(&me.primary_group));
        assert_eq!(lookup_user(&me.username).map(|(uid, _)| uid), Some(me.uid));
        assert_eq!(group_name_of(me.gid), me.primary_group);
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert_eq!(lookup_user("no-such-user-for-ws-tests"), None);
        assert_eq!(lookup_group("no-such-group-for-ws-tests"), None);
    }
}
