//! Raw policy schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use ws_util::PrivilegeMode;

/// Raw policy file as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global fallback filesystem for implicit selection
    pub default: Option<String>,

    /// Global default duration in days
    pub duration: Option<i64>,

    /// Global default number of extensions
    pub maxextensions: Option<i64>,

    /// Default reminder lead time in days (0 = no reminder)
    #[serde(default)]
    pub reminderdefault: i64,

    /// Owner of all database entries
    pub dbuid: u32,
    pub dbgid: u32,

    /// Elevation strategy
    #[serde(default)]
    pub privilege: PrivilegeMode,

    /// Also match supplementary groups against ACLs and group defaults
    #[serde(default)]
    pub check_all_groups: bool,

    /// Recursive move utility used when rename() fails
    pub mover: Option<PathBuf>,

    /// Filesystems in scan order
    #[serde(default)]
    pub workspaces: Vec<RawFilesystem>,
}

/// Raw filesystem definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFilesystem {
    /// Unique filesystem name, as used with `-F`
    pub name: String,

    /// Candidate storage pools
    #[serde(default)]
    pub spaces: Vec<PathBuf>,

    /// Pool selection: "random", "uid", "gid" or "mostspace"
    pub spaceselection: Option<String>,

    /// Database directory holding one record per workspace
    pub database: PathBuf,

    /// Trash subdirectory name, below the database and below each pool
    pub deleted: String,

    /// Maximum duration in days
    pub duration: Option<i64>,

    /// Maximum number of extensions
    pub maxextensions: Option<i64>,

    #[serde(default = "default_true")]
    pub allocatable: bool,

    #[serde(default = "default_true")]
    pub extendable: bool,

    #[serde(default = "default_true")]
    pub restorable: bool,

    #[serde(default)]
    pub user_acl: Vec<String>,

    #[serde(default)]
    pub group_acl: Vec<String>,

    /// Users for whom this filesystem is the implicit default
    #[serde(default)]
    pub userdefault: Vec<String>,

    /// Groups for which this filesystem is the implicit default
    #[serde(default)]
    pub groupdefault: Vec<String>,

    /// Executable computing an extra path segment for new workspaces
    pub prefix_hook: Option<PathBuf>,

    /// Per-user limit overrides
    #[serde(default)]
    pub userexceptions: HashMap<String, RawUserException>,
}

/// Per-user limit override
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawUserException {
    pub duration: Option<i64>,
    pub maxextensions: Option<i64>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filesystem_with_exceptions() {
        let toml_str = r#"
            config_version = 1
            dbuid = 85
            dbgid = 85
            duration = 30
            maxextensions = 3

            [[workspaces]]
            name = "scratch"
            spaces = ["/mnt/a", "/mnt/b"]
            database = "/var/ws/scratch"
            deleted = ".removed"
            user_acl = ["alice"]

            [workspaces.userexceptions.alice]
            duration = 90
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workspaces.len(), 1);
        let fs = &config.workspaces[0];
        assert_eq!(fs.name, "scratch");
        assert!(fs.allocatable && fs.extendable && fs.restorable);
        assert_eq!(fs.userexceptions["alice"].duration, Some(90));
        assert_eq!(fs.userexceptions["alice"].maxextensions, None);
        assert_eq!(config.privilege, PrivilegeMode::Capabilities);
    }

    #[test]
    fn filesystems_keep_declaration_order() {
        let toml_str = r#"
            config_version = 1
            dbuid = 0
            dbgid = 0
            privilege = "setuid"

            [[workspaces]]
            name = "zeta"
            database = "/db/zeta"
            deleted = ".removed"

            [[workspaces]]
            name = "alpha"
            database = "/db/alpha"
            deleted = ".removed"
            allocatable = false
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        let names: Vec<_> = config.workspaces.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert!(!config.workspaces[1].allocatable);
        assert_eq!(config.privilege, PrivilegeMode::Setuid);
    }
}
