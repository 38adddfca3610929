//! Policy validation

use crate::policy::SpaceSelection;
use crate::schema::{RawConfig, RawFilesystem};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Filesystem '{filesystem}': {message}")]
    FilesystemError { filesystem: String, message: String },

    #[error("Duplicate filesystem name: {0}")]
    DuplicateFilesystem(String),

    #[error("Default filesystem '{0}' is not defined")]
    UnknownDefault(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for fs in &config.workspaces {
        if !seen.insert(fs.name.as_str()) {
            errors.push(ValidationError::DuplicateFilesystem(fs.name.clone()));
        }
    }

    if let Some(default) = &config.default
        && !seen.contains(default.as_str())
    {
        errors.push(ValidationError::UnknownDefault(default.clone()));
    }

    for (key, value) in [
        ("duration", config.duration),
        ("maxextensions", config.maxextensions),
    ] {
        if value.is_some_and(|v| v < 0) {
            errors.push(ValidationError::GlobalError(format!(
                "{key} must not be negative"
            )));
        }
    }
    if config.reminderdefault < 0 {
        errors.push(ValidationError::GlobalError(
            "reminderdefault must not be negative".into(),
        ));
    }

    for fs in &config.workspaces {
        errors.extend(validate_filesystem(fs, config));
    }

    errors
}

fn validate_filesystem(fs: &RawFilesystem, config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut error = |message: String| {
        errors.push(ValidationError::FilesystemError {
            filesystem: fs.name.clone(),
            message,
        })
    };

    if fs.name.is_empty() {
        error("name cannot be empty".into());
    }

    if fs.allocatable && fs.spaces.is_empty() {
        error("spaces cannot be empty for an allocatable filesystem".into());
    }
    for space in &fs.spaces {
        if !space.is_absolute() {
            error(format!("space {} must be an absolute path", space.display()));
        }
    }

    if !fs.database.is_absolute() {
        error(format!(
            "database {} must be an absolute path",
            fs.database.display()
        ));
    }

    if fs.deleted.is_empty() || fs.deleted.contains('/') || fs.deleted == "." || fs.deleted == ".."
    {
        error(format!(
            "deleted '{}' must be a plain directory name",
            fs.deleted
        ));
    }

    if let Some(selection) = &fs.spaceselection
        && let Err(e) = parse_space_selection(selection)
    {
        error(e);
    }

    // Limits must resolve to something for every user
    if fs.duration.is_none() && config.duration.is_none() {
        error("no duration here and no global duration".into());
    }
    if fs.maxextensions.is_none() && config.maxextensions.is_none() {
        error("no maxextensions here and no global maxextensions".into());
    }

    let own = [("duration", fs.duration), ("maxextensions", fs.maxextensions)];
    let exceptions = fs.userexceptions.iter().flat_map(|(user, e)| {
        [
            (user.as_str(), "duration", e.duration),
            (user.as_str(), "maxextensions", e.maxextensions),
        ]
    });
    for (key, value) in own {
        if value.is_some_and(|v| v < 0) {
            error(format!("{key} must not be negative"));
        }
    }
    for (user, key, value) in exceptions {
        if value.is_some_and(|v| v < 0) {
            error(format!("userexceptions.{user}.{key} must not be negative"));
        }
    }

    if let Some(hook) = &fs.prefix_hook
        && !hook.is_absolute()
    {
        error(format!(
            "prefix_hook {} must be an absolute path",
            hook.display()
        ));
    }

    errors
}

/// Parse a pool selection strategy name
pub fn parse_space_selection(s: &str) -> Result<SpaceSelection, String> {
    match s.to_lowercase().as_str() {
        "random" => Ok(SpaceSelection::Random),
        "uid" => Ok(SpaceSelection::Uid),
        "gid" => Ok(SpaceSelection::Gid),
        "mostspace" => Ok(SpaceSelection::MostSpace),
        other => Err(format!("Unknown spaceselection: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn filesystem(name: &str) -> RawFilesystem {
        RawFilesystem {
            name: name.into(),
            spaces: vec![PathBuf::from("/mnt/a")],
            spaceselection: None,
            database: PathBuf::from("/var/ws").join(name),
            deleted: ".removed".into(),
            duration: Some(10),
            maxextensions: Some(2),
            allocatable: true,
            extendable: true,
            restorable: true,
            user_acl: vec![],
            group_acl: vec![],
            userdefault: vec![],
            groupdefault: vec![],
            prefix_hook: None,
            userexceptions: Default::default(),
        }
    }

    fn config(workspaces: Vec<RawFilesystem>) -> RawConfig {
        RawConfig {
            config_version: 1,
            default: None,
            duration: None,
            maxextensions: None,
            reminderdefault: 0,
            dbuid: 85,
            dbgid: 85,
            privilege: Default::default(),
            check_all_groups: false,
            mover: None,
            workspaces,
        }
    }

    #[test]
    fn test_parse_space_selection() {
        assert_eq!(parse_space_selection("random").unwrap(), SpaceSelection::Random);
        assert_eq!(parse_space_selection("UID").unwrap(), SpaceSelection::Uid);
        assert_eq!(parse_space_selection("gid").unwrap(), SpaceSelection::Gid);
        assert_eq!(
            parse_space_selection("mostspace").unwrap(),
            SpaceSelection::MostSpace
        );
        assert!(parse_space_selection("roundrobin").is_err());
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(validate_config(&config(vec![filesystem("scratch")])).is_empty());
    }

    #[test]
    fn test_duplicate_name_detection() {
        let errors = validate_config(&config(vec![filesystem("scratch"), filesystem("scratch")]));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateFilesystem(_))));
    }

    #[test]
    fn unknown_default_is_reported() {
        let mut cfg = config(vec![filesystem("scratch")]);
        cfg.default = Some("work".into());
        let errors = validate_config(&cfg);
        assert!(matches!(&errors[..], [ValidationError::UnknownDefault(d)] if d == "work"));
    }

    #[test]
    fn bad_paths_and_trash_name_are_collected() {
        let mut fs = filesystem("scratch");
        fs.database = PathBuf::from("relative/db");
        fs.deleted = "../trash".into();
        fs.spaces = vec![PathBuf::from("pool")];
        let errors = validate_config(&config(vec![fs]));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn limits_must_resolve() {
        let mut fs = filesystem("scratch");
        fs.duration = None;
        fs.maxextensions = None;
        assert_eq!(validate_config(&config(vec![fs.clone()])).len(), 2);

        let mut cfg = config(vec![fs]);
        cfg.duration = Some(30);
        cfg.maxextensions = Some(3);
        assert!(validate_config(&cfg).is_empty());
    }

    #[test]
    fn negative_exception_is_rejected() {
        let mut fs = filesystem("scratch");
        fs.userexceptions.insert(
            "alice".into(),
            crate::schema::RawUserException {
                duration: Some(-1),
                maxextensions: None,
            },
        );
        let errors = validate_config(&config(vec![fs]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("userexceptions.alice.duration"));
    }
}
