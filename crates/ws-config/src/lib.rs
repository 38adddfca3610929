//! Policy store parsing and validation for the workspace tools
//!
//! Supports a TOML policy file with:
//! - Versioned schema
//! - An ordered list of filesystems with pools, database and trash locations
//! - ACLs, implicit-default mappings and per-user limit exceptions
//! - Validation with clear error messages

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use ws_util::WsError;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

impl From<ConfigError> for WsError {
    fn from(e: ConfigError) -> Self {
        WsError::Configuration(e.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate the policy from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate the policy from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let policy = Policy::from_raw(raw);
    tracing::debug!(
        filesystems = policy.filesystems.len(),
        privilege = %policy.privilege,
        "Policy parsed"
    );
    Ok(policy)
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        config_version = 1
        default = "scratch"
        dbuid = 85
        dbgid = 85
        duration = 10
        maxextensions = 2

        [[workspaces]]
        name = "scratch"
        spaces = ["/mnt/a", "/mnt/b"]
        database = "/var/ws/scratch"
        deleted = ".removed"
    "#;

    #[test]
    fn parse_minimal_config() {
        let policy = parse_config(MINIMAL).unwrap();
        assert_eq!(policy.filesystems.len(), 1);
        assert_eq!(policy.default_filesystem.as_deref(), Some("scratch"));
        assert_eq!(policy.filesystems[0].spaces.len(), 2);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let policy = load_config(file.path()).unwrap();
        assert_eq!(policy.filesystems[0].name, "scratch");
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = load_config("/nonexistent/ws.toml");
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn reject_wrong_version() {
        let config = MINIMAL.replace("config_version = 1", "config_version = 99");
        let result = parse_config(&config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn missing_required_key_is_parse_error() {
        let config = MINIMAL.replace("dbuid = 85", "");
        assert!(matches!(parse_config(&config), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn config_errors_map_to_configuration_class() {
        let err: WsError = parse_config("config_version = 99\ndbuid = 1\ndbgid = 1")
            .unwrap_err()
            .into();
        assert!(matches!(err, WsError::Configuration(_)));
    }
}
