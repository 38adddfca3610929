//! Default paths for the workspace tools
//!
//! The policy file is system-wide and root-owned:
//! - Config: `$WS_CONFIG` or `/etc/ws.toml`

use std::path::PathBuf;

/// Environment variable for overriding the policy file path
pub const WS_CONFIG_ENV: &str = "WS_CONFIG";

/// Built-in location of the policy file
const SYSTEM_CONFIG_PATH: &str = "/etc/ws.toml";

/// Get the default policy file path.
///
/// Order of precedence:
/// 1. `$WS_CONFIG` environment variable (if set and non-empty)
/// 2. `/etc/ws.toml`
pub fn default_config_path() -> PathBuf {
    match std::env::var(WS_CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_path_without_env(),
    }
}

/// Get the policy file path without checking the `WS_CONFIG` env var.
pub fn config_path_without_env() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_config_path_is_absolute() {
        let path = config_path_without_env();
        assert!(path.is_absolute());
        assert!(path.to_string_lossy().ends_with("ws.toml"));
    }
}
