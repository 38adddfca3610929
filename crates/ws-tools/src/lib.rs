//! Shared setup for the `ws_allocate`, `ws_release` and `ws_restore` binaries
//!
//! Each binary parses its own arguments, then goes through the same steps:
//! install logging on stderr, resolve the caller, load the policy, drop to
//! the baseline privilege state and hand everything to the lifecycle engine.

pub mod verify;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use ws_config::load_config;
use ws_core::LifecycleEngine;
use ws_privilege::{CapabilityGuard, Identity, strategy_for};
use ws_util::{
    WS_CONFIG_ENV, WorkspaceName, WsError, config_path_without_env, default_config_path,
    is_mock_time_active,
};

/// Options every front-end accepts
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Policy file (honored for root and in debug builds only)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Log to stderr; stdout carries the resulting path
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// clap value parser for workspace names
pub fn workspace_name(raw: &str) -> Result<WorkspaceName, WsError> {
    WorkspaceName::parse(raw)
}

/// Policy file to load for `identity`.
///
/// An unprivileged caller of a release build cannot point the tool at a
/// policy of their own making, so `--config` and `WS_CONFIG` are ignored.
pub fn config_path(requested: Option<PathBuf>, identity: &Identity) -> PathBuf {
    if identity.is_privileged() || cfg!(debug_assertions) {
        return requested.unwrap_or_else(default_config_path);
    }
    if requested.is_some() || std::env::var_os(WS_CONFIG_ENV).is_some() {
        warn!(user = %identity.username, "Ignoring policy file override for unprivileged caller");
    }
    config_path_without_env()
}

/// Resolve the caller, load the policy and enter the baseline privilege state
pub fn open_engine(common: &CommonArgs) -> Result<LifecycleEngine> {
    let identity = Identity::current().context("Failed to resolve calling user")?;
    if is_mock_time_active() {
        warn!("Mock time is active, expirations use a shifted clock");
    }
    let path = config_path(common.config.clone(), &identity);

    let policy = load_config(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    debug!(
        config_path = %path.display(),
        filesystems = policy.filesystems.len(),
        "Configuration loaded"
    );

    let strategy = strategy_for(policy.privilege, policy.db_owner.uid, policy.db_owner.gid);
    let guard = CapabilityGuard::initialize(strategy)
        .with_context(|| format!("Failed to initialize {} privilege mode", policy.privilege))?;

    Ok(LifecycleEngine::new(policy, identity, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(privileged: bool) -> Identity {
        Identity {
            uid: if privileged { 0 } else { 1000 },
            gid: 1000,
            username: if privileged { "root" } else { "alice" }.into(),
            primary_group: "users".into(),
            groups: vec!["users".into()],
            privileged,
        }
    }

    #[test]
    fn root_may_override_the_policy_file() {
        let path = config_path(Some("/tmp/ws.toml".into()), &identity(true));
        assert_eq!(path, PathBuf::from("/tmp/ws.toml"));
    }

    #[test]
    fn override_for_unprivileged_callers_depends_on_build() {
        let path = config_path(Some("/tmp/ws.toml".into()), &identity(false));
        if cfg!(debug_assertions) {
            assert_eq!(path, PathBuf::from("/tmp/ws.toml"));
        } else {
            assert_eq!(path, config_path_without_env());
        }
    }

    #[test]
    fn names_are_validated_while_parsing() {
        assert!(workspace_name("results-2024").is_ok());
        assert!(workspace_name("../etc").is_err());
        assert!(workspace_name("").is_err());
    }
}
