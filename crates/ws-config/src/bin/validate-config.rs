//! Policy validation CLI tool
//!
//! Validates a workspace policy file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use ws_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a workspace policy file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match ws_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", ws_config::CURRENT_CONFIG_VERSION);
            println!("  Privilege mode: {}", policy.privilege);
            println!(
                "  Database owner: {}:{}",
                policy.db_owner.uid, policy.db_owner.gid
            );
            println!(
                "  Default filesystem: {}",
                policy.default_filesystem.as_deref().unwrap_or("(none)")
            );

            if !policy.filesystems.is_empty() {
                println!();
                println!("Filesystems:");
                for fs in &policy.filesystems {
                    let mut flags = Vec::new();
                    if !fs.allocatable {
                        flags.push("no-allocate");
                    }
                    if !fs.extendable {
                        flags.push("no-extend");
                    }
                    if !fs.restorable {
                        flags.push("no-restore");
                    }
                    if fs.has_acl() {
                        flags.push("acl");
                    }
                    println!(
                        "  - {} ({} spaces, db {}) {}",
                        fs.name,
                        fs.spaces.len(),
                        fs.database.display(),
                        flags.join(" ")
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ws_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ws_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ws_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ws_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        ws_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
