//! ws_release - move a workspace into the filesystem's trash

use anyhow::{Context, Result};
use clap::Parser;
use std::thread;
use std::time::Duration;
use ws_core::ReleaseRequest;
use ws_tools::{CommonArgs, init_logging, open_engine, workspace_name};
use ws_util::WorkspaceName;

#[derive(Parser, Debug)]
#[command(name = "ws_release", version, about = "Release a workspace")]
struct Args {
    /// Workspace name
    #[arg(value_parser = workspace_name)]
    name: WorkspaceName,

    /// Filesystem to search instead of all accessible ones
    #[arg(short = 'F', long)]
    filesystem: Option<String>,

    /// Root only: the database entry carries no owner prefix
    #[arg(long)]
    bare_name: bool,

    /// Delete the data right away; it can not be restored afterwards
    #[arg(long)]
    delete_data: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level);

    let engine = open_engine(&args.common)?;
    if args.delete_data {
        eprintln!("Info: deleting files as --delete-data was given");
        eprintln!("Info: you have 5 seconds to interrupt with CTRL-C to prevent deletion");
        thread::sleep(Duration::from_secs(5));
    }

    let request = ReleaseRequest {
        name: args.name.clone(),
        filesystem: args.filesystem.clone(),
        bare_name: args.bare_name,
        delete_data: args.delete_data,
    };
    let release = engine
        .release(&request, ws_util::now())
        .with_context(|| format!("Failed to release workspace '{}'", args.name))?;

    if let Some(count) = release.deleted_files {
        eprintln!("Info: deleted {count} files");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_filesystem_and_bare_name() {
        let args = Args::try_parse_from(["ws_release", "-F", "scratch", "--bare-name", "data"]).unwrap();
        assert_eq!(args.filesystem.as_deref(), Some("scratch"));
        assert!(args.bare_name);
        assert!(!args.delete_data);
        assert_eq!(args.name.as_str(), "data");

        let args = Args::try_parse_from(["ws_release", "--delete-data", "data"]).unwrap();
        assert!(args.delete_data);
    }
}
