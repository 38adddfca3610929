//! ws_restore - list released workspaces or move one into an active workspace

use anyhow::{Context, Result, bail};
use clap::Parser;
use ws_core::{LifecycleEngine, RestoreRequest};
use ws_tools::{CommonArgs, init_logging, open_engine, verify, workspace_name};
use ws_util::{WorkspaceName, format_epoch};

#[derive(Parser, Debug)]
#[command(name = "ws_restore", version, about = "Restore a released workspace")]
struct Args {
    /// Released workspace, as shown by --list
    #[arg(required_unless_present = "list")]
    name: Option<String>,

    /// Existing workspace to restore into
    #[arg(value_parser = workspace_name, required_unless_present = "list")]
    target: Option<WorkspaceName>,

    /// List restorable workspaces
    #[arg(short = 'l', long)]
    list: bool,

    /// Do not show the release date in the list
    #[arg(short = 'b', long, requires = "list")]
    brief: bool,

    /// Filesystem to use
    #[arg(short = 'F', long)]
    filesystem: Option<String>,

    /// Owner of the released workspace (root only)
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Skip the typing challenge (root only)
    #[arg(long)]
    no_verify: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn list(engine: &LifecycleEngine, args: &Args) -> Result<()> {
    let restorable = engine
        .list_restorable(args.username.as_deref(), args.filesystem.as_deref())
        .context("Failed to list restorable workspaces")?;

    let mut current: Option<&str> = None;
    for entry in &restorable {
        if current != Some(entry.filesystem.as_str()) {
            println!("{}:", entry.filesystem);
            current = Some(entry.filesystem.as_str());
        }
        println!("{}", entry.name);
        if !args.brief {
            println!("\tunavailable since {}", format_epoch(entry.released_at()));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level);

    let engine = open_engine(&args.common)?;
    if args.list {
        return list(&engine, &args);
    }

    let (Some(name), Some(target)) = (args.name.clone(), args.target.clone()) else {
        bail!("both the released workspace and the target workspace are required");
    };

    if args.no_verify && !engine.identity().is_privileged() {
        bail!("--no-verify is only available to root");
    }
    if !args.no_verify && !verify::ask_human().context("Failed to read answer")? {
        bail!("verification failed, nothing restored");
    }

    let request = RestoreRequest {
        trashed: name.clone(),
        target,
        owner: args.username.clone(),
        filesystem: args.filesystem.clone(),
    };
    let restore = engine
        .restore(&request)
        .with_context(|| format!("Failed to restore '{name}'"))?;

    println!("{}", restore.destination.display());
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
    fn list_needs_no_names() {
        let args = Args::try_parse_from(["ws_restore", "-l", "-b"]).unwrap();
        assert!(args.list && args.brief);
        assert!(args.name.is_none());
    }

    #[test]
    fn restore_needs_both_names() {
        assert!(Args::try_parse_from(["ws_restore", "alice-data-1700000000"]).is_err());
        let args =
            Args::try_parse_from(["ws_restore", "alice-data-1700000000", "fresh"]).unwrap();
        assert_eq!(args.target.map(|t| t.as_str().to_string()).as_deref(), Some("fresh"));
    }

    #[test]
    fn brief_only_with_list() {
        assert!(Args::try_parse_from(["ws_restore", "-b", "a-b-1", "fresh"]).is_err());
    }
}
