//! ws_allocate - create, reuse or extend a workspace
//!
//! Prints the workspace path on stdout, so `cd $(ws_allocate data)` works.

use anyhow::{Context, Result};
use clap::Parser;
use ws_core::{AllocateRequest, AllocationKind, GroupMode};
use ws_tools::{CommonArgs, init_logging, open_engine, workspace_name};
use ws_util::{WorkspaceName, remaining_days};

#[derive(Parser, Debug)]
#[command(name = "ws_allocate", version, about = "Allocate or extend a workspace")]
struct Args {
    /// Workspace name
    #[arg(value_parser = workspace_name)]
    name: WorkspaceName,

    /// Lifetime in days (filesystem default if omitted)
    #[arg(allow_negative_numbers = true)]
    duration: Option<i64>,

    /// Filesystem to use instead of the default
    #[arg(short = 'F', long)]
    filesystem: Option<String>,

    /// Extend an existing workspace
    #[arg(short = 'x', long)]
    extension: bool,

    /// Act on a workspace of another user
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Make the workspace readable by your current group
    #[arg(short = 'g', long, conflicts_with = "groupname")]
    group: bool,

    /// Share the workspace with this group (group writable)
    #[arg(short = 'G', long)]
    groupname: Option<String>,

    /// Days before expiration to send a reminder
    #[arg(short = 'r', long)]
    reminder: Option<i64>,

    /// Address for the reminder
    #[arg(short = 'm', long)]
    mailaddress: Option<String>,

    /// Free text stored with the workspace
    #[arg(short = 'c', long)]
    comment: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

impl Args {
    fn request(&self) -> AllocateRequest {
        let group = match (&self.groupname, self.group) {
            (Some(name), _) => GroupMode::Shared(name.clone()),
            (None, true) => GroupMode::Readable,
            (None, false) => GroupMode::Private,
        };
        AllocateRequest {
            filesystem: self.filesystem.clone(),
            extend: self.extension,
            duration: self.duration,
            reminder: self.reminder,
            mail: self.mailaddress.clone(),
            user: self.username.clone(),
            group,
            comment: self.comment.clone(),
            ..AllocateRequest::new(self.name.clone())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level);

    let engine = open_engine(&args.common)?;
    let now = ws_util::now();
    let allocation = engine
        .allocate(&args.request(), now)
        .with_context(|| format!("Failed to allocate workspace '{}'", args.name))?;

    if let Some(clamped) = allocation.clamped {
        eprintln!(
            "Info: duration of {} days is longer than allowed, using {} days",
            clamped.requested, clamped.granted
        );
    }
    if allocation.kind == AllocationKind::Reused {
        eprintln!("Info: reusing workspace");
    }

    println!("{}", allocation.workspace().display());
    eprintln!("remaining extensions  : {}", allocation.record.extensions);
    eprintln!(
        "remaining time in days: {}",
        remaining_days(allocation.record.expiration, now)
    );
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
    fn shared_group_wins_over_readable() {
        let args = Args::try_parse_from(["ws_allocate", "-G", "lab", "data", "20"]).unwrap();
        let req = args.request();
        assert_eq!(req.group, GroupMode::Shared("lab".into()));
        assert_eq!(req.duration, Some(20));

        let args = Args::try_parse_from(["ws_allocate", "-g", "data"]).unwrap();
        assert_eq!(args.request().group, GroupMode::Readable);

        assert!(Args::try_parse_from(["ws_allocate", "-g", "-G", "lab", "data"]).is_err());
    }

    #[test]
    fn extension_options_reach_the_request() {
        let args = Args::try_parse_from([
            "ws_allocate", "-x", "-u", "bob", "-m", "bob@example.org", "-r", "3", "data", "0",
        ])
        .unwrap();
        let req = args.request();
        assert!(req.extend);
        assert_eq!(req.user.as_deref(), Some("bob"));
        assert_eq!(req.reminder, Some(3));
        assert_eq!(req.duration, Some(0));
    }

    #[test]
    fn bad_names_are_rejected_by_the_parser() {
        assert!(Args::try_parse_from(["ws_allocate", "../x"]).is_err());
    }
}
