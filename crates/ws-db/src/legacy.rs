//! Legacy positional record layout
//!
//! ```text
//! 1700864000
//! /mnt/a/alice-proj1
//!
//! acctcode:hpc
//! extensions:3
//! ```
//!
//! Blank lines are ignored. Reminder, mail address, group and comment did not
//! exist in this layout and come back empty.

use std::path::PathBuf;

use crate::WorkspaceRecord;

pub(crate) fn decode(content: &str) -> Result<WorkspaceRecord, String> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let expiration = lines
        .next()
        .ok_or("missing expiration line")?
        .parse::<i64>()
        .map_err(|e| format!("bad expiration: {e}"))?;

    let workspace = lines.next().ok_or("missing workspace path line")?;
    if !workspace.starts_with('/') {
        return Err(format!("workspace path '{workspace}' is not absolute"));
    }

    let acctcode = field(lines.next(), "acctcode")?;
    let extensions = field(lines.next(), "extensions")?
        .parse::<i64>()
        .map_err(|e| format!("bad extension count: {e}"))?;

    if let Some(extra) = lines.next() {
        return Err(format!("unexpected trailing line '{extra}'"));
    }

    Ok(WorkspaceRecord {
        workspace: PathBuf::from(workspace),
        expiration,
        extensions,
        acctcode: acctcode.to_string(),
        reminder: 0,
        mailaddress: String::new(),
        group: None,
        comment: None,
        released: None,
    })
}

fn field<'a>(line: Option<&'a str>, key: &str) -> Result<&'a str, String> {
    let line = line.ok_or_else(|| format!("missing {key} line"))?;
    match line.split_once(':') {
        Some((k, v)) if k.trim() == key => Ok(v.trim()),
        _ => Err(format!("expected '{key}:<value>', got '{line}'")),
    }
}
