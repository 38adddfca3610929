//! Optional extra path segment between pool and workspace directory

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Computes the prefix segment for a new workspace. Failures are not errors:
/// they mean no segment.
pub trait PrefixHook {
    fn prefix(&self, filesystem: &str, username: &str) -> Option<String>;
}

/// Runs `<program> <filesystem> <username>` and uses its trimmed stdout
#[derive(Debug, Clone)]
pub struct ExecPrefixHook {
    program: PathBuf,
}

impl ExecPrefixHook {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PrefixHook for ExecPrefixHook {
    fn prefix(&self, filesystem: &str, username: &str) -> Option<String> {
        let output = Command::new(&self.program)
            .arg(filesystem)
            .arg(username)
            .env_clear()
            .env("PATH", "/usr/bin:/bin")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(hook = %self.program.display(), status = %output.status, "Prefix hook failed, using no prefix");
                return None;
            }
            Err(e) => {
                warn!(hook = %self.program.display(), error = %e, "Prefix hook not runnable, using no prefix");
                return None;
            }
        };

        let segment = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !is_plain_segment(&segment) {
            warn!(hook = %self.program.display(), segment = %segment, "Prefix hook returned an unusable segment");
            return None;
        }
        debug!(filesystem, username, segment = %segment, "Prefix hook result");
        Some(segment)
    }
}

/// One relative path component, not `.` or `..`
pub fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn hook_output_becomes_segment() {
        let dir = tempfile::tempdir().unwrap();
        let hook = ExecPrefixHook::new(script(dir.path(), "echo.sh", "echo \"$1-$2\""));
        assert_eq!(hook.prefix("scratch", "alice").as_deref(), Some("scratch-alice"));
    }

    #[test]
    fn failing_or_bad_hooks_give_no_segment() {
        let dir = tempfile::tempdir().unwrap();
        let hook = ExecPrefixHook::new(script(dir.path(), "fail.sh", "exit 3"));
        assert_eq!(hook.prefix("scratch", "alice"), None);

        let hook = ExecPrefixHook::new(script(dir.path(), "escape.sh", "echo ../etc"));
        assert_eq!(hook.prefix("scratch", "alice"), None);

        let hook = ExecPrefixHook::new(dir.path().join("missing"));
        assert_eq!(hook.prefix("scratch", "alice"), None);
    }

    #[test]
    fn segment_rules() {
        assert!(is_plain_segment("group1"));
        assert!(!is_plain_segment(""));
        assert!(!is_plain_segment(".."));
        assert!(!is_plain_segment("a/b"));
    }
}
