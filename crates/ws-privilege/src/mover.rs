//! Directory relocation
//!
//! A plain rename first. When that fails (typically EXDEV because the trash
//! directory lives on another mount) an external recursive-move program is
//! executed directly, never through a shell, and its exit status decides.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Fixed search path for the external mover's own children
const MOVER_PATH: &str = "/usr/bin:/bin";

/// How a relocation succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Rename,
    External,
}

/// Renames with a fallback to an external move program
#[derive(Debug, Clone)]
pub struct CrossDeviceMover {
    program: PathBuf,
}

impl CrossDeviceMover {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Move `src` to `dst`. Must be called inside a privilege bracket when
    /// either side is not accessible to the caller.
    pub fn relocate(&self, src: &Path, dst: &Path) -> io::Result<MoveMethod> {
        match fs::rename(src, dst) {
            Ok(()) => Ok(MoveMethod::Rename),
            Err(rename_err) => {
                // Nothing to move; the external program would fail the same way
                if rename_err.kind() == io::ErrorKind::NotFound && !src.exists() {
                    return Err(rename_err);
                }
                self.external(src, dst).map(|()| MoveMethod::External)
            }
        }
    }

    /// Run the external mover as `<program> <src> <dst>` with a scrubbed
    /// environment
    pub fn external(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let output = Command::new(&self.program)
            .arg(src)
            .arg(dst)
            .env_clear()
            .env("PATH", MOVER_PATH)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if output.status.success() {
            return Ok(());
        }

        let detail = String::from_utf8_lossy(&output.stderr);
        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        Err(io::Error::other(format!(
            "{} {} {} failed with {}: {}",
            self.program.display(),
            src.display(),
            dst.display(),
            status,
            detail.trim()
        )))
    }
}

impl Default for CrossDeviceMover {
    fn default() -> Self {
        Self::new("/bin/mv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_within_one_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("alice-proj1");
        let dst = dir.path().join("alice-proj1-1700000000");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("data"), b"x").unwrap();

        let method = CrossDeviceMover::default().relocate(&src, &dst).unwrap();
        assert_eq!(method, MoveMethod::Rename);
        assert!(!src.exists());
        assert!(dst.join("data").exists());
    }

    #[test]
    fn missing_source_is_reported_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mover = CrossDeviceMover::new("/nonexistent/mover");
        let err = mover
            .relocate(&dir.path().join("gone"), &dir.path().join("dst"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn falls_back_to_external_program() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("ws");
        fs::create_dir(&src).unwrap();
        // rename refuses to put a directory over a non-empty one
        let dst = dir.path().join("target");
        fs::create_dir(&dst).unwrap();
        fs::write(dst.join("keep"), b"").unwrap();

        let method = CrossDeviceMover::new("/bin/mv").relocate(&src, &dst).unwrap();
        assert_eq!(method, MoveMethod::External);
        assert!(dst.join("ws").is_dir());
        assert!(!src.exists());
    }

    #[test]
    fn non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::create_dir(&src).unwrap();

        let err = CrossDeviceMover::new("/bin/false")
            .external(&src, &dst)
            .unwrap_err();
        assert!(err.to_string().contains("exit code 1"));
        assert!(src.exists());
    }
}
