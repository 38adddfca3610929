//! Scoped privilege brackets
//!
//! Every privileged syscall runs inside a bracket obtained from
//! [`CapabilityGuard`]. The bracket lowers on every exit path, including
//! panics and early returns. Nothing inside a bracket may log or talk to the
//! user.

use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::stat::{Mode, umask};
use std::cell::Cell;
use std::io;
use tracing::error;
use ws_util::PrivilegeMode;

use crate::{Capability, PrivilegeError, PrivilegeResult, PrivilegeStrategy};

/// Owner of the process-wide privilege state.
///
/// Threaded by reference through every mutating call. Tracks which
/// capabilities are currently raised so nesting the same capability is
/// rejected instead of silently collapsing two brackets into one.
pub struct CapabilityGuard {
    strategy: Box<dyn PrivilegeStrategy>,
    raised: Cell<u8>,
}

impl CapabilityGuard {
    /// Wrap a strategy without touching process state. Used by tests with a
    /// recording strategy.
    pub fn new(strategy: Box<dyn PrivilegeStrategy>) -> Self {
        Self {
            strategy,
            raised: Cell::new(0),
        }
    }

    /// Wrap a strategy and drop the process to its baseline privilege
    pub fn initialize(strategy: Box<dyn PrivilegeStrategy>) -> PrivilegeResult<Self> {
        strategy.initialize()?;
        Ok(Self::new(strategy))
    }

    pub fn mode(&self) -> PrivilegeMode {
        self.strategy.mode()
    }

    pub fn writes_as_db_owner(&self) -> bool {
        self.strategy.writes_as_db_owner()
    }

    pub fn is_raised(&self, cap: Capability) -> bool {
        self.raised.get() & cap.bit() != 0
    }

    /// Raise all of `caps`. On partial failure the ones already raised are
    /// lowered again before the error is returned.
    pub fn raise(&self, caps: &[Capability]) -> PrivilegeResult<Elevation<'_>> {
        let mut elevation = Elevation {
            guard: self,
            caps: Vec::with_capacity(caps.len()),
            as_db_owner: false,
        };
        for &cap in caps {
            if self.is_raised(cap) {
                return Err(PrivilegeError::Reentrant(cap));
            }
            self.strategy.raise(cap)?;
            self.raised.set(self.raised.get() | cap.bit());
            elevation.caps.push(cap);
        }
        Ok(elevation)
    }

    /// Run `op` with `caps` raised. The outer result is the privilege
    /// transition, the inner one is the operation itself.
    pub fn run<T>(
        &self,
        caps: &[Capability],
        op: impl FnOnce() -> io::Result<T>,
    ) -> PrivilegeResult<io::Result<T>> {
        let elevation = self.raise(caps)?;
        let result = op();
        elevation.lower()?;
        Ok(result)
    }

    /// Like [`CapabilityGuard::run`], but in setuid mode the operation runs
    /// with the database owner as effective identity.
    pub fn run_as_db_owner<T>(
        &self,
        caps: &[Capability],
        op: impl FnOnce() -> io::Result<T>,
    ) -> PrivilegeResult<io::Result<T>> {
        let mut elevation = self.raise(caps)?;
        if self.strategy.writes_as_db_owner() {
            self.strategy.assume_db_owner()?;
            elevation.as_db_owner = true;
        }
        let result = op();
        elevation.lower()?;
        Ok(result)
    }

    fn lower_one(&self, cap: Capability) -> PrivilegeResult<()> {
        let remaining = self.raised.get() & !cap.bit();
        self.strategy.lower(cap, remaining != 0)?;
        self.raised.set(remaining);
        Ok(())
    }
}

/// A raised set of capabilities. Lowered explicitly with
/// [`Elevation::lower`] or implicitly on drop.
#[must_use = "dropping an elevation lowers it immediately"]
pub struct Elevation<'a> {
    guard: &'a CapabilityGuard,
    caps: Vec<Capability>,
    as_db_owner: bool,
}

impl Elevation<'_> {
    pub fn lower(mut self) -> PrivilegeResult<()> {
        self.lower_all()
    }

    fn lower_all(&mut self) -> PrivilegeResult<()> {
        if self.as_db_owner {
            self.guard.strategy.release_db_owner()?;
            self.as_db_owner = false;
        }
        while let Some(cap) = self.caps.pop() {
            self.guard.lower_one(cap)?;
        }
        Ok(())
    }
}

impl Drop for Elevation<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lower_all() {
            // Continuing with unknown privilege is worse than dying here
            error!(error = %e, "Failed to return to baseline privilege");
            std::process::abort();
        }
    }
}

/// Ignores SIGINT until dropped, then restores the default disposition
pub struct InterruptMask {
    _private: (),
}

impl InterruptMask {
    pub fn engage() -> Self {
        // SAFETY: SigIgn installs no Rust handler, so no code runs in signal
        // context. The process is single threaded.
        unsafe {
            let _ = signal(Signal::SIGINT, SigHandler::SigIgn);
        }
        Self { _private: () }
    }
}

impl Drop for InterruptMask {
    fn drop(&mut self) {
        // SAFETY: see `engage`
        unsafe {
            let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        }
    }
}

/// Sets the umask to 077 until dropped, so intermediate directories created
/// while elevated never end up group or world accessible.
pub struct TightUmask {
    previous: Mode,
}

impl TightUmask {
    pub fn engage() -> Self {
        let previous = umask(Mode::from_bits_truncate(0o077));
        Self { previous }
    }
}

impl Drop for TightUmask {
    fn drop(&mut self) {
        umask(self.previous);
    }
}
