//! Elevation strategies
//!
//! Two interchangeable ways to get the privilege for one syscall:
//! - [`CapabilityStrategy`] adds exactly one POSIX capability to the effective
//!   set and clears it again.
//! - [`SetuidStrategy`] switches the effective uid to root and back to the
//!   database owner, for installations without file capabilities.
//!
//! The strategy is picked once at startup from the policy and never mixed.

use caps::{CapSet, CapsHashSet};
use nix::unistd::{Gid, Uid, setegid, seteuid};
use std::fmt;
use ws_util::PrivilegeMode;

use crate::{PrivilegeError, PrivilegeResult};

/// The privileges a workspace mutation can need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Bypass file read/write/execute permission checks
    DacOverride,
    /// Bypass directory read/search permission checks
    DacReadSearch,
    /// Change file ownership
    Chown,
    /// Bypass owner checks for chmod and friends
    Fowner,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::DacOverride,
        Capability::DacReadSearch,
        Capability::Chown,
        Capability::Fowner,
    ];

    pub(crate) fn bit(self) -> u8 {
        match self {
            Self::DacOverride => 1 << 0,
            Self::DacReadSearch => 1 << 1,
            Self::Chown => 1 << 2,
            Self::Fowner => 1 << 3,
        }
    }

    fn to_caps(self) -> caps::Capability {
        match self {
            Self::DacOverride => caps::Capability::CAP_DAC_OVERRIDE,
            Self::DacReadSearch => caps::Capability::CAP_DAC_READ_SEARCH,
            Self::Chown => caps::Capability::CAP_CHOWN,
            Self::Fowner => caps::Capability::CAP_FOWNER,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DacOverride => "CAP_DAC_OVERRIDE",
            Self::DacReadSearch => "CAP_DAC_READ_SEARCH",
            Self::Chown => "CAP_CHOWN",
            Self::Fowner => "CAP_FOWNER",
        };
        f.write_str(name)
    }
}

/// One way of performing elevation. Implementations must be all-or-nothing
/// per call: a failed `raise` leaves the process at its baseline.
pub trait PrivilegeStrategy {
    fn mode(&self) -> PrivilegeMode;

    /// Reduce the process to its baseline. Called once before any operation.
    fn initialize(&self) -> PrivilegeResult<()>;

    fn raise(&self, cap: Capability) -> PrivilegeResult<()>;

    /// Drop `cap` again. `others_raised` tells strategies that cannot
    /// separate capabilities (setuid) to keep their elevation for an
    /// enclosing bracket.
    fn lower(&self, cap: Capability, others_raised: bool) -> PrivilegeResult<()>;

    /// Whether record files are written while running as the database owner,
    /// which makes a separate chown unnecessary.
    fn writes_as_db_owner(&self) -> bool;

    /// Become the database owner for a record write. Only called while elevated.
    fn assume_db_owner(&self) -> PrivilegeResult<()>;

    /// Undo [`PrivilegeStrategy::assume_db_owner`].
    fn release_db_owner(&self) -> PrivilegeResult<()>;
}

/// Build the strategy configured for this installation
pub fn strategy_for(mode: PrivilegeMode, db_uid: u32, db_gid: u32) -> Box<dyn PrivilegeStrategy> {
    match mode {
        PrivilegeMode::Capabilities => Box::new(CapabilityStrategy),
        PrivilegeMode::Setuid => Box::new(SetuidStrategy::new(db_uid, db_gid)),
    }
}

/// POSIX capability mode: the binary carries file capabilities in its
/// permitted set, the effective set is empty except inside a bracket.
#[derive(Debug, Default)]
pub struct CapabilityStrategy;

impl PrivilegeStrategy for CapabilityStrategy {
    fn mode(&self) -> PrivilegeMode {
        PrivilegeMode::Capabilities
    }

    fn initialize(&self) -> PrivilegeResult<()> {
        let permitted = caps::read(None, CapSet::Permitted)
            .map_err(|e| PrivilegeError::Initialize(e.to_string()))?;
        let needed: CapsHashSet = Capability::ALL.iter().map(|c| c.to_caps()).collect();
        let kept: CapsHashSet = permitted.intersection(&needed).copied().collect();

        caps::clear(None, CapSet::Effective)
            .map_err(|e| PrivilegeError::Initialize(e.to_string()))?;
        caps::set(None, CapSet::Permitted, &kept)
            .map_err(|e| PrivilegeError::Initialize(e.to_string()))?;
        Ok(())
    }

    fn raise(&self, cap: Capability) -> PrivilegeResult<()> {
        caps::raise(None, CapSet::Effective, cap.to_caps()).map_err(|e| {
            PrivilegeError::RaiseFailed {
                cap,
                reason: e.to_string(),
            }
        })
    }

    fn lower(&self, cap: Capability, _others_raised: bool) -> PrivilegeResult<()> {
        caps::drop(None, CapSet::Effective, cap.to_caps()).map_err(|e| {
            PrivilegeError::LowerFailed {
                cap,
                reason: e.to_string(),
            }
        })
    }

    fn writes_as_db_owner(&self) -> bool {
        false
    }

    fn assume_db_owner(&self) -> PrivilegeResult<()> {
        Ok(())
    }

    fn release_db_owner(&self) -> PrivilegeResult<()> {
        Ok(())
    }
}

/// Setuid-root mode: the baseline effective uid is the database owner,
/// elevation means effective uid 0.
#[derive(Debug)]
pub struct SetuidStrategy {
    db_uid: Uid,
    db_gid: Gid,
}

impl SetuidStrategy {
    pub fn new(db_uid: u32, db_gid: u32) -> Self {
        Self {
            db_uid: Uid::from_raw(db_uid),
            db_gid: Gid::from_raw(db_gid),
        }
    }
}

impl PrivilegeStrategy for SetuidStrategy {
    fn mode(&self) -> PrivilegeMode {
        PrivilegeMode::Setuid
    }

    fn initialize(&self) -> PrivilegeResult<()> {
        seteuid(self.db_uid).map_err(|e| PrivilegeError::Initialize(e.to_string()))
    }

    fn raise(&self, cap: Capability) -> PrivilegeResult<()> {
        seteuid(Uid::from_raw(0)).map_err(|e| PrivilegeError::RaiseFailed {
            cap,
            reason: e.to_string(),
        })
    }

    fn lower(&self, cap: Capability, others_raised: bool) -> PrivilegeResult<()> {
        if others_raised {
            return Ok(());
        }
        seteuid(self.db_uid).map_err(|e| PrivilegeError::LowerFailed {
            cap,
            reason: e.to_string(),
        })
    }

    fn writes_as_db_owner(&self) -> bool {
        true
    }

    // root_squash filesystems only let the database owner write the database
    fn assume_db_owner(&self) -> PrivilegeResult<()> {
        setegid(self.db_gid)
            .and_then(|_| seteuid(self.db_uid))
            .map_err(|e| PrivilegeError::IdentitySwitch(e.to_string()))
    }

    fn release_db_owner(&self) -> PrivilegeResult<()> {
        seteuid(Uid::from_raw(0))
            .and_then(|_| setegid(Gid::current()))
            .map_err(|e| PrivilegeError::IdentitySwitch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_bits_are_distinct() {
        let mask = Capability::ALL.iter().fold(0u8, |acc, c| {
            assert_eq!(acc & c.bit(), 0);
            acc | c.bit()
        });
        assert_eq!(mask, 0b1111);
    }

    #[test]
    fn strategy_matches_mode() {
        assert_eq!(
            strategy_for(PrivilegeMode::Capabilities, 1, 1).mode(),
            PrivilegeMode::Capabilities
        );
        let setuid = strategy_for(PrivilegeMode::Setuid, 85, 85);
        assert_eq!(setuid.mode(), PrivilegeMode::Setuid);
        assert!(setuid.writes_as_db_owner());
    }
}
