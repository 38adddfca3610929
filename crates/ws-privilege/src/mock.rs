//! Recording privilege strategy for testing
//!
//! Performs no privilege transitions. Operations inside brackets run with the
//! test process' own credentials, so tests must arrange paths the current
//! user can write.

use std::sync::{Arc, Mutex};
use ws_util::PrivilegeMode;

use crate::{
    Capability, CapabilityGuard, PrivilegeError, PrivilegeResult, PrivilegeStrategy,
};

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeEvent {
    Initialize,
    Raise(Capability),
    Lower(Capability),
    AssumeDbOwner,
    ReleaseDbOwner,
}

/// Mock strategy. Clones share the event log, so a test keeps one handle
/// and gives another to the guard.
#[derive(Debug, Clone)]
pub struct MockPrivilege {
    mode: PrivilegeMode,
    events: Arc<Mutex<Vec<PrivilegeEvent>>>,

    /// Make raising this capability fail
    pub fail_raise: Arc<Mutex<Option<Capability>>>,
}

impl Default for MockPrivilege {
    fn default() -> Self {
        Self::with_mode(PrivilegeMode::Capabilities)
    }
}

impl MockPrivilege {
    pub fn with_mode(mode: PrivilegeMode) -> Self {
        Self {
            mode,
            events: Arc::new(Mutex::new(Vec::new())),
            fail_raise: Arc::new(Mutex::new(None)),
        }
    }

    pub fn setuid() -> Self {
        Self::with_mode(PrivilegeMode::Setuid)
    }

    /// A guard driven by a clone of this mock
    pub fn guard(&self) -> CapabilityGuard {
        CapabilityGuard::new(Box::new(self.clone()))
    }

    pub fn fail_raise_of(&self, cap: Capability) {
        *self.fail_raise.lock().unwrap() = Some(cap);
    }

    pub fn events(&self) -> Vec<PrivilegeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Capabilities raised so far, in order, duplicates included
    pub fn raised(&self) -> Vec<Capability> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PrivilegeEvent::Raise(cap) => Some(cap),
                _ => None,
            })
            .collect()
    }

    /// True when every raise has a matching lower
    pub fn is_balanced(&self) -> bool {
        let mut depth: i64 = 0;
        let mut db_owner = false;
        for event in self.events() {
            match event {
                PrivilegeEvent::Raise(_) => depth += 1,
                PrivilegeEvent::Lower(_) => depth -= 1,
                PrivilegeEvent::AssumeDbOwner => db_owner = true,
                PrivilegeEvent::ReleaseDbOwner => db_owner = false,
                PrivilegeEvent::Initialize => {}
            }
        }
        depth == 0 && !db_owner
    }

    fn record(&self, event: PrivilegeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl PrivilegeStrategy for MockPrivilege {
    fn mode(&self) -> PrivilegeMode {
        self.mode
    }

    fn initialize(&self) -> PrivilegeResult<()> {
        self.record(PrivilegeEvent::Initialize);
        Ok(())
    }

    fn raise(&self, cap: Capability) -> PrivilegeResult<()> {
        if *self.fail_raise.lock().unwrap() == Some(cap) {
            return Err(PrivilegeError::RaiseFailed {
                cap,
                reason: "mock failure".into(),
            });
        }
        self.record(PrivilegeEvent::Raise(cap));
        Ok(())
    }

    fn lower(&self, cap: Capability, _others_raised: bool) -> PrivilegeResult<()> {
        self.record(PrivilegeEvent::Lower(cap));
        Ok(())
    }

    fn writes_as_db_owner(&self) -> bool {
        self.mode == PrivilegeMode::Setuid
    }

    fn assume_db_owner(&self) -> PrivilegeResult<()> {
        self.record(PrivilegeEvent::AssumeDbOwner);
        Ok(())
    }

    fn release_db_owner(&self) -> PrivilegeResult<()> {
        self.record(PrivilegeEvent::ReleaseDbOwner);
        Ok(())
    }
}
