//! Strongly-typed names for workspaces and their trash generations

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WsError;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// A workspace name as given by the user, e.g. `proj1`.
///
/// Must match `^[A-Za-z0-9][A-Za-z0-9_.-]*$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceName(String);

impl WorkspaceName {
    pub fn parse(name: impl Into<String>) -> Result<Self, WsError> {
        let name = name.into();
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(WsError::invalid_name(name, "name is empty")),
            Some(c) if !c.is_ascii_alphanumeric() => {
                return Err(WsError::invalid_name(
                    name,
                    "must start with a letter or digit",
                ));
            }
            Some(_) => {}
        }
        if !chars.all(is_name_char) {
            return Err(WsError::invalid_name(
                name,
                "use letters, digits, '-', '.' and '_' only",
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WorkspaceName {
    type Error = WsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<WorkspaceName> for String {
    fn from(name: WorkspaceName) -> Self {
        name.0
    }
}

/// Name of a released workspace in the trash namespace: `owner-name-generation`.
///
/// The generation is the decimal epoch suffix after the last `-`. Without a
/// known owner, the owner is everything up to the first `-`; user names may
/// contain `-` themselves, so lookups on behalf of a user go through
/// [`TrashName::parse_for`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrashName {
    owner: String,
    name: String,
    generation: i64,
}

impl TrashName {
    /// Parse a trash name; malformed input is rejected before any filesystem access.
    pub fn parse(raw: &str) -> Result<Self, WsError> {
        check_charset(raw)?;
        let (owner, rest) = raw
            .split_once('-')
            .ok_or_else(|| WsError::invalid_name(raw, "expected the form owner-name-timestamp"))?;
        Self::from_parts(raw, owner, rest)
    }

    /// Parse a trash name known to belong to `owner`, which may contain `-`.
    pub fn parse_for(raw: &str, owner: &str) -> Result<Self, WsError> {
        check_charset(raw)?;
        let rest = raw
            .strip_prefix(owner)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| WsError::invalid_name(raw, format!("not a workspace of '{owner}'")))?;
        Self::from_parts(raw, owner, rest)
    }

    fn from_parts(raw: &str, owner: &str, rest: &str) -> Result<Self, WsError> {
        let malformed = |reason: &str| WsError::invalid_name(raw, reason);

        let (name, stamp) = rest
            .rsplit_once('-')
            .ok_or_else(|| malformed("expected the form owner-name-timestamp"))?;

        if owner.is_empty() || name.is_empty() {
            return Err(malformed("expected the form owner-name-timestamp"));
        }
        if stamp.is_empty() || !stamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed("timestamp suffix must be numeric"));
        }
        let generation = stamp
            .parse()
            .map_err(|_| malformed("timestamp suffix out of range"))?;

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            generation,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> i64 {
        self.generation
    }
}

fn check_charset(raw: &str) -> Result<(), WsError> {
    if !raw.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        || !raw.chars().all(is_name_char)
    {
        return Err(WsError::invalid_name(
            raw,
            "use letters, digits, '-', '.' and '_' only",
        ));
    }
    Ok(())
}

impl fmt::Display for TrashName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.owner, self.name, self.generation)
    }
}
