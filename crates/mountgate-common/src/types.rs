//! Domain primitive types used across the mountgate workspace.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_HOSTNAME_LEN, MODE_READ_ONLY, MODE_READ_WRITE};
use crate::error::{MountgateError, Result};

/// Name of the guest whose mount tree is being built.
///
/// The hostname is compared byte-for-byte against the first column of the
/// access list and is interpolated into runtime paths, so it must be a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Validates and wraps a hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, at least
    /// [`MAX_HOSTNAME_LEN`] bytes long, or contains `/` or NUL.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("hostname is empty".to_string())
        } else if name.len() >= MAX_HOSTNAME_LEN {
            Some(format!(
                "hostname is {} bytes, limit is {}",
                name.len(),
                MAX_HOSTNAME_LEN - 1
            ))
        } else if name.contains('/') {
            Some(format!("hostname {name:?} contains '/'"))
        } else if name.contains('\0') {
            Some("hostname contains a NUL byte".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(MountgateError::InvalidHostname { reason }),
            None => Ok(Self(name)),
        }
    }

    /// Returns the hostname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the raw bytes used for matching access-list records.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for Hostname {
    type Error = MountgateError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// `ro`: bind, then remount read-only.
    ReadOnly,
    /// `rw`: plain bind.
    ReadWrite,
}

impl AccessMode {
    /// Parses the exact `ro` / `rw` tokens of the access list.
    #[must_use]
    pub fn from_token(token: &[u8]) -> Option<Self> {
        [Self::ReadOnly, Self::ReadWrite]
            .into_iter()
            .find(|mode| mode.token().as_bytes() == token)
    }

    /// The access-list token for this mode.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::ReadOnly => MODE_READ_ONLY,
            Self::ReadWrite => MODE_READ_WRITE,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One validated, hostname-matched bind-mount directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRule {
    /// Host this rule was declared for.
    pub hostname: Hostname,
    /// Absolute path exported to the host.
    pub source: PathBuf,
    /// Path relative to the mount root where `source` appears.
    pub destination: PathBuf,
    /// Whether the bind is remounted read-only.
    pub read_only: bool,
}

impl MountRule {
    /// Returns the access mode of this rule.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        if self.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        }
    }
}

impl fmt::Display for MountRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} ({})",
            self.hostname,
            self.source.display(),
            self.destination.display(),
            self.mode()
        )
    }
}

/// Ordered rules for a single host, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<MountRule>);

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a rule, preserving insertion order.
    pub fn push(&mut self, rule: MountRule) {
        self.0.push(rule);
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the rules in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, MountRule> {
        self.0.iter()
    }

    /// Destinations of every rule, in order.
    pub fn destinations(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(|r| r.destination.as_path())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a MountRule;
    type IntoIter = std::slice::Iter<'a, MountRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for RuleSet {
    type Item = MountRule;
    type IntoIter = std::vec::IntoIter<MountRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<MountRule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = MountRule>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
