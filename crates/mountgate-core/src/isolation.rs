//! The ordered privilege/namespace/mount protocol.
//!
//! ```text
//! Setup ──raise_privilege──▶ PrivilegeRaised ──isolate_namespace──▶
//!     NamespaceIsolated ──apply_mounts──▶ MountsApplied
//! ```
//!
//! [`Isolator::prepare`] is the only way to obtain an isolator. It lowers
//! the effective uid, records the working directory, creates the mount root
//! and every rule destination, and leaves the process inside the mount
//! root. Later phases are methods on later states only, so directories
//! cannot be created after the privilege raise and mounts cannot be issued
//! before the namespace is private.
//!
//! Failures are not rolled back. Mounts made inside the private namespace
//! disappear with the process.

use std::fmt;
use std::path::{Path, PathBuf};

use mountgate_common::error::{MountgateError, Result};
use mountgate_common::types::RuleSet;

use crate::filesystem::dirs::ensure_dir_all;
use crate::filesystem::mount::bind_rule;
use crate::namespace::mount::enter_private_mount_namespace;
use crate::privilege::LoweredPrivilege;
use crate::system::HostSystem;

/// Phase of the protocol, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Directories prepared at lowered privilege.
    Setup,
    /// Effective uid back to root.
    PrivilegeRaised,
    /// Inside a private mount namespace.
    NamespaceIsolated,
    /// Every rule mounted and the working directory restored.
    MountsApplied,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::PrivilegeRaised => write!(f, "privilege-raised"),
            Self::NamespaceIsolated => write!(f, "namespace-isolated"),
            Self::MountsApplied => write!(f, "mounts-applied"),
        }
    }
}

/// Setup state: holds the privilege guard.
pub struct Setup<'s, S: HostSystem + ?Sized> {
    privilege: LoweredPrivilege<'s, S>,
}

/// Effective uid restored to root; still in the original namespace.
#[derive(Debug)]
pub struct PrivilegeRaised;

/// Private mount namespace entered.
#[derive(Debug)]
pub struct NamespaceIsolated;

/// Mount tree complete.
#[derive(Debug)]
pub struct MountsApplied;

/// Drives one host's mount tree through the protocol.
pub struct Isolator<'s, S: HostSystem + ?Sized, State> {
    sys: &'s S,
    mount_root: PathBuf,
    saved_cwd: PathBuf,
    rules: RuleSet,
    state: State,
}

impl<'s, S: HostSystem + ?Sized, State> Isolator<'s, S, State> {
    /// Mount root directory.
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Rules being applied.
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn advance<Next>(self, state: Next, phase: Phase) -> Isolator<'s, S, Next> {
        tracing::info!(
            phase = %phase,
            root = %self.mount_root().display(),
            rules = self.rules().len(),
            "isolation phase reached"
        );
        Isolator {
            sys: self.sys,
            mount_root: self.mount_root,
            saved_cwd: self.saved_cwd,
            rules: self.rules,
            state,
        }
    }
}

impl<'s, S: HostSystem + ?Sized> Isolator<'s, S, Setup<'s, S>> {
    /// Runs the unprivileged phases: lower the effective uid, record the
    /// working directory, create and enter `mount_root`, and create every
    /// rule destination beneath it.
    ///
    /// If any step fails the effective uid is restored before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the privilege drop, a directory creation, or the
    /// `chdir` fails.
    pub fn prepare(sys: &'s S, mount_root: &Path, rules: RuleSet) -> Result<Self> {
        let privilege = LoweredPrivilege::lower(sys)?;
        let saved_cwd = sys.current_dir()?;
        tracing::debug!(
            saved_euid = privilege.saved_euid(),
            cwd = %saved_cwd.display(),
            "preparing mount directories"
        );

        ensure_dir_all(sys, mount_root)?;
        sys.change_dir(mount_root)?;

        for destination in rules.destinations() {
            ensure_dir_all(sys, destination)?;
        }

        tracing::info!(
            phase = %Phase::Setup,
            root = %mount_root.display(),
            rules = rules.len(),
            "mount directories prepared"
        );
        Ok(Self {
            sys,
            mount_root: mount_root.to_path_buf(),
            saved_cwd,
            rules,
            state: Setup { privilege },
        })
    }

    /// Restores the saved effective uid, which must be root.
    ///
    /// # Errors
    ///
    /// Returns an error if `seteuid(2)` fails or the restored effective uid
    /// is not 0.
    pub fn raise_privilege(self) -> Result<Isolator<'s, S, PrivilegeRaised>> {
        let Self {
            sys,
            mount_root,
            saved_cwd,
            rules,
            state,
        } = self;
        state.privilege.restore()?;
        let euid = sys.effective_uid();
        if euid != 0 {
            return Err(MountgateError::PermissionDenied {
                message: format!("effective uid is {euid} after restore, mounting requires 0"),
            });
        }
        let next = Isolator {
            sys,
            mount_root,
            saved_cwd,
            rules,
            state: (),
        };
        Ok(next.advance(PrivilegeRaised, Phase::PrivilegeRaised))
    }
}

impl<'s, S: HostSystem + ?Sized> Isolator<'s, S, PrivilegeRaised> {
    /// Enters a private mount namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `unshare` or the propagation change fails.
    pub fn isolate_namespace(self) -> Result<Isolator<'s, S, NamespaceIsolated>> {
        enter_private_mount_namespace(self.sys)?;
        Ok(self.advance(NamespaceIsolated, Phase::NamespaceIsolated))
    }
}

impl<'s, S: HostSystem + ?Sized> Isolator<'s, S, NamespaceIsolated> {
    /// Mounts every rule in order, then returns to the working directory
    /// recorded during setup.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failing mount or if the final `chdir`
    /// fails.
    pub fn apply_mounts(self) -> Result<Isolator<'s, S, MountsApplied>> {
        for rule in &self.rules {
            bind_rule(self.sys, rule)?;
        }
        self.sys.change_dir(&self.saved_cwd)?;
        Ok(self.advance(MountsApplied, Phase::MountsApplied))
    }
}

impl<S: HostSystem + ?Sized> Isolator<'_, S, MountsApplied> {
    /// Finishes the protocol.
    pub fn into_tree(self) -> MountedTree {
        MountedTree {
            mount_root: self.mount_root,
            rules: self.rules,
        }
    }
}

/// A populated mount root inside the private namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedTree {
    /// Directory the rules were mounted under.
    pub mount_root: PathBuf,
    /// Rules that were applied, in order.
    pub rules: RuleSet,
}

/// Runs the whole protocol for `rules` under `mount_root`.
///
/// # Errors
///
/// Returns the first error of any phase.
pub fn build_mount_tree<S: HostSystem + ?Sized>(
    sys: &S,
    mount_root: &Path,
    rules: RuleSet,
) -> Result<MountedTree> {
    Ok(Isolator::prepare(sys, mount_root, rules)?
        .raise_privilege()?
        .isolate_namespace()?
        .apply_mounts()?
        .into_tree())
}
