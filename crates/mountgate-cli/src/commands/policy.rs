//! Limits on what the invoking user may override.
//!
//! The launcher is setuid root and the server it executes keeps that
//! identity, so only the real root user may name a different server
//! binary. A socket group must be a group the caller already belongs to.

use std::path::Path;

use anyhow::{Context, bail};
use mountgate_common::config::LauncherConfig;
use mountgate_common::constants::DEFAULT_SERVER_BINARY;
use nix::unistd::{self, Group};

/// Real identity of the user who ran the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Real uid.
    pub uid: u32,
    /// Real gid followed by the supplementary groups.
    pub gids: Vec<u32>,
}

impl Caller {
    /// Reads the real uid, real gid and supplementary groups of this process.
    ///
    /// # Errors
    ///
    /// Returns an error if the supplementary group list cannot be read.
    pub fn current() -> anyhow::Result<Self> {
        let mut gids = vec![unistd::getgid().as_raw()];
        gids.extend(
            unistd::getgroups()
                .context("reading supplementary groups")?
                .into_iter()
                .map(|gid| gid.as_raw()),
        );
        Ok(Self {
            uid: unistd::getuid().as_raw(),
            gids,
        })
    }

    /// Whether the real user is root.
    pub const fn is_root(&self) -> bool {
        self.uid == 0
    }

    fn belongs_to(&self, gid: u32) -> bool {
        self.gids.contains(&gid)
    }
}

/// Looks up a group's gid in the group database.
///
/// # Errors
///
/// Returns an error if the group database cannot be read.
pub fn group_gid(name: &str) -> anyhow::Result<Option<u32>> {
    Ok(Group::from_name(name)
        .with_context(|| format!("looking up group {name}"))?
        .map(|group| group.gid.as_raw()))
}

/// Refuses overrides the caller is not entitled to.
///
/// `resolve_group` maps a group name to its gid.
///
/// # Errors
///
/// Returns an error if a non-root caller names a server other than the
/// default, or a socket group that is unknown or not one of theirs.
pub fn authorize<F>(config: &LauncherConfig, caller: &Caller, resolve_group: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> anyhow::Result<Option<u32>>,
{
    if caller.is_root() {
        return Ok(());
    }

    if config.server_binary != Path::new(DEFAULT_SERVER_BINARY) {
        bail!(
            "only root may choose the server binary, refusing {}",
            config.server_binary.display()
        );
    }

    if let Some(name) = &config.socket_group {
        let Some(gid) = resolve_group(name)? else {
            bail!("unknown socket group {name:?}");
        };
        if !caller.belongs_to(gid) {
            bail!("socket group {name:?} (gid {gid}) is not one of your groups");
        }
    }

    tracing::debug!(uid = caller.uid, "caller overrides authorized");
    Ok(())
}
