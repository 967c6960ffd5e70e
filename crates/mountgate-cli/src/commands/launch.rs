//! Real launch: build the mount tree, then exec the server.

use anyhow::bail;
use mountgate_common::config::{LauncherConfig, RuntimePaths};
use mountgate_common::types::RuleSet;
use mountgate_core::isolation::build_mount_tree;
use mountgate_core::system::{HostSystem, LinuxSystem};

use crate::handoff::{self, ServerCommand};

/// Refuses to start unless the process runs with effective uid 0.
///
/// # Errors
///
/// Returns an error when the binary is not running setuid root.
pub fn preflight<S: HostSystem + ?Sized>(sys: &S) -> anyhow::Result<()> {
    let euid = sys.effective_uid();
    if euid != 0 {
        bail!(
            "effective uid is {euid}, not 0: mountgate must be installed setuid root \
             (use --dry-run to inspect the plan)"
        );
    }
    Ok(())
}

/// Builds the tree under `paths.mount_root` and replaces the process with the
/// filesystem server.
///
/// # Errors
///
/// Returns an error if preflight fails, any step of the mount protocol fails,
/// or the server cannot be executed. Never returns `Ok`.
pub fn run(config: &LauncherConfig, paths: &RuntimePaths, rules: RuleSet) -> anyhow::Result<()> {
    let sys = LinuxSystem;
    preflight(&sys)?;
    let group = handoff::socket_group(config)?;

    let tree = build_mount_tree(&sys, &paths.mount_root, rules)?;
    tracing::info!(
        root = %tree.mount_root.display(),
        mounts = tree.rules.len(),
        "mount tree ready"
    );

    match ServerCommand::new(&config.server_binary, &group, paths).exec()? {}
}
