//! Mount namespace isolation.
//!
//! Gives the launcher its own mount table so the bind mounts are visible
//! only to it and to the server it executes.

use std::path::Path;

use mountgate_common::error::Result;
use nix::mount::MsFlags;

use crate::system::{HostSystem, MountRequest};

/// Propagation applied recursively to `/` after `unshare`.
///
/// Slave keeps receiving host mount events (so a newly attached pool still
/// shows up) while nothing mounted here leaks back out.
pub const ROOT_PROPAGATION: MsFlags = MsFlags::MS_REC.union(MsFlags::MS_SLAVE);

/// Unshares the mount namespace and detaches `/` from shared propagation.
///
/// Must run with full privilege.
///
/// # Errors
///
/// Returns an error if `unshare(CLONE_NEWNS)` or the propagation change
/// fails.
pub fn enter_private_mount_namespace<S: HostSystem + ?Sized>(sys: &S) -> Result<()> {
    sys.unshare_mount_namespace()?;
    sys.mount(&MountRequest::propagation(Path::new("/"), ROOT_PROPAGATION))?;
    tracing::info!("entered private mount namespace");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::system::{RecordingSystem, SysCall};

    #[test]
    fn unshare_precedes_propagation_change() {
        let sys = RecordingSystem::new(0, 0, "/");
        enter_private_mount_namespace(&sys).expect("isolate");
        assert_eq!(
            sys.calls(),
            vec![
                SysCall::UnshareMountNamespace,
                SysCall::Mount(MountRequest {
                    source: None,
                    target: "/".into(),
                    flags: MsFlags::MS_REC | MsFlags::MS_SLAVE,
                }),
            ]
        );
    }

    #[test]
    fn propagation_failure_is_fatal() {
        let sys = RecordingSystem::new(0, 0, "/")
            .failing_when(|call| matches!(call, SysCall::Mount(_)));
        assert!(enter_private_mount_namespace(&sys).is_err());
    }
}
