//! Bind mounts for individual access-list rules.
//!
//! Linux cannot create a read-only bind in one call: `MS_RDONLY` is
//! ignored on the initial `MS_BIND`, so read-only rules take a second
//! `MS_REMOUNT | MS_BIND | MS_RDONLY` call on the destination.

use mountgate_common::error::Result;
use mountgate_common::types::MountRule;

use crate::system::{HostSystem, MountRequest};

/// Applies one rule: bind `source` onto `destination`, then remount
/// read-only if the rule asks for it.
///
/// The destination resolves against the current working directory, which
/// the isolation protocol has set to the mount root.
///
/// # Errors
///
/// Returns an error naming the source and destination if either mount
/// call fails.
pub fn bind_rule<S: HostSystem + ?Sized>(sys: &S, rule: &MountRule) -> Result<()> {
    sys.mount(&MountRequest::bind(&rule.source, &rule.destination))?;
    if rule.read_only {
        sys.mount(&MountRequest::remount_read_only(&rule.destination))?;
    }
    tracing::info!(
        source = %rule.source.display(),
        destination = %rule.destination.display(),
        mode = %rule.mode(),
        "bind mount applied"
    );
    Ok(())
}
