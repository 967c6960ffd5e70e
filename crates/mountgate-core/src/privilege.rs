//! Scoped effective-uid lowering.
//!
//! The launcher runs setuid-root but creates every directory as the
//! invoking user, so a hostile access list cannot plant root-owned
//! directories. [`LoweredPrivilege`] drops the effective uid to the real uid
//! and puts it back either explicitly through [`LoweredPrivilege::restore`]
//! or, on early return, when it is dropped.

use mountgate_common::error::Result;

use crate::system::HostSystem;

/// Guard holding the effective uid lowered to the real uid.
#[must_use = "privilege is restored as soon as the guard is dropped"]
pub struct LoweredPrivilege<'s, S: HostSystem + ?Sized> {
    sys: &'s S,
    saved_euid: u32,
    armed: bool,
}

impl<'s, S: HostSystem + ?Sized> LoweredPrivilege<'s, S> {
    /// Lowers the effective uid to the real uid.
    ///
    /// # Errors
    ///
    /// Returns an error if `seteuid(2)` fails.
    pub fn lower(sys: &'s S) -> Result<Self> {
        let saved_euid = sys.effective_uid();
        let real_uid = sys.real_uid();
        sys.set_effective_uid(real_uid)?;
        tracing::info!(from = saved_euid, to = real_uid, "effective uid lowered");
        Ok(Self {
            sys,
            saved_euid,
            armed: true,
        })
    }

    /// Effective uid that will be restored.
    pub const fn saved_euid(&self) -> u32 {
        self.saved_euid
    }

    /// Restores the saved effective uid and disarms the guard.
    ///
    /// # Errors
    ///
    /// Returns an error if `seteuid(2)` fails.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.sys.set_effective_uid(self.saved_euid)?;
        tracing::info!(uid = self.saved_euid, "effective uid restored");
        Ok(())
    }
}

impl<S: HostSystem + ?Sized> Drop for LoweredPrivilege<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.sys.set_effective_uid(self.saved_euid) {
            tracing::error!(uid = self.saved_euid, error = %e, "failed to restore effective uid");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::system::{RecordingSystem, SysCall};

    #[test]
    fn lower_then_restore() {
        let sys = RecordingSystem::new(1000, 0, "/");
        let guard = LoweredPrivilege::lower(&sys).expect("lower");
        assert_eq!(sys.effective_uid(), 1000);
        assert_eq!(guard.saved_euid(), 0);
        guard.restore().expect("restore");
        assert_eq!(sys.effective_uid(), 0);
        assert_eq!(
            sys.calls(),
            vec![SysCall::SetEffectiveUid(1000), SysCall::SetEffectiveUid(0)]
        );
    }

    fn fail_while_lowered(sys: &RecordingSystem) -> Result<()> {
        let _guard = LoweredPrivilege::lower(sys)?;
        sys.unshare_mount_namespace()?;
        Err(mountgate_common::error::MountgateError::Config {
            message: "bail out".into(),
        })
    }

    #[test]
    fn drop_restores_on_early_exit() {
        let sys = RecordingSystem::new(1000, 0, "/");
        assert!(fail_while_lowered(&sys).is_err());
        assert_eq!(sys.effective_uid(), 0);
        assert_eq!(sys.calls().last(), Some(&SysCall::SetEffectiveUid(0)));
    }

    #[test]
    fn explicit_restore_is_not_repeated_on_drop() {
        let sys = RecordingSystem::new(1000, 0, "/");
        LoweredPrivilege::lower(&sys)
            .expect("lower")
            .restore()
            .expect("restore");
        assert_eq!(sys.calls().len(), 2);
    }

    #[test]
    fn failed_lowering_leaves_uid_untouched() {
        let sys = RecordingSystem::new(1000, 0, "/")
            .failing_when(|call| matches!(call, SysCall::SetEffectiveUid(_)));
        assert!(LoweredPrivilege::lower(&sys).is_err());
        assert_eq!(sys.effective_uid(), 0);
    }
}
