//! [`HostSystem`] that records calls instead of performing them.
//!
//! Used for `--dry-run` plans and for asserting the order of operations in
//! tests. Privilege changes are simulated so the protocol's own checks
//! still run.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mountgate_common::error::{MountgateError, Result};

use super::{DirOutcome, HostSystem, MountRequest, SysCall};

type FailurePredicate = Box<dyn Fn(&SysCall) -> bool>;

/// Recording, side-effect free system.
pub struct RecordingSystem {
    real_uid: u32,
    effective_uid: Cell<u32>,
    cwd: RefCell<PathBuf>,
    existing: RefCell<HashSet<PathBuf>>,
    calls: RefCell<Vec<SysCall>>,
    fail_when: Option<FailurePredicate>,
}

impl RecordingSystem {
    /// Simulates a process with the given real and effective uids whose
    /// working directory is `cwd`.
    #[must_use]
    pub fn new(real_uid: u32, effective_uid: u32, cwd: impl Into<PathBuf>) -> Self {
        Self {
            real_uid,
            effective_uid: Cell::new(effective_uid),
            cwd: RefCell::new(cwd.into()),
            existing: RefCell::new(HashSet::new()),
            calls: RefCell::new(Vec::new()),
            fail_when: None,
        }
    }

    /// Makes every call matching `predicate` fail with `EPERM`.
    /// Failed calls are not recorded.
    #[must_use]
    pub fn failing_when(mut self, predicate: impl Fn(&SysCall) -> bool + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Marks `path` as already present, so `make_dir` reports `EEXIST`.
    #[must_use]
    pub fn with_existing(self, path: impl Into<PathBuf>) -> Self {
        let _ = self.existing.borrow_mut().insert(path.into());
        self
    }

    /// Calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SysCall> {
        self.calls.borrow().clone()
    }

    fn issue(&self, call: SysCall) -> Result<()> {
        if self.fail_when.as_ref().is_some_and(|fail| fail(&call)) {
            return Err(MountgateError::syscall(
                call.to_string(),
                std::io::Error::from_raw_os_error(nix::libc::EPERM),
            ));
        }
        tracing::debug!(call = %call, "recorded");
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl HostSystem for RecordingSystem {
    fn real_uid(&self) -> u32 {
        self.real_uid
    }

    fn effective_uid(&self) -> u32 {
        self.effective_uid.get()
    }

    fn set_effective_uid(&self, uid: u32) -> Result<()> {
        self.issue(SysCall::SetEffectiveUid(uid))?;
        self.effective_uid.set(uid);
        Ok(())
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.cwd.borrow().clone())
    }

    fn change_dir(&self, path: &Path) -> Result<()> {
        self.issue(SysCall::ChangeDir(path.to_path_buf()))?;
        let joined = self.cwd.borrow().join(path);
        *self.cwd.borrow_mut() = joined;
        Ok(())
    }

    fn make_dir(&self, path: &Path, mode: u32) -> Result<DirOutcome> {
        let resolved = self.cwd.borrow().join(path);
        if self.existing.borrow().contains(&resolved) {
            return Ok(DirOutcome::AlreadyExists);
        }
        self.issue(SysCall::MakeDir {
            path: path.to_path_buf(),
            mode,
        })?;
        let _ = self.existing.borrow_mut().insert(resolved);
        Ok(DirOutcome::Created)
    }

    fn unshare_mount_namespace(&self) -> Result<()> {
        self.issue(SysCall::UnshareMountNamespace)
    }

    fn mount(&self, request: &MountRequest) -> Result<()> {
        self.issue(SysCall::Mount(request.clone()))
    }
}
