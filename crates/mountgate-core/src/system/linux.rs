//! [`HostSystem`] backed by real syscalls through `nix`.

use std::path::{Path, PathBuf};

use mountgate_common::error::{MountgateError, Result};
use nix::errno::Errno;
use nix::mount::mount;
use nix::sched::{CloneFlags, unshare};
use nix::sys::stat::Mode;
use nix::unistd::{self, Uid};

use super::{DirOutcome, HostSystem, MountRequest, SysCall};

/// The running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSystem;

impl HostSystem for LinuxSystem {
    fn real_uid(&self) -> u32 {
        unistd::getuid().as_raw()
    }

    fn effective_uid(&self) -> u32 {
        unistd::geteuid().as_raw()
    }

    fn set_effective_uid(&self, uid: u32) -> Result<()> {
        unistd::seteuid(Uid::from_raw(uid))
            .map_err(|e| MountgateError::syscall(SysCall::SetEffectiveUid(uid).to_string(), e))?;
        tracing::debug!(uid, "seteuid");
        Ok(())
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().map_err(|source| MountgateError::Io {
            path: PathBuf::from("."),
            source,
        })
    }

    fn change_dir(&self, path: &Path) -> Result<()> {
        unistd::chdir(path).map_err(|e| {
            MountgateError::syscall(SysCall::ChangeDir(path.to_path_buf()).to_string(), e)
        })?;
        tracing::debug!(path = %path.display(), "chdir");
        Ok(())
    }

    fn make_dir(&self, path: &Path, mode: u32) -> Result<DirOutcome> {
        match unistd::mkdir(path, Mode::from_bits_truncate(mode)) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), mode = %format!("{mode:04o}"), "mkdir");
                Ok(DirOutcome::Created)
            }
            Err(Errno::EEXIST) => Ok(DirOutcome::AlreadyExists),
            Err(e) => Err(MountgateError::syscall(
                SysCall::MakeDir {
                    path: path.to_path_buf(),
                    mode,
                }
                .to_string(),
                e,
            )),
        }
    }

    fn unshare_mount_namespace(&self) -> Result<()> {
        unshare(CloneFlags::CLONE_NEWNS).map_err(|e| {
            MountgateError::syscall(SysCall::UnshareMountNamespace.to_string(), e)
        })?;
        tracing::debug!("mount namespace created");
        Ok(())
    }

    fn mount(&self, request: &MountRequest) -> Result<()> {
        mount(
            request.source.as_deref(),
            &request.target,
            None::<&str>,
            request.flags,
            None::<&str>,
        )
        .map_err(|e| MountgateError::syscall(request.to_string(), e))?;
        tracing::debug!(call = %request, "mount");
        Ok(())
    }
}
