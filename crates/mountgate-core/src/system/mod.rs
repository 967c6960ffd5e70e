//! Syscall abstraction for the mount protocol.
//!
//! Every privilege change, directory creation, namespace operation, and
//! mount the launcher performs goes through [`HostSystem`]. The protocol
//! code is written against the trait so the exact call sequence can be
//! recorded and inspected without privileges.

pub mod linux;
pub mod recording;

use std::fmt;
use std::path::{Path, PathBuf};

use mountgate_common::error::Result;
use nix::mount::MsFlags;

pub use self::linux::LinuxSystem;
pub use self::recording::RecordingSystem;

/// Outcome of a single `mkdir(2)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    /// The directory was created.
    Created,
    /// Something already existed at the path (`EEXIST`).
    AlreadyExists,
}

/// Arguments of one `mount(2)` call without filesystem type or data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Mount source, absent for remounts and propagation changes.
    pub source: Option<PathBuf>,
    /// Mount target.
    pub target: PathBuf,
    /// Mount flags.
    pub flags: MsFlags,
}

impl MountRequest {
    /// Bind `source` onto `target`.
    #[must_use]
    pub fn bind(source: &Path, target: &Path) -> Self {
        Self {
            source: Some(source.to_path_buf()),
            target: target.to_path_buf(),
            flags: MsFlags::MS_BIND,
        }
    }

    /// Remount an existing bind at `target` read-only.
    #[must_use]
    pub fn remount_read_only(target: &Path) -> Self {
        Self {
            source: None,
            target: target.to_path_buf(),
            flags: MsFlags::MS_REMOUNT | MsFlags::MS_BIND | MsFlags::MS_RDONLY,
        }
    }

    /// Change the propagation type of the mount at `target`.
    #[must_use]
    pub fn propagation(target: &Path, flags: MsFlags) -> Self {
        Self {
            source: None,
            target: target.to_path_buf(),
            flags,
        }
    }
}

fn flag_names(flags: MsFlags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl fmt::Display for MountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .source
            .as_ref()
            .map(|s| format!("{:?}", s.display().to_string()))
            .unwrap_or_default();
        write!(
            f,
            "mount({source},{:?},,{},)",
            self.target.display().to_string(),
            flag_names(self.flags)
        )
    }
}

/// A system call issued through [`HostSystem`], as recorded for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysCall {
    /// `seteuid(uid)`.
    SetEffectiveUid(u32),
    /// `chdir(path)`.
    ChangeDir(PathBuf),
    /// `mkdir(path, mode)`.
    MakeDir {
        /// Directory path.
        path: PathBuf,
        /// Permission bits.
        mode: u32,
    },
    /// `unshare(CLONE_NEWNS)`.
    UnshareMountNamespace,
    /// `mount(...)`.
    Mount(MountRequest),
}

impl fmt::Display for SysCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetEffectiveUid(uid) => write!(f, "seteuid({uid})"),
            Self::ChangeDir(path) => write!(f, "chdir({:?})", path.display().to_string()),
            Self::MakeDir { path, mode } => {
                write!(f, "mkdir({:?}, {mode:04o})", path.display().to_string())
            }
            Self::UnshareMountNamespace => write!(f, "unshare(CLONE_NEWNS)"),
            Self::Mount(request) => write!(f, "{request}"),
        }
    }
}

/// Process-level operations the mount protocol depends on.
///
/// Failures are returned as `MountgateError::Syscall` naming the call.
/// `make_dir` reports `EEXIST` as [`DirOutcome::AlreadyExists`] rather than
/// as an error.
pub trait HostSystem {
    /// Real uid of the invoking user.
    fn real_uid(&self) -> u32;

    /// Current effective uid.
    fn effective_uid(&self) -> u32;

    /// Sets the effective uid.
    ///
    /// # Errors
    ///
    /// Returns an error if `seteuid(2)` fails.
    fn set_effective_uid(&self, uid: u32) -> Result<()>;

    /// Current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be determined.
    fn current_dir(&self) -> Result<PathBuf>;

    /// Changes the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `chdir(2)` fails.
    fn change_dir(&self, path: &Path) -> Result<()>;

    /// Creates one directory with `mode` (subject to the umask).
    ///
    /// # Errors
    ///
    /// Returns an error if `mkdir(2)` fails with anything but `EEXIST`.
    fn make_dir(&self, path: &Path, mode: u32) -> Result<DirOutcome>;

    /// Moves the calling process into a new mount namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `unshare(CLONE_NEWNS)` fails.
    fn unshare_mount_namespace(&self) -> Result<()>;

    /// Issues one `mount(2)` call.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount(&self, request: &MountRequest) -> Result<()>;
}
