//! Loading and validation of the access-list file.
//!
//! The file decides what a host may mount, so it is only trusted when root
//! owns it, its group is the invoking user's primary group, and its mode is
//! exactly `0640`. Content is kept as raw bytes; the parser never assumes
//! UTF-8.

use std::fs::{File, Metadata};
use std::io::Read;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use mountgate_common::constants::{CONFIG_FILE_MODE, CONFIG_FILE_OWNER};
use mountgate_common::error::{MountgateError, Result};

/// Ownership and permission requirements for the access-list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePolicy {
    /// Required owning uid.
    pub owner: u32,
    /// Required owning gid.
    pub group: u32,
    /// Required permission bits (`mode & 0o7777`).
    pub mode: u32,
}

impl FilePolicy {
    /// Policy for a launcher run by the current real user: root-owned,
    /// group-owned by the caller's real gid, mode `0640`.
    #[must_use]
    pub fn for_invoking_user() -> Self {
        Self {
            owner: CONFIG_FILE_OWNER,
            group: nix::unistd::getgid().as_raw(),
            mode: CONFIG_FILE_MODE,
        }
    }

    fn check(&self, path: &Path, meta: &Metadata) -> Result<()> {
        let reject = |reason: String| MountgateError::UnsafeConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        if !meta.file_type().is_file() {
            return Err(reject("not a regular file".into()));
        }
        if meta.uid() != self.owner {
            return Err(reject(format!(
                "owned by uid {}, required {}",
                meta.uid(),
                self.owner
            )));
        }
        if meta.gid() != self.group {
            return Err(reject(format!(
                "group is gid {}, required {}",
                meta.gid(),
                self.group
            )));
        }
        let mode = meta.mode() & 0o7777;
        if mode != self.mode {
            return Err(reject(format!(
                "permission {mode:03o}, required {:03o}",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Raw, validated access-list contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    data: Vec<u8>,
    origin: Option<PathBuf>,
}

impl ConfigDocument {
    /// Wraps in-memory contents after checking they are non-empty and
    /// contain no NUL byte.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is empty or contains a NUL byte.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(MountgateError::Config {
                message: "config file is empty".into(),
            });
        }
        if let Some(offset) = data.iter().position(|&b| b == b'\0') {
            return Err(MountgateError::Config {
                message: format!("config file contains a NUL byte at offset {offset}"),
            });
        }
        Ok(Self { data, origin: None })
    }

    /// Opens `path` without following a final symlink, checks it against
    /// `policy` on the open descriptor, and reads it to the end.
    ///
    /// The open is non-blocking so a FIFO at `path` is rejected by the
    /// policy check instead of stalling the launcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read, fails any
    /// policy check, is empty, or contains a NUL byte.
    pub fn load(path: &Path, policy: &FilePolicy) -> Result<Self> {
        let io_err = |source| MountgateError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::options()
            .read(true)
            .custom_flags(libc::O_NOFOLLOW | libc::O_NONBLOCK)
            .open(path)
            .map_err(io_err)?;
        let meta = file.metadata().map_err(io_err)?;
        policy.check(path, &meta)?;

        let mut data = Vec::with_capacity(usize::try_from(meta.len()).unwrap_or_default());
        let _ = file.read_to_end(&mut data).map_err(io_err)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "loaded config file");

        let mut doc = Self::from_bytes(data)?;
        doc.origin = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Raw contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// File the document was loaded from, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}
