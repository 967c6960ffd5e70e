//! Recursive directory creation (`mkdir -p`).
//!
//! Segments are enumerated with the access-list tokenizer split on `/`. A
//! leading empty segment marks an absolute path. Each growing prefix is
//! created left to right with mode `0770`; `EEXIST` counts as success.
//!
//! An existing entry that is not a directory is also accepted here; the
//! following `chdir` or mount on that path reports the failure instead.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use mountgate_acl::parser::lexer;
use mountgate_common::constants::DIR_MODE;
use mountgate_common::error::{MountgateError, Result};

use crate::system::{DirOutcome, HostSystem};

const SEPARATOR: u8 = b'/';

/// Creates `path` and every missing parent with mode `0770`.
///
/// Relative paths resolve against the current working directory.
///
/// # Errors
///
/// Returns an error if `path` is empty or if any `mkdir(2)` fails with
/// anything other than `EEXIST`.
pub fn ensure_dir_all<S: HostSystem + ?Sized>(sys: &S, path: &Path) -> Result<()> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.is_empty() {
        return Err(MountgateError::Config {
            message: "cannot create a directory with an empty path".into(),
        });
    }

    let mut segments = lexer::fields(bytes, SEPARATOR)?.peekable();
    let mut prefix = if segments.next_if(|s| s.is_empty()).is_some() {
        PathBuf::from("/")
    } else {
        PathBuf::new()
    };

    let mut created = 0_usize;
    for segment in segments {
        prefix.push(OsStr::from_bytes(segment));
        if sys.make_dir(&prefix, DIR_MODE)? == DirOutcome::Created {
            created += 1;
        }
    }
    tracing::debug!(path = %path.display(), created, "directory ensured");
    Ok(())
}
