//! Handoff to the filesystem server.
//!
//! Once the mount tree is in place the launcher replaces itself with the
//! server, which inherits the private mount namespace.

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use mountgate_common::config::{LauncherConfig, RuntimePaths};

/// Resolves the socket group: the configured name, or the invoking user's
/// primary group.
///
/// # Errors
///
/// Returns an error if the primary group has no entry in the group database.
pub fn socket_group(config: &LauncherConfig) -> anyhow::Result<String> {
    if let Some(group) = &config.socket_group {
        return Ok(group.clone());
    }
    let gid = nix::unistd::getgid();
    nix::unistd::Group::from_gid(gid)
        .with_context(|| format!("looking up group {gid}"))?
        .map(|g| g.name)
        .ok_or_else(|| anyhow!("no group entry for gid {gid}"))
}

fn joined(prefix: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(value);
    arg
}

/// Command line of the filesystem server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    program: PathBuf,
    argv: Vec<OsString>,
}

impl ServerCommand {
    /// Builds `<name> --socket-group=<g> --socket-path=<sock> -o source=<root>/`.
    pub fn new(program: &Path, socket_group: &str, paths: &RuntimePaths) -> Self {
        let name = program
            .file_name()
            .unwrap_or(program.as_os_str())
            .to_os_string();
        let mut source = paths.mount_root.clone().into_os_string();
        source.push("/");
        let argv = vec![
            name,
            OsString::from(format!("--socket-group={socket_group}")),
            joined("--socket-path=", paths.socket.as_os_str()),
            OsString::from("-o"),
            joined("source=", &source),
        ];
        Self {
            program: program.to_path_buf(),
            argv,
        }
    }

    /// Arguments including `argv[0]`, lossily decoded for display.
    pub fn display_argv(&self) -> Vec<String> {
        self.argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Replaces the current process with the server.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument contains a NUL byte or `execv(2)`
    /// fails; on success this never returns.
    pub fn exec(self) -> anyhow::Result<Infallible> {
        let program = CString::new(self.program.as_os_str().as_bytes())
            .context("server path contains a NUL byte")?;
        let argv = self
            .argv
            .into_iter()
            .map(|a| CString::new(a.into_vec()))
            .collect::<Result<Vec<_>, _>>()
            .context("server argument contains a NUL byte")?;
        tracing::info!(program = %self.program.display(), "executing filesystem server");
        nix::unistd::execv(&program, &argv)
            .with_context(|| format!("execv {}", self.program.display()))
    }
}
