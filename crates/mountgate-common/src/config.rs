//! Launcher configuration and runtime path construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_SERVER_BINARY, MOUNT_ROOT_SUFFIX, PATH_MAX, RUNTIME_SUBDIR,
    SOCKET_SUFFIX, USER_RUNTIME_BASE,
};
use crate::error::{MountgateError, Result};
use crate::types::Hostname;

/// Root configuration for one launcher invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Access-list file to load.
    pub config_file: PathBuf,
    /// Directory holding sockets and mount roots. `None` selects
    /// `/run/user/<uid>/mountgate` for the invoking user.
    pub runtime_dir: Option<PathBuf>,
    /// Filesystem server executed after the mounts are in place.
    pub server_binary: PathBuf,
    /// Group allowed to connect to the server socket. `None` selects the
    /// invoking user's primary group.
    pub socket_group: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            runtime_dir: None,
            server_binary: PathBuf::from(DEFAULT_SERVER_BINARY),
            socket_group: None,
        }
    }
}

impl LauncherConfig {
    /// Resolves the runtime directory for the given real uid.
    #[must_use]
    pub fn runtime_dir_for(&self, uid: u32) -> PathBuf {
        self.runtime_dir.clone().unwrap_or_else(|| {
            Path::new(USER_RUNTIME_BASE)
                .join(uid.to_string())
                .join(RUNTIME_SUBDIR)
        })
    }

    /// Builds the socket and mount-root paths for `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if either path reaches `PATH_MAX`.
    pub fn runtime_paths(&self, host: &Hostname, uid: u32) -> Result<RuntimePaths> {
        RuntimePaths::new(&self.runtime_dir_for(uid), host)
    }
}

/// Paths handed to the filesystem server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePaths {
    /// Unix socket the server listens on.
    pub socket: PathBuf,
    /// Directory the rule destinations are created under and mounted onto.
    pub mount_root: PathBuf,
}

impl RuntimePaths {
    /// Derives `<dir>/<host>.virtfs.sock` and `<dir>/<host>.mount.d`.
    ///
    /// # Errors
    ///
    /// Returns an error if either path reaches `PATH_MAX`.
    pub fn new(runtime_dir: &Path, host: &Hostname) -> Result<Self> {
        let socket = runtime_dir.join(format!("{host}{SOCKET_SUFFIX}"));
        let mount_root = runtime_dir.join(format!("{host}{MOUNT_ROOT_SUFFIX}"));
        check_path_len("socket", &socket)?;
        check_path_len("mount", &mount_root)?;
        Ok(Self { socket, mount_root })
    }
}

fn check_path_len(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().len() >= PATH_MAX {
        return Err(MountgateError::Config {
            message: format!("{what} path too long ({} bytes)", path.as_os_str().len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_runtime_dir_is_per_user() {
        let config = LauncherConfig::default();
        assert_eq!(
            config.runtime_dir_for(1000),
            PathBuf::from("/run/user/1000/mountgate")
        );
    }

    #[test]
    fn runtime_paths_embed_hostname() {
        let host = Hostname::new("vm1").expect("valid hostname");
        let paths = LauncherConfig::default()
            .runtime_paths(&host, 1000)
            .expect("paths fit");
        assert_eq!(
            paths.socket,
            PathBuf::from("/run/user/1000/mountgate/vm1.virtfs.sock")
        );
        assert_eq!(
            paths.mount_root,
            PathBuf::from("/run/user/1000/mountgate/vm1.mount.d")
        );
    }

    #[test]
    fn explicit_runtime_dir_wins() {
        let config = LauncherConfig {
            runtime_dir: Some("/tmp/mg".into()),
            ..LauncherConfig::default()
        };
        let host = Hostname::new("vm2").expect("valid hostname");
        let paths = config.runtime_paths(&host, 0).expect("paths fit");
        assert_eq!(paths.mount_root, PathBuf::from("/tmp/mg/vm2.mount.d"));
    }

    #[test]
    fn overlong_runtime_dir_is_rejected() {
        let dir = PathBuf::from(format!("/{}", "d".repeat(PATH_MAX)));
        let host = Hostname::new("vm1").expect("valid hostname");
        let err = RuntimePaths::new(&dir, &host).unwrap_err();
        assert!(err.to_string().contains("path too long"));
    }
}
