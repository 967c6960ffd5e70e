//! System-wide constants and default paths.

/// Default access-list file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fs.list";

/// Default filesystem server binary.
pub const DEFAULT_SERVER_BINARY: &str = "/usr/lib/qemu/virtiofsd";

/// Base of the per-user runtime directories.
pub const USER_RUNTIME_BASE: &str = "/run/user";

/// Subdirectory of the per-user runtime directory that holds sockets and mount roots.
pub const RUNTIME_SUBDIR: &str = "mountgate";

/// Suffix appended to the hostname to form the server socket file name.
pub const SOCKET_SUFFIX: &str = ".virtfs.sock";

/// Suffix appended to the hostname to form the mount-root directory name.
pub const MOUNT_ROOT_SUFFIX: &str = ".mount.d";

/// Hostnames must be strictly shorter than this many bytes.
pub const MAX_HOSTNAME_LEN: usize = 1024;

/// Linux `PATH_MAX`; runtime paths must be strictly shorter.
pub const PATH_MAX: usize = 4096;

/// Mode for every directory created while preparing the mount tree.
pub const DIR_MODE: u32 = 0o770;

/// Exact permission bits required on the access-list file.
pub const CONFIG_FILE_MODE: u32 = 0o640;

/// Uid that must own the access-list file.
pub const CONFIG_FILE_OWNER: u32 = 0;

/// Mode token for a read-only rule.
pub const MODE_READ_ONLY: &str = "ro";

/// Mode token for a read-write rule.
pub const MODE_READ_WRITE: &str = "rw";

/// Number of tab-separated columns in an access-list record.
pub const RECORD_FIELDS: usize = 4;
