//! Command-line definition and dispatch.

pub mod launch;
pub mod plan;
pub mod policy;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mountgate_acl::{ConfigDocument, FilePolicy, parse_rules};
use mountgate_common::config::LauncherConfig;
use mountgate_common::constants::{DEFAULT_CONFIG_FILE, DEFAULT_SERVER_BINARY};
use mountgate_common::error::MountgateError;
use mountgate_common::types::Hostname;

fn parse_hostname(value: &str) -> Result<Hostname, MountgateError> {
    Hostname::new(value)
}

/// mountgate: export a host's directories to virtiofsd through a private
/// bind-mount tree.
#[derive(Parser, Debug)]
#[command(name = "mountgate", version, about, long_about = None)]
pub struct Cli {
    /// Host to build the mount tree for (first column of the access list).
    #[arg(value_parser = parse_hostname)]
    pub hostname: Hostname,

    /// Access-list file.
    #[arg(long, env = "MOUNTGATE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Directory for the server socket and mount root [default: /run/user/<uid>/mountgate].
    #[arg(long, env = "MOUNTGATE_RUNTIME_DIR")]
    pub runtime_dir: Option<PathBuf>,

    /// Filesystem server to execute once the mounts are in place (root only).
    #[arg(long, default_value = DEFAULT_SERVER_BINARY)]
    pub server: PathBuf,

    /// Group allowed to connect to the server socket; must be one of your
    /// groups [default: your primary group].
    #[arg(long)]
    pub socket_group: Option<String>,

    /// Parse the access list and print the planned calls as JSON without
    /// changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "MOUNTGATE_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// Collects the launcher settings from the parsed arguments.
    pub fn launcher_config(&self) -> LauncherConfig {
        LauncherConfig {
            config_file: self.config.clone(),
            runtime_dir: self.runtime_dir.clone(),
            server_binary: self.server.clone(),
            socket_group: self.socket_group.clone(),
        }
    }
}

/// Loads the access list and either prints the plan or launches.
///
/// # Errors
///
/// Returns an error for any fatal condition: a refused override, unsafe or
/// unreadable access list, overlong runtime paths, failed preflight, any
/// failed syscall, or a failed exec.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.launcher_config();
    policy::authorize(&config, &policy::Caller::current()?, policy::group_gid)?;
    let uid = nix::unistd::getuid().as_raw();
    let paths = config.runtime_paths(&cli.hostname, uid)?;

    let doc = ConfigDocument::load(&config.config_file, &FilePolicy::for_invoking_user())
        .with_context(|| format!("loading {}", config.config_file.display()))?;
    let parsed = parse_rules(&doc, &cli.hostname)?;
    if parsed.rules.is_empty() {
        tracing::warn!(host = %cli.hostname, "no rules for host, mount root will be empty");
    }

    if cli.dry_run {
        return plan::print(&config, &cli.hostname, &paths, parsed);
    }
    launch::run(&config, &paths, parsed.rules)
}
