//! `--dry-run`: show what a launch would do.
//!
//! The protocol runs against a recording system that simulates a setuid
//! process. Directories already present on disk are seeded into the
//! recorder, so the printed call list is the sequence a real launch would
//! issue right now.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use mountgate_acl::{Diagnostic, ParsedRules};
use mountgate_common::config::{LauncherConfig, RuntimePaths};
use mountgate_common::types::{Hostname, RuleSet};
use mountgate_core::isolation::build_mount_tree;
use mountgate_core::system::RecordingSystem;
use serde::Serialize;

use crate::handoff::{self, ServerCommand};

/// Everything a launch would do for one host.
#[derive(Debug, Serialize)]
pub struct Plan {
    /// Requested host.
    pub host: Hostname,
    /// Access list that was read.
    pub config_file: PathBuf,
    /// Server socket path.
    pub socket: PathBuf,
    /// Mount root.
    pub mount_root: PathBuf,
    /// Accepted rules in order.
    pub rules: RuleSet,
    /// Lines that were dropped or flagged.
    pub diagnostics: Vec<Diagnostic>,
    /// Syscalls in issue order.
    pub calls: Vec<String>,
    /// Server command line.
    pub server: Vec<String>,
}

/// Directories on the way to the mount root and to every rule destination
/// that already exist, resolved against `cwd`.
pub fn existing_dirs(cwd: &Path, mount_root: &Path, rules: &RuleSet) -> Vec<PathBuf> {
    let root = cwd.join(mount_root);
    let mut dirs: Vec<PathBuf> = root.ancestors().map(Path::to_path_buf).collect();
    for destination in rules.destinations() {
        dirs.extend(
            root.join(destination)
                .ancestors()
                .take_while(|p| p.starts_with(&root) && *p != root)
                .map(Path::to_path_buf),
        );
    }
    dirs.retain(|dir| dir.is_dir());
    dirs
}

/// Simulates the launch for `host` on `sys`, which should model a setuid
/// process (effective uid 0).
///
/// # Errors
///
/// Returns an error if the simulated protocol fails or the socket group
/// cannot be resolved.
pub fn build(
    config: &LauncherConfig,
    host: &Hostname,
    paths: &RuntimePaths,
    parsed: ParsedRules,
    sys: &RecordingSystem,
) -> anyhow::Result<Plan> {
    let tree = build_mount_tree(sys, &paths.mount_root, parsed.rules)?;
    let group = handoff::socket_group(config)?;
    let server = ServerCommand::new(&config.server_binary, &group, paths);

    Ok(Plan {
        host: host.clone(),
        config_file: config.config_file.clone(),
        socket: paths.socket.clone(),
        mount_root: tree.mount_root,
        rules: tree.rules,
        diagnostics: parsed.diagnostics,
        calls: sys.calls().iter().map(ToString::to_string).collect(),
        server: server.display_argv(),
    })
}

/// Builds the plan for the current process and prints it as JSON on stdout.
///
/// # Errors
///
/// Returns an error if the plan cannot be built or written.
pub fn print(
    config: &LauncherConfig,
    host: &Hostname,
    paths: &RuntimePaths,
    parsed: ParsedRules,
) -> anyhow::Result<()> {
    let uid = nix::unistd::getuid().as_raw();
    let cwd = std::env::current_dir().context("reading working directory")?;
    let sys = existing_dirs(&cwd, &paths.mount_root, &parsed.rules)
        .into_iter()
        .fold(RecordingSystem::new(uid, 0, &cwd), |sys, dir| {
            sys.with_existing(dir)
        });
    let plan = build(config, host, paths, parsed, &sys)?;

    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &plan).context("writing plan")?;
    writeln!(out).context("writing plan")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use mountgate_acl::{ConfigDocument, parse_rules};

    use super::*;

    const DOCUMENT: &str = "\
vm3\tro\t/pool/web\tservices/nginx
vm3\trw\t/pool/db\tservices/db
vm3\tzz\t/pool/x\tx
vm2\tro\t/pool/db\tmysql
";

    fn plan_for(host: &str) -> Plan {
        let host = Hostname::new(host).expect("valid hostname");
        let config = LauncherConfig {
            runtime_dir: Some("/run/user/1000/mountgate".into()),
            socket_group: Some("kvm".into()),
            ..LauncherConfig::default()
        };
        let paths = config.runtime_paths(&host, 1000).expect("paths");
        let doc = ConfigDocument::from_bytes(DOCUMENT).expect("valid document");
        let parsed = parse_rules(&doc, &host).expect("parse");
        let sys = RecordingSystem::new(1000, 0, "/home/user");
        build(&config, &host, &paths, parsed, &sys).expect("plan")
    }

    #[test]
    fn plan_lists_calls_in_protocol_order() {
        let plan = plan_for("vm3");
        assert_eq!(plan.calls.first().map(String::as_str), Some("seteuid(1000)"));
        let unshare = plan
            .calls
            .iter()
            .position(|c| c == "unshare(CLONE_NEWNS)")
            .expect("unshare planned");
        assert!(plan.calls[..unshare].iter().all(|c| !c.starts_with("mount(")));
        assert!(plan.calls[unshare..].iter().all(|c| !c.starts_with("mkdir(")));
        assert_eq!(plan.calls.last().map(String::as_str), Some(r#"chdir("/home/user")"#));
    }

    #[test]
    fn plan_carries_rules_and_diagnostics() {
        let plan = plan_for("vm3");
        assert_eq!(plan.rules.len(), 2);
        assert_eq!(plan.diagnostics.len(), 1);
        assert_eq!(plan.diagnostics[0].line, 3);
        assert_eq!(
            plan.server[4],
            "source=/run/user/1000/mountgate/vm3.mount.d/"
        );
    }

    #[test]
    fn existing_directories_are_left_out_of_the_plan() {
        let runtime = tempfile::tempdir().expect("tempdir");
        let host = Hostname::new("vm3").expect("valid hostname");
        let config = LauncherConfig {
            runtime_dir: Some(runtime.path().to_path_buf()),
            socket_group: Some("kvm".into()),
            ..LauncherConfig::default()
        };
        let paths = config.runtime_paths(&host, 1000).expect("paths");
        std::fs::create_dir_all(paths.mount_root.join("services")).expect("mkdir");

        let doc = ConfigDocument::from_bytes(DOCUMENT).expect("valid document");
        let parsed = parse_rules(&doc, &host).expect("parse");
        let cwd = Path::new("/");
        let existing = existing_dirs(cwd, &paths.mount_root, &parsed.rules);
        assert!(existing.contains(&paths.mount_root));
        assert!(existing.contains(&paths.mount_root.join("services")));

        let sys = existing
            .into_iter()
            .fold(RecordingSystem::new(1000, 0, cwd), |sys, dir| {
                sys.with_existing(dir)
            });
        let plan = build(&config, &host, &paths, parsed, &sys).expect("plan");
        let mkdirs: Vec<_> = plan.calls.iter().filter(|c| c.starts_with("mkdir(")).collect();
        assert_eq!(
            mkdirs,
            vec![r#"mkdir("services/nginx", 0770)"#, r#"mkdir("services/db", 0770)"#]
        );
    }

    #[test]
    fn plan_serializes_to_json() {
        let json = serde_json::to_value(plan_for("vm2")).expect("serialize");
        assert_eq!(json["host"], "vm2");
        assert_eq!(json["rules"][0]["destination"], "mysql");
        assert_eq!(json["diagnostics"][0]["kind"], "unknown_mode");
    }
}
