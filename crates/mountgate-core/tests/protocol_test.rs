//! Ordering tests for the isolation protocol.
//!
//! Every run goes through `RecordingSystem`, so the exact syscall sequence
//! can be checked without root:
//! 1. privilege is lowered before any directory is created
//! 2. every rule directory exists before privilege is raised
//! 3. every mount happens after `unshare` and the propagation change
//! 4. read-only rules cost two mounts, read-write rules one

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use mountgate_acl::{ConfigDocument, parse_rules};
use mountgate_common::error::MountgateError;
use mountgate_common::types::{Hostname, RuleSet};
use mountgate_core::isolation::{Isolator, build_mount_tree};
use mountgate_core::system::{HostSystem, RecordingSystem, SysCall};
use nix::mount::MsFlags;

const USER: u32 = 1000;
const ROOT: &str = "/run/user/1000/mountgate/vm3.mount.d";

const DOCUMENT: &str = "\
vm3\tro\t/pool/web\tservices/nginx
vm3\trw\t/pool/db\tservices/db
vm2\tro\t/pool/db\tmysql
";

fn vm3_rules() -> RuleSet {
    let doc = ConfigDocument::from_bytes(DOCUMENT).expect("valid document");
    let host = Hostname::new("vm3").expect("valid hostname");
    parse_rules(&doc, &host).expect("parse").rules
}

fn setuid_process() -> RecordingSystem {
    RecordingSystem::new(USER, 0, "/home/user")
}

fn position(calls: &[SysCall], pred: impl Fn(&SysCall) -> bool) -> Vec<usize> {
    calls
        .iter()
        .enumerate()
        .filter(|(_, call)| pred(call))
        .map(|(i, _)| i)
        .collect()
}

// ── Ordering ─────────────────────────────────────────────────────────

#[test]
fn directories_before_unshare_and_mounts_after() {
    let sys = setuid_process();
    let tree = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");
    assert_eq!(tree.rules.len(), 2);

    let calls = sys.calls();
    let unshare = position(&calls, |c| matches!(c, SysCall::UnshareMountNamespace));
    assert_eq!(unshare.len(), 1);
    let unshare = unshare[0];

    let mkdirs = position(&calls, |c| matches!(c, SysCall::MakeDir { .. }));
    let mounts = position(&calls, |c| matches!(c, SysCall::Mount(_)));
    assert!(!mkdirs.is_empty());
    assert!(mkdirs.iter().all(|&i| i < unshare));
    assert!(mounts.iter().all(|&i| i > unshare));
}

#[test]
fn directories_are_created_while_lowered() {
    let sys = setuid_process();
    let _ = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");

    let calls = sys.calls();
    assert_eq!(calls[0], SysCall::SetEffectiveUid(USER));
    let raise = position(&calls, |c| *c == SysCall::SetEffectiveUid(0));
    assert_eq!(raise.len(), 1);
    let mkdirs = position(&calls, |c| matches!(c, SysCall::MakeDir { .. }));
    assert!(mkdirs.iter().all(|&i| i > 0 && i < raise[0]));
}

#[test]
fn rule_directories_are_relative_to_mount_root() {
    let sys = setuid_process();
    let _ = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");

    let calls = sys.calls();
    let chdir_root = calls
        .iter()
        .position(|c| *c == SysCall::ChangeDir(PathBuf::from(ROOT)))
        .expect("chdir into mount root");
    let relative: Vec<_> = calls[chdir_root..]
        .iter()
        .filter_map(|c| match c {
            SysCall::MakeDir { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        relative,
        vec![
            PathBuf::from("services"),
            PathBuf::from("services/nginx"),
            PathBuf::from("services/db"),
        ]
    );
}

#[test]
fn propagation_is_changed_before_any_bind() {
    let sys = setuid_process();
    let _ = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");

    let mounts: Vec<_> = sys
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            SysCall::Mount(request) => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(mounts[0].target, PathBuf::from("/"));
    assert_eq!(mounts[0].flags, MsFlags::MS_REC | MsFlags::MS_SLAVE);
}

#[test]
fn working_directory_is_restored_last() {
    let sys = setuid_process();
    let _ = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");
    assert_eq!(
        sys.calls().last(),
        Some(&SysCall::ChangeDir(PathBuf::from("/home/user")))
    );
}

// ── Mount counts ─────────────────────────────────────────────────────

#[test]
fn read_only_rules_mount_twice_read_write_once() {
    let sys = setuid_process();
    let _ = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).expect("protocol");

    let targets: Vec<_> = sys
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            SysCall::Mount(request) if request.target != Path::new("/") => Some(request.target),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            PathBuf::from("services/nginx"),
            PathBuf::from("services/nginx"),
            PathBuf::from("services/db"),
        ]
    );
}

#[test]
fn empty_rule_set_still_isolates() {
    let sys = setuid_process();
    let tree = build_mount_tree(&sys, Path::new(ROOT), RuleSet::new()).expect("protocol");
    assert!(tree.rules.is_empty());
    assert!(sys.calls().contains(&SysCall::UnshareMountNamespace));
}

#[test]
fn prepared_isolator_reports_root_and_rules_at_lowered_privilege() {
    let sys = setuid_process();
    let isolator = Isolator::prepare(&sys, Path::new(ROOT), vm3_rules()).expect("prepare");
    assert_eq!(isolator.mount_root(), Path::new(ROOT));
    assert_eq!(isolator.rules().len(), 2);
    assert_eq!(sys.effective_uid(), USER);

    let raised = isolator.raise_privilege().expect("raise");
    assert_eq!(raised.mount_root(), Path::new(ROOT));
    assert_eq!(sys.effective_uid(), 0);
}

// ── Failure paths ────────────────────────────────────────────────────

#[test]
fn failed_rule_directory_restores_privilege_and_stops() {
    let sys = setuid_process().failing_when(
        |c| matches!(c, SysCall::MakeDir { path, .. } if path == Path::new("services/db")),
    );
    let result = Isolator::prepare(&sys, Path::new(ROOT), vm3_rules());
    assert!(result.is_err());
    assert_eq!(sys.effective_uid(), 0);
    assert!(!sys.calls().contains(&SysCall::UnshareMountNamespace));
}

#[test]
fn non_setuid_run_cannot_raise() {
    let sys = RecordingSystem::new(USER, USER, "/home/user");
    let err = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).unwrap_err();
    assert!(matches!(err, MountgateError::PermissionDenied { .. }));
    assert!(!sys.calls().contains(&SysCall::UnshareMountNamespace));
}

#[test]
fn mount_failure_is_terminal() {
    let sys = setuid_process().failing_when(|c| {
        matches!(c, SysCall::Mount(r) if r.source.as_deref() == Some(Path::new("/pool/web")))
    });
    let err = build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).unwrap_err();
    assert!(err.to_string().contains("/pool/web"), "{err}");
    let binds = sys
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SysCall::Mount(r) if r.source.is_some()))
        .count();
    assert_eq!(binds, 0);
}

#[test]
fn unshare_failure_prevents_mounts() {
    let sys = setuid_process().failing_when(|c| matches!(c, SysCall::UnshareMountNamespace));
    assert!(build_mount_tree(&sys, Path::new(ROOT), vm3_rules()).is_err());
    assert!(!sys.calls().iter().any(|c| matches!(c, SysCall::Mount(_))));
}
