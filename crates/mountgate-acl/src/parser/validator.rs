//! Per-record checks applied to a tokenized access-list line.
//!
//! The checks run in a fixed order: field count, mode token, hostname
//! filter, then path shape. A record for another host is skipped before its
//! paths are inspected, so path problems are only reported for the
//! requested host.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use mountgate_common::constants::RECORD_FIELDS;
use mountgate_common::types::{AccessMode, Hostname, MountRule};

use super::DiagnosticKind;

/// Result of validating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The record becomes a rule.
    Accepted(MountRule),
    /// The record is well formed but belongs to another host.
    OtherHost,
    /// The record is dropped with a diagnostic.
    Rejected(DiagnosticKind),
}

/// Validates a record of `count` fields whose first fields are in `fields`.
#[must_use]
pub fn validate_record(count: usize, fields: &[&[u8]; RECORD_FIELDS], host: &Hostname) -> Verdict {
    if count != RECORD_FIELDS {
        return Verdict::Rejected(DiagnosticKind::FieldCount { found: count });
    }
    let [record_host, mode, source, destination] = *fields;

    let Some(mode) = AccessMode::from_token(mode) else {
        return Verdict::Rejected(DiagnosticKind::UnknownMode {
            mode: String::from_utf8_lossy(mode).into_owned(),
        });
    };

    if record_host != host.as_bytes() {
        return Verdict::OtherHost;
    }

    if let Err(reason) = check_paths(source, destination) {
        return Verdict::Rejected(DiagnosticKind::PathShape { reason });
    }

    Verdict::Accepted(MountRule {
        hostname: host.clone(),
        source: to_path(source),
        destination: to_path(destination),
        read_only: mode == AccessMode::ReadOnly,
    })
}

fn check_paths(source: &[u8], destination: &[u8]) -> Result<(), String> {
    if source.first() != Some(&b'/') {
        return Err("source must be an absolute path".into());
    }
    if destination.is_empty() || destination.first() == Some(&b'/') {
        return Err("destination must be a relative path".into());
    }
    if destination.split(|&b| b == b'/').any(|c| c == b"..") {
        return Err("destination must not contain '..'".into());
    }
    Ok(())
}

fn to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(bytes))
}
