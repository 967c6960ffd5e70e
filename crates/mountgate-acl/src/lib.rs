//! # mountgate-acl
//!
//! The access list decides which host sees which directories, read-only or
//! read-write. This crate turns the on-disk `fs.list` into a [`RuleSet`]:
//!
//! - **Document**: opening the file and refusing it unless it is a regular
//!   file owned by root, group-owned by the invoking user, mode `0640`, and
//!   free of NUL bytes.
//! - **Parser**: line splitting, tab tokenization, and per-record
//!   validation. Bad records are dropped with a line-numbered diagnostic;
//!   they never abort the run.
//!
//! [`RuleSet`]: mountgate_common::types::RuleSet

pub mod document;
pub mod parser;

pub use document::{ConfigDocument, FilePolicy};
pub use parser::{Diagnostic, DiagnosticKind, ParsedRules, parse_rules};
