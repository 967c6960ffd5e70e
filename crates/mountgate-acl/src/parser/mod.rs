//! Access-list parser.
//!
//! The document is split into lines on `\n`, each record line is split on
//! tabs into exactly four fields (`host`, `mode`, `source`, `destination`),
//! and each record is validated. A bad record only drops that record and is
//! reported as a [`Diagnostic`] carrying its 1-based line number.

pub mod lexer;
pub mod validator;

use std::fmt;

use mountgate_common::constants::RECORD_FIELDS;
use mountgate_common::error::Result;
use mountgate_common::types::{Hostname, RuleSet};
use serde::Serialize;

use self::validator::Verdict;
use crate::document::ConfigDocument;

const LINE_DELIM: u8 = b'\n';
const FIELD_DELIM: u8 = b'\t';
const COMMENT: u8 = b'#';

/// Why a line was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The last line has no terminating newline. The line is still parsed.
    MissingFinalNewline,
    /// The record does not have exactly four fields.
    FieldCount {
        /// Number of fields found.
        found: usize,
    },
    /// The mode column is neither `ro` nor `rw`.
    UnknownMode {
        /// The offending token (lossily decoded).
        mode: String,
    },
    /// The source is not absolute or the destination is not relative.
    PathShape {
        /// Which path rule was broken.
        reason: String,
    },
}

/// How loudly a diagnostic is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Formatting problem; the line is skipped.
    Warning,
    /// Unsafe path for the requested host; the line is skipped.
    Error,
}

/// A recoverable problem found on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong.
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Severity of this diagnostic.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self.kind {
            DiagnosticKind::PathShape { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    fn emit(&self) {
        match self.severity() {
            Severity::Warning => tracing::warn!(line = self.line, "{self}"),
            Severity::Error => tracing::error!(line = self.line, "{self}"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::MissingFinalNewline => {
                write!(f, "line {}: config file missing final newline", self.line)
            }
            DiagnosticKind::FieldCount { found } => write!(
                f,
                "line {}: malformed, found {found} fields, expected {RECORD_FIELDS}",
                self.line
            ),
            DiagnosticKind::UnknownMode { mode } => write!(
                f,
                "line {}: malformed mode {mode:?}, expected \"ro\" or \"rw\"",
                self.line
            ),
            DiagnosticKind::PathShape { reason } => {
                write!(f, "line {}: {reason}", self.line)
            }
        }
    }
}

/// Rules accepted for one host plus every diagnostic raised on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRules {
    /// Accepted rules in document order.
    pub rules: RuleSet,
    /// Dropped or flagged lines in document order.
    pub diagnostics: Vec<Diagnostic>,
}

/// One line of the document without its terminator.
struct Line<'a> {
    number: usize,
    text: &'a [u8],
    terminated: bool,
}

/// Splits a buffer into lines, keeping empty lines so numbering stays exact.
struct Lines<'a> {
    rest: &'a [u8],
    number: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        self.number += 1;
        let (text, rest, terminated) = match self.rest.iter().position(|&b| b == LINE_DELIM) {
            Some(end) => (&self.rest[..end], &self.rest[end + 1..], true),
            None => (self.rest, &self.rest[self.rest.len()..], false),
        };
        self.rest = rest;
        Some(Line {
            number: self.number,
            text,
            terminated,
        })
    }
}

const fn lines(data: &[u8]) -> Lines<'_> {
    Lines {
        rest: data,
        number: 0,
    }
}

/// Parses `doc` and keeps the records declared for `host`.
///
/// # Errors
///
/// Returns an error only if tokenization itself fails; malformed records
/// are reported in [`ParsedRules::diagnostics`] instead.
pub fn parse_rules(doc: &ConfigDocument, host: &Hostname) -> Result<ParsedRules> {
    tracing::debug!(host = %host, "parsing access list");
    let mut parsed = ParsedRules::default();
    let mut report = |diagnostic: Diagnostic| {
        diagnostic.emit();
        parsed.diagnostics.push(diagnostic);
    };

    let mut accepted = RuleSet::new();
    for line in lines(doc.as_bytes()) {
        if !line.terminated {
            report(Diagnostic {
                line: line.number,
                kind: DiagnosticKind::MissingFinalNewline,
            });
        }

        if line.text.is_empty() || line.text[0] == COMMENT {
            continue;
        }

        let mut fields: [&[u8]; RECORD_FIELDS] = [&[][..]; RECORD_FIELDS];
        let count = lexer::split_fields(line.text, FIELD_DELIM, &mut fields)?;

        match validator::validate_record(count, &fields, host) {
            Verdict::Accepted(rule) => {
                tracing::debug!(line = line.number, rule = %rule, "accepted rule");
                accepted.push(rule);
            }
            Verdict::OtherHost => {}
            Verdict::Rejected(kind) => report(Diagnostic {
                line: line.number,
                kind,
            }),
        }
    }

    parsed.rules = accepted;
    tracing::info!(
        host = %host,
        rules = parsed.rules.len(),
        dropped = parsed.diagnostics.len(),
        "access list parsed"
    );
    Ok(parsed)
}
