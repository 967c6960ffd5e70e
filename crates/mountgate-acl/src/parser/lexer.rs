//! Delimiter tokenization of raw access-list bytes using `nom`.
//!
//! Fields are borrowed views into the input buffer, so the buffer must
//! outlive every field taken from it; the `'a` lifetime on [`Fields`] and
//! [`split_fields`] enforces that.
//!
//! Splitting rules:
//! - a run of consecutive delimiters is a single boundary;
//! - a leading delimiter yields exactly one empty leading field;
//! - trailing delimiters never yield a trailing empty field;
//! - an empty input yields no fields.

use mountgate_common::error::{MountgateError, Result};
use nom::IResult;
use nom::bytes::complete::{take_till, take_while};

/// Terminator byte of the legacy on-disk format; never a valid delimiter.
pub const SENTINEL: u8 = b'\0';

fn field(input: &[u8], delim: u8) -> IResult<&[u8], &[u8]> {
    take_till(|b: u8| b == delim)(input)
}

fn delimiter_run(input: &[u8], delim: u8) -> IResult<&[u8], &[u8]> {
    take_while(|b: u8| b == delim)(input)
}

/// Iterator over the delimiter-separated fields of a byte buffer.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    rest: &'a [u8],
    delim: u8,
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let Ok((rest, value)) = field(self.rest, self.delim) else {
            return None;
        };
        let Ok((rest, _)) = delimiter_run(rest, self.delim) else {
            return None;
        };
        self.rest = rest;
        Some(value)
    }
}

/// Returns an iterator over the fields of `input` separated by `delim`.
///
/// # Errors
///
/// Returns an error if `delim` is the NUL [`SENTINEL`].
pub fn fields(input: &[u8], delim: u8) -> Result<Fields<'_>> {
    if delim == SENTINEL {
        return Err(MountgateError::Config {
            message: "tokenizer delimiter must not be NUL".into(),
        });
    }
    Ok(Fields { rest: input, delim })
}

/// Writes up to `out.len()` fields of `input` into `out` and returns the
/// total number of fields, which may exceed `out.len()`.
///
/// Callers detect truncation by comparing the return value with the
/// capacity. Pass an empty `out` to count fields only.
///
/// # Errors
///
/// Returns an error if `delim` is the NUL [`SENTINEL`].
pub fn split_fields<'a>(input: &'a [u8], delim: u8, out: &mut [&'a [u8]]) -> Result<usize> {
    let mut count = 0;
    for value in fields(input, delim)? {
        if let Some(slot) = out.get_mut(count) {
            *slot = value;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    fn collect(input: &[u8], delim: u8) -> Vec<String> {
        fields(input, delim)
            .expect("valid delimiter")
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    #[test]
    fn n_delimiters_yield_n_plus_one_fields() {
        let input = b"vm1\tro\t/pool/Music\tMusic";
        let mut out: [&[u8]; 4] = [b"".as_slice(); 4];
        let count = split_fields(input, b'\t', &mut out).expect("tokenize");
        assert_eq!(count, 4);
        assert_eq!(out[0], b"vm1");
        assert_eq!(out[1], b"ro");
        assert_eq!(out[2], b"/pool/Music");
        assert_eq!(out[3], b"Music");
    }

    #[test]
    fn delimiter_runs_collapse() {
        assert_eq!(collect(b"a\t\t\tb\t\tc", b'\t'), ["a", "b", "c"]);
    }

    #[test]
    fn leading_delimiter_yields_one_empty_field() {
        assert_eq!(collect(b"//usr/lib", b'/'), ["", "usr", "lib"]);
    }

    #[test]
    fn trailing_delimiters_are_dropped() {
        assert_eq!(collect(b"a/b//", b'/'), ["a", "b"]);
    }

    #[test]
    fn empty_input_has_no_fields() {
        assert_eq!(split_fields(b"", b'\t', &mut []).expect("tokenize"), 0);
    }

    #[test]
    fn lone_delimiter_is_one_empty_field() {
        assert_eq!(collect(b"/", b'/'), [""]);
    }

    #[test]
    fn truncation_reports_true_count() {
        let mut out: [&[u8]; 2] = [b"untouched".as_slice(); 2];
        let count = split_fields(b"a b c d e", b' ', &mut out).expect("tokenize");
        assert_eq!(count, 5);
        assert_eq!(out[0], b"a");
        assert_eq!(out[1], b"b");
    }

    #[test]
    fn zero_capacity_counts_only() {
        assert_eq!(split_fields(b"x/y/z", b'/', &mut []).expect("tokenize"), 3);
    }

    #[test]
    fn nul_delimiter_is_rejected() {
        assert!(fields(b"abc", SENTINEL).is_err());
        assert!(split_fields(b"abc", SENTINEL, &mut []).is_err());
    }
}
