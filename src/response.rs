//! POP3 response decoding
//!
//! A reply starts with one status line whose first token is `+OK` or
//! `-ERR` (compared case-insensitively). `LIST` and a successful `RETR`
//! continue with a body terminated by a line holding a single `.`.
//!
//! A body line that is exactly `.` always terminates the body; servers
//! must byte-stuff such lines as `..`, which [`unstuff`] undoes.

use crate::error::{Error, Result};

pub const OK_TOKEN: &str = "+OK";
pub const ERR_TOKEN: &str = "-ERR";
pub const TERMINATOR: &str = ".";

/// One decoded status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ok: bool,
    /// Everything after the status token, trimmed.
    pub payload: String,
}

impl Envelope {
    /// Decode a status line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the first token is neither
    /// `+OK` nor `-ERR`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (token, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));

        let ok = if token.eq_ignore_ascii_case(OK_TOKEN) {
            true
        } else if token.eq_ignore_ascii_case(ERR_TOKEN) {
            false
        } else {
            return Err(Error::Protocol(format!(
                "unexpected status line: {}",
                truncate(line, 64)
            )));
        };

        Ok(Self {
            ok,
            payload: rest.trim().to_string(),
        })
    }
}

/// Parse a `number size` pair as carried by STAT replies and LIST lines.
///
/// # Errors
///
/// Returns [`Error::Protocol`] unless the text is exactly two
/// whitespace-separated non-negative integers.
pub fn parse_count_pair(text: &str) -> Result<(u32, u64)> {
    let mut fields = text.split_whitespace();
    let pair: Option<(u32, u64)> = match (fields.next(), fields.next(), fields.next()) {
        (Some(first), Some(second), None) => first.parse().ok().zip(second.parse().ok()),
        _ => None,
    };
    pair.ok_or_else(|| Error::Protocol(format!("expected two integers, got: {}", truncate(text, 64))))
}

/// Whether a body line ends the multi-line block.
#[must_use]
pub fn is_terminator(line: &str) -> bool {
    line == TERMINATOR
}

/// Strip POP3 byte-stuffing (a leading `..` becomes `.`).
#[must_use]
pub fn unstuff(line: &str) -> &str {
    if line.starts_with("..") {
        &line[1..]
    } else {
        line
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
