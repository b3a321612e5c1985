//! Result rendering for the calling task runner.
//!
//! Success is the serialised [`BuildOutcome`]; failure is
//! `{"failed": true, "msg": "..."}`. Both are single JSON documents meant
//! for stdout.

use crate::error::Result;
use crate::outcome::BuildOutcome;
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;

#[derive(Serialize)]
struct Failure<'a> {
    failed: bool,
    msg: &'a str,
}

/// Render a successful outcome as JSON.
///
/// # Errors
///
/// Returns [`crate::error::ForgeError::Report`] if serialisation fails.
pub fn render_outcome(outcome: &BuildOutcome) -> Result<String> {
    Ok(serde_json::to_string(outcome)?)
}

/// Render a failure as JSON.
///
/// # Examples
///
/// ```
/// use nginx_forge::output::render_failure;
///
/// assert_eq!(
///     render_failure(&"gpg: BAD signature"),
///     r#"{"failed":true,"msg":"gpg: BAD signature"}"#
/// );
/// ```
#[must_use]
pub fn render_failure(error: &dyn Display) -> String {
    let msg = error.to_string();
    serde_json::to_string(&Failure {
        failed: true,
        msg: &msg,
    })
    .unwrap_or_else(|_| r#"{"failed":true,"msg":"unrenderable error"}"#.to_owned())
}

/// Write one line, ignoring write failures.
pub fn write_line(out: &mut dyn Write, message: impl Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort; the stream may already be closed.
    }
}
