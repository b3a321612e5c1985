//! Parser for the server's `-V` build report.
//!
//! The report is free-form text; only three fragments matter:
//!
//! ```text
//! library  := "--with-" NAME "=" PATH        (one whitespace-delimited token)
//! PATH     := { SEGMENT "/" } NAME "-" VERSION [ "/" ]
//! product  := "nginx version: nginx/" VERSION
//! VERSION  := non-empty run of non-whitespace characters
//! ```
//!
//! Each fragment must occur exactly once. Anything else means the binary is
//! not one this tool produced, or its output changed shape, and is reported
//! as a [`ProbeParseError`].

use crate::request::{AUXILIARY_LIBRARY, DEPENDENCY_LIBRARY, MAIN_BINARY, Versions};
use thiserror::Error;

/// Why a build report was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeParseError {
    /// The fragment does not appear at all.
    #[error("no `{fragment}` fragment in build report")]
    Missing {
        /// Fragment prefix that was searched for.
        fragment: String,
    },

    /// The fragment appears more than once, so the version is ambiguous.
    #[error("`{fragment}` appears {count} times in build report")]
    Ambiguous {
        /// Fragment prefix that was searched for.
        fragment: String,
        /// Number of occurrences.
        count: usize,
    },

    /// The fragment is present but its value does not follow the grammar.
    #[error("malformed `{fragment}` fragment: {text}")]
    Malformed {
        /// Fragment prefix that was matched.
        fragment: String,
        /// The offending text.
        text: String,
    },
}

/// Extract the version triple from a `-V` report.
///
/// # Errors
///
/// Returns [`ProbeParseError`] if any of the three fragments is missing,
/// repeated, or malformed.
///
/// # Examples
///
/// ```
/// use nginx_forge::probe::parser::parse_build_report;
///
/// let report = "configure arguments: --with-pcre=/x/pcre-8.34 \
///               --with-openssl=/y/openssl-1.0.1f nginx version: nginx/1.5.11";
/// let versions = parse_build_report(report)?;
/// assert_eq!(versions.pcre, "8.34");
/// assert_eq!(versions.openssl, "1.0.1f");
/// assert_eq!(versions.nginx, "1.5.11");
/// # Ok::<(), nginx_forge::probe::parser::ProbeParseError>(())
/// ```
pub fn parse_build_report(report: &str) -> Result<Versions, ProbeParseError> {
    Ok(Versions {
        nginx: product_version(report, MAIN_BINARY)?,
        openssl: library_version(report, DEPENDENCY_LIBRARY)?,
        pcre: library_version(report, AUXILIARY_LIBRARY)?,
    })
}

/// Version of `library` from its single `--with-<library>=` token.
fn library_version(report: &str, library: &str) -> Result<String, ProbeParseError> {
    let fragment = format!("--with-{library}=");
    let paths: Vec<&str> = report
        .split_whitespace()
        .filter_map(|token| token.strip_prefix(fragment.as_str()))
        .collect();

    let path = exactly_one(&paths, &fragment)?;
    let last_segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    last_segment
        .strip_prefix(library)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|version| !version.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ProbeParseError::Malformed {
            fragment,
            text: path.to_owned(),
        })
}

/// Version of the product from its single `<product> version: <product>/`
/// marker.
fn product_version(report: &str, product: &str) -> Result<String, ProbeParseError> {
    let fragment = format!("{product} version: {product}/");
    let tails: Vec<&str> = report
        .match_indices(fragment.as_str())
        .filter_map(|(start, _)| report.get(start + fragment.len()..))
        .collect();

    let tail = exactly_one(&tails, &fragment)?;
    let version = tail.split_whitespace().next().unwrap_or_default();
    if version.is_empty() || tail.starts_with(char::is_whitespace) {
        return Err(ProbeParseError::Malformed {
            fragment,
            text: tail.lines().next().unwrap_or_default().to_owned(),
        });
    }
    Ok(version.to_owned())
}

fn exactly_one<'a>(matches: &[&'a str], fragment: &str) -> Result<&'a str, ProbeParseError> {
    match matches {
        [single] => Ok(*single),
        [] => Err(ProbeParseError::Missing {
            fragment: fragment.to_owned(),
        }),
        several => Err(ProbeParseError::Ambiguous {
            fragment: fragment.to_owned(),
            count: several.len(),
        }),
    }
}
