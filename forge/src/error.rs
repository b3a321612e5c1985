//! Error types for the nginx-forge build pipeline.
//!
//! Every variant is fatal to the run: nothing is retried and nothing is
//! downgraded to a warning. Variants raised by external tools carry the
//! tool's combined stdout and stderr so an operator can diagnose the failure
//! from the error alone.

use crate::fetch::download::DownloadError;
use crate::fetch::extraction::ExtractionError;
use crate::probe::parser::ProbeParseError;
use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while ensuring nginx is built.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The installed binary's self-report could not be parsed.
    #[error("cannot read build provenance of {binary}: {reason}\n{output}")]
    ProbeParse {
        /// Binary that was probed.
        binary: Utf8PathBuf,
        /// Why the report was rejected.
        reason: String,
        /// Combined output of the probe invocation.
        output: String,
    },

    /// A source archive or signature could not be downloaded.
    #[error("failed to fetch {file}: {source}")]
    Download {
        /// File name being fetched.
        file: String,
        /// The underlying transport failure.
        #[source]
        source: DownloadError,
    },

    /// A detached signature did not verify against the trusted keyring.
    #[error("signature verification failed for {archive}:\n{output}")]
    Authentication {
        /// Archive whose signature was rejected.
        archive: Utf8PathBuf,
        /// Combined output of the verification tool.
        output: String,
    },

    /// The trusted keyring is not where it was expected.
    #[error("trusted keyring not found at {path}")]
    TrustAnchorMissing {
        /// Expected keyring location.
        path: Utf8PathBuf,
    },

    /// A verified archive could not be unpacked.
    #[error("failed to extract {archive}: {source}")]
    Extraction {
        /// Archive being extracted.
        archive: Utf8PathBuf,
        /// The underlying extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// A configure, compile, or install step exited unsuccessfully.
    #[error("{stage} stage failed running `{command}` ({status}):\n{output}")]
    BuildTool {
        /// Name of the build stage.
        stage: &'static str,
        /// Command line of the failed step.
        command: String,
        /// Exit status reported by the step.
        status: ExitStatus,
        /// Combined output of the step.
        output: String,
    },

    /// An external tool did not finish within the configured timeout.
    #[error("`{command}` timed out after {seconds} seconds")]
    Timeout {
        /// Command line of the tool that was killed.
        command: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// A configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    Config {
        /// Path of the offending file.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The build request is internally inconsistent.
    #[error("invalid build request: {reason}")]
    InvalidRequest {
        /// Description of the problem.
        reason: String,
    },

    /// The result could not be serialised.
    #[error("failed to render result: {0}")]
    Report(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl ForgeError {
    /// Wrap a probe parse failure with the binary and its raw output.
    #[must_use]
    pub fn probe_parse(binary: Utf8PathBuf, source: &ProbeParseError, output: String) -> Self {
        Self::ProbeParse {
            binary,
            reason: source.to_string(),
            output,
        }
    }
}

/// Result type alias using [`ForgeError`].
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::exit_status;

    #[test]
    fn build_tool_error_names_stage_and_command() {
        let err = ForgeError::BuildTool {
            stage: "openssl",
            command: "make install_sw".to_owned(),
            status: exit_status(2),
            output: "cc: fatal error".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("openssl stage"));
        assert!(msg.contains("make install_sw"));
        assert!(msg.contains("cc: fatal error"));
    }

    #[test]
    fn authentication_error_carries_tool_output() {
        let err = ForgeError::Authentication {
            archive: Utf8PathBuf::from("/ws/nginx-1.5.11.tar.gz"),
            output: "gpg: BAD signature".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nginx-1.5.11.tar.gz"));
        assert!(msg.contains("BAD signature"));
    }

    #[test]
    fn probe_parse_error_includes_reason_and_output() {
        let source = ProbeParseError::Missing {
            fragment: "--with-pcre=".to_owned(),
        };
        let err = ForgeError::probe_parse(
            Utf8PathBuf::from("/usr/local/nginx/sbin/nginx"),
            &source,
            "nginx version: nginx/1.5.11".to_owned(),
        );
        let msg = err.to_string();
        assert!(msg.contains("/usr/local/nginx/sbin/nginx"));
        assert!(msg.contains("--with-pcre="));
        assert!(msg.contains("nginx version"));
    }

    #[test]
    fn download_error_preserves_source() {
        let err = ForgeError::Download {
            file: "pcre-8.34.tar.gz".to_owned(),
            source: DownloadError::NotFound {
                url: "https://example.test/pcre-8.34.tar.gz".to_owned(),
            },
        };
        assert!(err.to_string().contains("pcre-8.34.tar.gz"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn timeout_error_reports_seconds() {
        let err = ForgeError::Timeout {
            command: "make".to_owned(),
            seconds: 30,
        };
        assert_eq!(err.to_string(), "`make` timed out after 30 seconds");
    }
}
