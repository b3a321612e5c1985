//! HTTP retrieval of source archives and their signatures.
//!
//! The [`ArchiveDownloader`] trait keeps the network behind a seam so the
//! fetcher can be exercised without it.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single archive or signature download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Trait for downloading one URL to one file.
///
/// # Examples
///
/// ```
/// use nginx_forge::fetch::download::HttpDownloader;
///
/// let downloader = HttpDownloader;
/// // Use downloader.download(url, dest) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveDownloader {
    /// Download `url` and write the body to `dest`, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server has no such file (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The URL uses a scheme the HTTP client cannot fetch (e.g. `ftp://`).
    #[error("unsupported URL scheme: {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
pub struct HttpDownloader;

impl ArchiveDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if !is_http(url) {
            return Err(DownloadError::UnsupportedScheme {
                url: url.to_owned(),
            });
        }
        log::info!("downloading {url}");
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(DownloadError::Io)?;
        file.sync_all()?;
        Ok(())
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://nginx.org/download/nginx-0.0.0.tar.gz", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(503);
        let mapped = map_ureq_error("https://nginx.org/download/nginx-1.5.11.tar.gz", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }

    #[rstest]
    #[case::https("https://nginx.org/download/", true)]
    #[case::http("http://mirror.test/pcre/", true)]
    #[case::ftp("ftp://ftp.csx.cam.ac.uk/pub/software/programming/pcre/", false)]
    fn only_http_schemes_are_fetchable(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(is_http(url), expected);
    }

    #[test]
    fn ftp_urls_are_rejected_before_any_request() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = temp.path().join("pcre-8.34.tar.gz");
        let err = HttpDownloader
            .download("ftp://ftp.csx.cam.ac.uk/pcre-8.34.tar.gz", &dest)
            .expect_err("ftp is unsupported");
        assert!(matches!(err, DownloadError::UnsupportedScheme { .. }));
        assert!(!dest.exists());
    }
}
