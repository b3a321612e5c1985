//! Source acquisition: download, authenticate, unpack.
//!
//! [`ArchiveFetcher::fetch`] turns a [`SourceArtifact`] into an extracted
//! source tree. An archive is only unpacked after its detached signature has
//! verified, and the tree only appears under its final name once every entry
//! has been written, so an existing tree is always a complete, verified one.
//!
//! # Sub-modules
//!
//! - [`download`]: HTTP download trait and `ureq` implementation.
//! - [`extraction`]: `.tar.gz` extraction with path traversal protection.
//! - [`verification`]: keyring handling and `gpg` signature checks.

pub mod download;
pub mod extraction;
pub mod verification;

use crate::error::{ForgeError, Result};
use crate::source::SourceArtifact;
use camino::{Utf8Path, Utf8PathBuf};
use download::ArchiveDownloader;
use extraction::{ArchiveExtractor, ExtractionError};
use verification::SignatureVerifier;

/// Suffix of in-flight downloads.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Fetches, verifies, and extracts source archives into a workspace.
pub struct ArchiveFetcher<'a> {
    downloader: &'a dyn ArchiveDownloader,
    verifier: SignatureVerifier<'a>,
    extractor: &'a dyn ArchiveExtractor,
}

impl<'a> ArchiveFetcher<'a> {
    /// Create a fetcher from its collaborators.
    #[must_use]
    pub fn new(
        downloader: &'a dyn ArchiveDownloader,
        verifier: SignatureVerifier<'a>,
        extractor: &'a dyn ArchiveExtractor,
    ) -> Self {
        Self {
            downloader,
            verifier,
            extractor,
        }
    }

    /// Return the extracted source tree for `artifact`, producing it if
    /// needed.
    ///
    /// An existing tree is returned straight away with no network access and
    /// no verification. Otherwise the archive and signature are downloaded
    /// (each skipped if already on disk), the signature is verified, and only
    /// then is the archive unpacked.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Download`], [`ForgeError::Authentication`], or
    /// [`ForgeError::Extraction`] for the step that failed.
    pub fn fetch(&self, artifact: &SourceArtifact) -> Result<Utf8PathBuf> {
        if artifact.extracted_dir.is_dir() {
            log::info!("{} already extracted", artifact.tree_name());
            return Ok(artifact.extracted_dir.clone());
        }

        self.download_if_missing(&artifact.archive_url(), &artifact.archive_path)?;
        self.download_if_missing(&artifact.signature_url(), &artifact.signature_path)?;

        self.verifier
            .verify(&artifact.archive_path, &artifact.signature_path)?;

        self.extract(artifact)?;
        Ok(artifact.extracted_dir.clone())
    }

    /// Download `url` to `dest` unless `dest` is already present.
    ///
    /// The body is written to `<dest>.part` and renamed once complete, so an
    /// interrupted run never leaves a truncated file under the final name.
    fn download_if_missing(&self, url: &str, dest: &Utf8Path) -> Result<()> {
        if dest.is_file() {
            log::debug!("{dest} already downloaded");
            return Ok(());
        }

        let partial = Utf8PathBuf::from(format!("{dest}{PARTIAL_SUFFIX}"));
        let file = dest.file_name().unwrap_or(dest.as_str()).to_owned();
        self.downloader
            .download(url, partial.as_std_path())
            .map_err(|source| ForgeError::Download { file, source })?;
        std::fs::rename(&partial, dest)?;
        Ok(())
    }

    /// Unpack into a scratch directory inside the workspace, then move the
    /// expected top-level tree into place.
    fn extract(&self, artifact: &SourceArtifact) -> Result<()> {
        let archive = artifact.archive_path.clone();
        let scratch = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(artifact.workspace())?;

        log::info!("extracting {}", artifact.archive_filename());
        self.extractor
            .extract(archive.as_std_path(), scratch.path())
            .map_err(|source| ForgeError::Extraction {
                archive: archive.clone(),
                source,
            })?;

        let unpacked = scratch.path().join(artifact.tree_name());
        if !unpacked.is_dir() {
            return Err(ForgeError::Extraction {
                archive,
                source: ExtractionError::MissingTree {
                    expected: artifact.tree_name(),
                },
            });
        }
        std::fs::rename(&unpacked, &artifact.extracted_dir)?;
        Ok(())
    }
}
