//! Source archive extraction.
//!
//! Unpacks `.tar.gz` release tarballs with path traversal protection so a
//! hostile archive cannot write outside the workspace.

use flate2::read::GzDecoder;
use std::path::{Component, Path};

/// Trait for extracting source archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use nginx_forge::fetch::extraction::TarGzExtractor;
///
/// let extractor = TarGzExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the number of entries unpacked.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`] if
    /// there is nothing to unpack, and [`ExtractionError::Io`] on I/O or
    /// format failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O or decoding error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive is empty")]
    EmptyArchive,

    /// The archive did not unpack into the expected top-level directory.
    #[error("archive has no top-level `{expected}` directory")]
    MissingTree {
        /// Directory the archive was expected to contain.
        expected: String,
    },
}

/// Default extractor using the `flate2` and `tar` crates.
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError> {
        let file = std::fs::File::open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        let mut count = 0_usize;

        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            let entry_path = entry.path()?.into_owned();

            validate_entry_path(&entry_path)?;

            // Resolves hard-link targets under `dest_dir` and refuses to
            // write through symlinks that point outside it.
            if !entry.unpack_in(dest_dir)? {
                return Err(ExtractionError::PathTraversal {
                    path: entry_path.display().to_string(),
                });
            }
            count += 1;
        }

        if count == 0 {
            return Err(ExtractionError::EmptyArchive);
        }

        Ok(count)
    }
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::RootDir));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
