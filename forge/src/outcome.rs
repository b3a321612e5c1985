//! The structured result handed back to the calling task runner.

use crate::request::BuildRequest;
use camino::Utf8PathBuf;
use serde::Serialize;

/// Result of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    /// Whether the install was (or, in a dry run, would be) rebuilt.
    pub changed: bool,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// What the install looks like afterwards.
    pub facts: Facts,
}

/// Facts about the install, always reported from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facts {
    /// nginx version.
    pub main_version: String,
    /// OpenSSL version.
    pub dependency_version: String,
    /// PCRE version.
    pub auxiliary_version: String,
    /// Installed server executable.
    pub main_binary_path: Utf8PathBuf,
}

impl Facts {
    /// Facts describing `request` once satisfied.
    #[must_use]
    pub fn from_request(request: &BuildRequest) -> Self {
        Self {
            main_version: request.versions.nginx.clone(),
            dependency_version: request.versions.openssl.clone(),
            auxiliary_version: request.versions.pcre.clone(),
            main_binary_path: request.main_binary_path(),
        }
    }
}

impl BuildOutcome {
    /// An outcome for `request`.
    #[must_use]
    pub fn new(request: &BuildRequest, changed: bool, dry_run: bool) -> Self {
        Self {
            changed,
            dry_run,
            facts: Facts::from_request(request),
        }
    }
}
