//! Source archive locations and on-disk naming.
//!
//! A [`SourceSpec`] says where a component's releases live; a
//! [`SourceArtifact`] pins one release of it to paths inside a workspace.

use crate::request::{AUXILIARY_LIBRARY, DEPENDENCY_LIBRARY, MAIN_BINARY, Versions};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Extension of every source archive.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Where one component's release archives and signatures are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Logical name, also the archive stem (`<name>-<version>.tar.gz`).
    pub name: String,
    /// Base URL the archive file name is appended to. Ends with `/`.
    pub base_url: String,
    /// Suffix appended to the archive file name to locate its signature.
    pub signature_suffix: String,
}

impl SourceSpec {
    /// Create a spec, normalising `base_url` to end with a slash.
    #[must_use]
    pub fn new(name: &str, base_url: &str, signature_suffix: &str) -> Self {
        let mut base = base_url.to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            name: name.to_owned(),
            base_url: base,
            signature_suffix: signature_suffix.to_owned(),
        }
    }

    /// Apply a partial override from configuration.
    #[must_use]
    pub fn overridden(self, with: &SourceOverride) -> Self {
        Self::new(
            &self.name,
            with.base_url.as_deref().unwrap_or(&self.base_url),
            with.signature_suffix
                .as_deref()
                .unwrap_or(&self.signature_suffix),
        )
    }
}

/// Optional per-component replacement of the built-in source locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOverride {
    /// Replacement base URL (a mirror).
    pub base_url: Option<String>,
    /// Replacement signature suffix.
    pub signature_suffix: Option<String>,
}

/// Source locations for the three components, in build order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCatalog {
    /// TLS library sources.
    pub openssl: SourceSpec,
    /// Regex library sources.
    pub pcre: SourceSpec,
    /// Web-server sources.
    pub nginx: SourceSpec,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self {
            openssl: SourceSpec::new(DEPENDENCY_LIBRARY, "https://www.openssl.org/source/", ".asc"),
            pcre: SourceSpec::new(AUXILIARY_LIBRARY, "https://ftp.exim.org/pub/pcre/", ".sig"),
            nginx: SourceSpec::new(MAIN_BINARY, "https://nginx.org/download/", ".asc"),
        }
    }
}

impl SourceCatalog {
    /// Pin each component to its requested version inside `workspace`.
    ///
    /// The order is the fetch order: the TLS library, then the regex
    /// library, then the server, so later stages' inputs are ready first.
    #[must_use]
    pub fn artifacts(&self, workspace: &Utf8Path, versions: &Versions) -> [SourceArtifact; 3] {
        [
            SourceArtifact::new(workspace, &self.openssl, &versions.openssl),
            SourceArtifact::new(workspace, &self.pcre, &versions.pcre),
            SourceArtifact::new(workspace, &self.nginx, &versions.nginx),
        ]
    }
}

/// One release of one component, mapped into a workspace.
///
/// The extracted directory is the durable result; the archive and signature
/// are transient downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArtifact {
    /// Logical component name.
    pub name: String,
    /// Pinned release.
    pub version: String,
    /// Base download URL.
    pub base_url: String,
    /// Signature file suffix.
    pub signature_suffix: String,
    /// `<workspace>/<name>-<version>.tar.gz`.
    pub archive_path: Utf8PathBuf,
    /// Archive path with the signature suffix appended.
    pub signature_path: Utf8PathBuf,
    /// `<workspace>/<name>-<version>/`.
    pub extracted_dir: Utf8PathBuf,
}

impl SourceArtifact {
    /// Derive the artifact's paths from its spec and version.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use nginx_forge::source::{SourceArtifact, SourceSpec};
    ///
    /// let spec = SourceSpec::new("pcre", "https://ftp.exim.org/pub/pcre", ".sig");
    /// let pcre = SourceArtifact::new(Utf8Path::new("/ws"), &spec, "8.34");
    /// assert_eq!(pcre.archive_url(), "https://ftp.exim.org/pub/pcre/pcre-8.34.tar.gz");
    /// assert_eq!(pcre.signature_url(), "https://ftp.exim.org/pub/pcre/pcre-8.34.tar.gz.sig");
    /// assert_eq!(pcre.extracted_dir, "/ws/pcre-8.34");
    /// ```
    #[must_use]
    pub fn new(workspace: &Utf8Path, spec: &SourceSpec, version: &str) -> Self {
        let stem = format!("{}-{version}", spec.name);
        let archive_path = workspace.join(format!("{stem}{ARCHIVE_EXTENSION}"));
        let signature_path =
            Utf8PathBuf::from(format!("{archive_path}{}", spec.signature_suffix));
        Self {
            name: spec.name.clone(),
            version: version.to_owned(),
            base_url: spec.base_url.clone(),
            signature_suffix: spec.signature_suffix.clone(),
            archive_path,
            signature_path,
            extracted_dir: workspace.join(stem),
        }
    }

    /// `<name>-<version>`, the archive's top-level directory.
    #[must_use]
    pub fn tree_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `<name>-<version>.tar.gz`.
    #[must_use]
    pub fn archive_filename(&self) -> String {
        format!("{}{ARCHIVE_EXTENSION}", self.tree_name())
    }

    /// Signature file name.
    #[must_use]
    pub fn signature_filename(&self) -> String {
        format!("{}{}", self.archive_filename(), self.signature_suffix)
    }

    /// Download URL of the archive.
    #[must_use]
    pub fn archive_url(&self) -> String {
        format!("{}{}", self.base_url, self.archive_filename())
    }

    /// Download URL of the detached signature.
    #[must_use]
    pub fn signature_url(&self) -> String {
        format!("{}{}", self.base_url, self.signature_filename())
    }

    /// Workspace holding this artifact.
    #[must_use]
    pub fn workspace(&self) -> &Utf8Path {
        self.extracted_dir
            .parent()
            .unwrap_or_else(|| Utf8Path::new("."))
    }
}
