//! Build requests and the version triple they pin.

use crate::error::{ForgeError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the web-server product and its source archives.
pub const MAIN_BINARY: &str = "nginx";
/// Name of the TLS library statically linked into the server.
pub const DEPENDENCY_LIBRARY: &str = "openssl";
/// Name of the regex library linked into the server.
pub const AUXILIARY_LIBRARY: &str = "pcre";

/// Directory under the workspace that receives the TLS library build output.
pub const DEPENDENCY_BUILD_DIR: &str = "openssl-build";

/// Default nginx release.
pub const DEFAULT_MAIN_VERSION: &str = "1.5.11";
/// Default OpenSSL release.
pub const DEFAULT_DEPENDENCY_VERSION: &str = "1.0.1f";
/// Default PCRE release.
pub const DEFAULT_AUXILIARY_VERSION: &str = "8.34";
/// Default install prefix.
pub const DEFAULT_INSTALL_PREFIX: &str = "/usr/local/nginx";
/// Default scratch workspace.
pub const DEFAULT_WORKSPACE_DIR: &str = "/usr/local/src/nginx-forge";

/// The version triple that identifies a build: nginx itself plus the
/// libraries linked into it.
///
/// The same shape describes both what is requested and what an installed
/// binary reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versions {
    /// nginx release.
    pub nginx: String,
    /// OpenSSL release statically linked in.
    pub openssl: String,
    /// PCRE release linked in.
    pub pcre: String,
}

impl Versions {
    /// Create a version triple.
    #[must_use]
    pub fn new(nginx: impl Into<String>, openssl: impl Into<String>, pcre: impl Into<String>) -> Self {
        Self {
            nginx: nginx.into(),
            openssl: openssl.into(),
            pcre: pcre.into(),
        }
    }

    /// Names of the components whose versions differ from `other`.
    ///
    /// Comparison is exact string equality; `1.0.1f` and `1.0.1F` differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use nginx_forge::request::Versions;
    ///
    /// let installed = Versions::new("1.5.11", "1.0.1f", "8.34");
    /// let wanted = Versions::new("1.5.11", "1.0.1g", "8.34");
    /// assert_eq!(installed.differences(&wanted), vec!["openssl"]);
    /// assert!(wanted.differences(&wanted).is_empty());
    /// ```
    #[must_use]
    pub fn differences(&self, other: &Self) -> Vec<&'static str> {
        [
            (MAIN_BINARY, &self.nginx, &other.nginx),
            (DEPENDENCY_LIBRARY, &self.openssl, &other.openssl),
            (AUXILIARY_LIBRARY, &self.pcre, &other.pcre),
        ]
        .into_iter()
        .filter(|(_, mine, theirs)| mine != theirs)
        .map(|(name, _, _)| name)
        .collect()
    }

    fn validate(&self) -> Result<()> {
        for (name, version) in [
            (MAIN_BINARY, &self.nginx),
            (DEPENDENCY_LIBRARY, &self.openssl),
            (AUXILIARY_LIBRARY, &self.pcre),
        ] {
            let is_plain = !version.is_empty()
                && version
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
            if !is_plain {
                return Err(ForgeError::InvalidRequest {
                    reason: format!("{name} version {version:?} is not a plain release string"),
                });
            }
        }
        Ok(())
    }
}

impl Default for Versions {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAIN_VERSION,
            DEFAULT_DEPENDENCY_VERSION,
            DEFAULT_AUXILIARY_VERSION,
        )
    }
}

impl fmt::Display for Versions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nginx {} (openssl {}, pcre {})",
            self.nginx, self.openssl, self.pcre
        )
    }
}

/// Everything one orchestration run needs to know about what to build and
/// where. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Versions to build.
    pub versions: Versions,
    /// Install prefix; the server lands in `<prefix>/sbin/nginx`.
    pub install_prefix: Utf8PathBuf,
    /// Scratch directory for downloads, sources, and the TLS library build.
    pub workspace_dir: Utf8PathBuf,
    /// Remove the workspace after a successful build.
    pub clean_after: bool,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            versions: Versions::default(),
            install_prefix: Utf8PathBuf::from(DEFAULT_INSTALL_PREFIX),
            workspace_dir: Utf8PathBuf::from(DEFAULT_WORKSPACE_DIR),
            clean_after: false,
        }
    }
}

impl BuildRequest {
    /// Path of the installed server executable.
    ///
    /// # Examples
    ///
    /// ```
    /// use nginx_forge::request::BuildRequest;
    ///
    /// let request = BuildRequest::default();
    /// assert_eq!(request.main_binary_path(), "/usr/local/nginx/sbin/nginx");
    /// ```
    #[must_use]
    pub fn main_binary_path(&self) -> Utf8PathBuf {
        self.install_prefix.join("sbin").join(MAIN_BINARY)
    }

    /// Dedicated output directory for the TLS library build.
    #[must_use]
    pub fn dependency_build_dir(&self) -> Utf8PathBuf {
        self.workspace_dir.join(DEPENDENCY_BUILD_DIR)
    }

    /// Reject requests the pipeline cannot run safely.
    ///
    /// Versions are spliced into URLs and paths, so they must be plain
    /// release strings. Both directories must be absolute, and because the
    /// workspace may be deleted wholesale it must not contain, or be, the
    /// install prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::InvalidRequest`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        self.versions.validate()?;
        require_absolute("install prefix", &self.install_prefix)?;
        require_absolute("workspace directory", &self.workspace_dir)?;
        if self.install_prefix.starts_with(&self.workspace_dir) {
            return Err(ForgeError::InvalidRequest {
                reason: format!(
                    "install prefix {} lies inside workspace {}",
                    self.install_prefix, self.workspace_dir
                ),
            });
        }
        Ok(())
    }
}

fn require_absolute(what: &str, path: &Utf8Path) -> Result<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ForgeError::InvalidRequest {
            reason: format!("{what} {path} must be absolute"),
        })
    }
}
