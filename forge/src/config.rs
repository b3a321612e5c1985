//! Configuration file loading and request resolution.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional `nginx-forge.toml`, and command-line overrides.
//!
//! ```toml
//! clean_after = true
//! tool_timeout_secs = 3600
//!
//! [versions]
//! nginx = "1.5.11"
//! openssl = "1.0.1f"
//! pcre = "8.34"
//!
//! [paths]
//! install_prefix = "/usr/local/nginx"
//! workspace_dir = "/usr/local/src/nginx-forge"
//! keyring = "trusted-keys.gpg"
//!
//! [sources.pcre]
//! base_url = "https://mirror.example.org/pcre/"
//! ```
//!
//! A relative keyring path is resolved against the directory holding the
//! configuration file, or the executable's directory when there is none.

use crate::error::{ForgeError, Result};
use crate::fetch::verification::TrustAnchor;
use crate::request::{BuildRequest, Versions};
use crate::source::{SourceCatalog, SourceOverride};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Conventional configuration file name.
pub const CONFIG_FILE_NAME: &str = "nginx-forge.toml";

/// Keyring file name looked up next to the configuration.
pub const DEFAULT_KEYRING: &str = "trusted-keys.gpg";

/// Contents of `nginx-forge.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Remove the workspace after a successful build.
    pub clean_after: Option<bool>,
    /// Kill any external tool running longer than this. `0` disables.
    pub tool_timeout_secs: Option<u64>,
    /// Requested versions.
    pub versions: VersionsConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Per-component source location overrides.
    pub sources: SourcesConfig,
}

/// `[versions]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionsConfig {
    /// nginx release.
    pub nginx: Option<String>,
    /// OpenSSL release.
    pub openssl: Option<String>,
    /// PCRE release.
    pub pcre: Option<String>,
}

/// `[paths]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Install prefix.
    pub install_prefix: Option<Utf8PathBuf>,
    /// Scratch workspace.
    pub workspace_dir: Option<Utf8PathBuf>,
    /// Trusted keyring.
    pub keyring: Option<Utf8PathBuf>,
}

/// `[sources.*]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// OpenSSL source location.
    pub openssl: SourceOverride,
    /// PCRE source location.
    pub pcre: SourceOverride,
    /// nginx source location.
    pub nginx: SourceOverride,
}

/// Values supplied on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    /// nginx release.
    pub nginx_version: Option<String>,
    /// OpenSSL release.
    pub openssl_version: Option<String>,
    /// PCRE release.
    pub pcre_version: Option<String>,
    /// Install prefix.
    pub install_prefix: Option<Utf8PathBuf>,
    /// Scratch workspace.
    pub workspace_dir: Option<Utf8PathBuf>,
    /// Trusted keyring, used as given.
    pub keyring: Option<Utf8PathBuf>,
    /// Workspace cleanup policy.
    pub clean_after: Option<bool>,
    /// Tool timeout in seconds.
    pub tool_timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// What to build and where.
    pub request: BuildRequest,
    /// Keyring that authenticates source archives.
    pub trust: TrustAnchor,
    /// Where sources are downloaded from.
    pub catalog: SourceCatalog,
    /// Deadline for each external tool, if any.
    pub tool_timeout: Option<Duration>,
}

impl ForgeConfig {
    /// Read and parse the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] if the file cannot be read or is not
    /// valid configuration.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| ForgeError::Config {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// Parse configuration text; `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] describing the first TOML or schema
    /// problem.
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(text).map_err(|err| ForgeError::Config {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Layer `overrides` over this configuration and the built-in defaults.
    ///
    /// A relative keyring from the file is resolved against `base_dir`.
    #[must_use]
    pub fn resolve(self, overrides: RequestOverrides, base_dir: &Utf8Path) -> Settings {
        let defaults = BuildRequest::default();
        let default_versions = defaults.versions;
        let versions = Versions::new(
            pick(overrides.nginx_version, self.versions.nginx, default_versions.nginx),
            pick(overrides.openssl_version, self.versions.openssl, default_versions.openssl),
            pick(overrides.pcre_version, self.versions.pcre, default_versions.pcre),
        );

        let request = BuildRequest {
            versions,
            install_prefix: pick(
                overrides.install_prefix,
                self.paths.install_prefix,
                defaults.install_prefix,
            ),
            workspace_dir: pick(
                overrides.workspace_dir,
                self.paths.workspace_dir,
                defaults.workspace_dir,
            ),
            clean_after: pick(overrides.clean_after, self.clean_after, defaults.clean_after),
        };

        let keyring = overrides.keyring.unwrap_or_else(|| {
            let configured = self
                .paths
                .keyring
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_KEYRING));
            if configured.is_absolute() {
                configured
            } else {
                base_dir.join(configured)
            }
        });

        let tool_timeout = overrides
            .tool_timeout_secs
            .or(self.tool_timeout_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        Settings {
            request,
            trust: TrustAnchor::new(keyring),
            catalog: self.sources.apply(SourceCatalog::default()),
            tool_timeout,
        }
    }
}

impl SourcesConfig {
    fn apply(&self, catalog: SourceCatalog) -> SourceCatalog {
        SourceCatalog {
            openssl: catalog.openssl.overridden(&self.openssl),
            pcre: catalog.pcre.overridden(&self.pcre),
            nginx: catalog.nginx.overridden(&self.nginx),
        }
    }
}

fn pick<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}

/// Load settings from `config_path` (if any) with `overrides` on top.
///
/// # Errors
///
/// Returns [`ForgeError::Config`] for an unreadable or invalid file, or an
/// I/O error if the executable's directory cannot be determined.
pub fn load_settings(config_path: Option<&Utf8Path>, overrides: RequestOverrides) -> Result<Settings> {
    match config_path {
        Some(path) => {
            let config = ForgeConfig::load(path)?;
            let base_dir = path.parent().unwrap_or_else(|| Utf8Path::new(""));
            log::debug!("loaded configuration from {path}");
            Ok(config.resolve(overrides, base_dir))
        }
        None => Ok(ForgeConfig::default().resolve(overrides, &executable_dir()?)),
    }
}

fn executable_dir() -> Result<Utf8PathBuf> {
    let exe = Utf8PathBuf::try_from(std::env::current_exe()?).map_err(|err| err.into_io_error())?;
    Ok(exe
        .parent()
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf))
}
