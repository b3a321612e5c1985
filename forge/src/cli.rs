//! CLI argument definitions for nginx-forge.
//!
//! Flags override the configuration file field by field; anything left
//! unset falls through to the file and then to the built-in defaults.

use crate::config::RequestOverrides;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "NGINX_FORGE_CONFIG";

/// Build nginx with statically linked OpenSSL and PCRE from verified sources.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nginx-forge")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build nginx with statically linked OpenSSL and PCRE from verified sources.\n\n",
    "The installed server is probed first; when it already reports the requested ",
    "versions nothing is fetched or built. Otherwise each source archive is ",
    "downloaded, checked against the trusted keyring, and compiled in two stages.\n\n",
    "The result is printed to stdout as JSON for the calling task runner.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build the default release set:\n",
    "    $ nginx-forge\n\n",
    "  Check whether a rebuild would happen:\n",
    "    $ nginx-forge --dry-run\n\n",
    "  Build a newer OpenSSL and remove the workspace afterwards:\n",
    "    $ nginx-forge --openssl-version 1.0.1g --clean-after\n\n",
    "  Use a configuration file:\n",
    "    $ nginx-forge --config /etc/nginx-forge/nginx-forge.toml",
))]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<Utf8PathBuf>,

    /// nginx release to build.
    #[arg(long, value_name = "VERSION")]
    pub nginx_version: Option<String>,

    /// OpenSSL release to link statically.
    #[arg(long, value_name = "VERSION")]
    pub openssl_version: Option<String>,

    /// PCRE release to link.
    #[arg(long, value_name = "VERSION")]
    pub pcre_version: Option<String>,

    /// Install prefix [default: /usr/local/nginx].
    #[arg(long, value_name = "DIR")]
    pub install_prefix: Option<Utf8PathBuf>,

    /// Scratch directory for sources and build output
    /// [default: /usr/local/src/nginx-forge].
    #[arg(short, long, value_name = "DIR")]
    pub workspace_dir: Option<Utf8PathBuf>,

    /// Trusted keyring used to verify source signatures.
    #[arg(short, long, value_name = "FILE")]
    pub keyring: Option<Utf8PathBuf>,

    /// Remove the workspace after a successful build.
    #[arg(long)]
    pub clean_after: bool,

    /// Kill any external tool running longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub tool_timeout: Option<u64>,

    /// Only report whether a rebuild would happen.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// The configuration file to read, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Utf8Path> {
        self.config.as_deref()
    }

    /// Flags that override the configuration file.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use nginx_forge::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["nginx-forge", "--pcre-version", "8.35"]);
    /// let overrides = cli.overrides();
    /// assert_eq!(overrides.pcre_version.as_deref(), Some("8.35"));
    /// assert!(overrides.clean_after.is_none());
    /// ```
    #[must_use]
    pub fn overrides(&self) -> RequestOverrides {
        RequestOverrides {
            nginx_version: self.nginx_version.clone(),
            openssl_version: self.openssl_version.clone(),
            pcre_version: self.pcre_version.clone(),
            install_prefix: self.install_prefix.clone(),
            workspace_dir: self.workspace_dir.clone(),
            keyring: self.keyring.clone(),
            clean_after: self.clean_after.then_some(true),
            tool_timeout_secs: self.tool_timeout,
        }
    }

    /// Default log filter directive for the chosen verbosity.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
