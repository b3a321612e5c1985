//! Installed-binary introspection.
//!
//! Decides whether a rebuild is needed by asking the installed server how it
//! was built. Probing only ever runs the binary's `-V` flag; it never
//! modifies the install.

pub mod parser;

use crate::error::{ForgeError, Result};
use crate::exec::{CommandExecutor, Invocation, combined_output};
use crate::request::Versions;
use camino::Utf8Path;
use parser::parse_build_report;

/// Flag that makes the server print its version and configure arguments.
pub const PROBE_FLAG: &str = "-V";

/// What was found at the main binary path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No executable exists at the path.
    NotInstalled,
    /// An executable reported these versions.
    Installed(Versions),
}

impl ProbeOutcome {
    /// Whether `requested` differs from what is installed.
    ///
    /// # Examples
    ///
    /// ```
    /// use nginx_forge::probe::ProbeOutcome;
    /// use nginx_forge::request::Versions;
    ///
    /// let wanted = Versions::default();
    /// assert!(ProbeOutcome::NotInstalled.needs_rebuild(&wanted));
    /// assert!(!ProbeOutcome::Installed(wanted.clone()).needs_rebuild(&wanted));
    /// ```
    #[must_use]
    pub fn needs_rebuild(&self, requested: &Versions) -> bool {
        match self {
            Self::NotInstalled => true,
            Self::Installed(installed) => installed != requested,
        }
    }
}

/// Inspects an installed server binary through a [`CommandExecutor`].
pub struct VersionProber<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> VersionProber<'a> {
    /// Create a prober that runs the binary through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Report what is installed at `binary`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::ProbeParse`] when the binary exits unsuccessfully
    /// or its report does not match the expected grammar, and I/O errors
    /// from spawning it.
    pub fn probe(&self, binary: &Utf8Path) -> Result<ProbeOutcome> {
        if !binary.is_file() {
            log::debug!("no executable at {binary}");
            return Ok(ProbeOutcome::NotInstalled);
        }

        let output = self
            .executor
            .run(&Invocation::new(binary.as_str()).arg(PROBE_FLAG))?;
        let report = combined_output(&output);

        if !output.status.success() {
            return Err(ForgeError::ProbeParse {
                binary: binary.to_owned(),
                reason: format!("`{binary} {PROBE_FLAG}` exited with {}", output.status),
                output: report,
            });
        }

        let versions = parse_build_report(&report)
            .map_err(|err| ForgeError::probe_parse(binary.to_owned(), &err, report.clone()))?;
        log::debug!("{binary} reports {versions}");
        Ok(ProbeOutcome::Installed(versions))
    }

    /// Whether `binary` must be rebuilt to match `requested`.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`VersionProber::probe`]; an unreadable
    /// report is never taken to mean "rebuild".
    pub fn rebuild_required(&self, binary: &Utf8Path, requested: &Versions) -> Result<bool> {
        let outcome = self.probe(binary)?;
        if let ProbeOutcome::Installed(installed) = &outcome {
            let changed = installed.differences(requested);
            if !changed.is_empty() {
                log::info!("installed {installed} differs in: {}", changed.join(", "));
            }
        }
        Ok(outcome.needs_rebuild(requested))
    }
}
