//! The single entry point: make the install match a request.
//!
//! [`Orchestrator::ensure_built`] probes the installed server and stops there
//! when it already matches. Otherwise it prepares the workspace, fetches and
//! verifies all three source trees, runs both build stages, and reports what
//! the install now looks like. Any failure ends the run; nothing is retried.

use crate::config::Settings;
use crate::error::Result;
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::fetch::ArchiveFetcher;
use crate::fetch::download::{ArchiveDownloader, HttpDownloader};
use crate::fetch::extraction::{ArchiveExtractor, TarGzExtractor};
use crate::fetch::verification::{SignatureVerifier, TrustAnchor};
use crate::outcome::BuildOutcome;
use crate::probe::VersionProber;
use crate::request::BuildRequest;
use crate::sequencer::{BuildLayout, BuildSequencer, SourceTrees};
use crate::source::SourceCatalog;
use camino::Utf8Path;

/// Drives the probe, fetch, and build pipeline over injected collaborators.
pub struct Orchestrator<'a> {
    executor: &'a dyn CommandExecutor,
    downloader: &'a dyn ArchiveDownloader,
    extractor: &'a dyn ArchiveExtractor,
    trust: TrustAnchor,
    catalog: SourceCatalog,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator using the built-in source locations.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        downloader: &'a dyn ArchiveDownloader,
        extractor: &'a dyn ArchiveExtractor,
        trust: TrustAnchor,
    ) -> Self {
        Self {
            executor,
            downloader,
            extractor,
            trust,
            catalog: SourceCatalog::default(),
        }
    }

    /// Fetch sources from `catalog` instead of the built-in locations.
    #[must_use]
    pub fn with_catalog(mut self, catalog: SourceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Ensure the server at the request's prefix was built from exactly the
    /// requested versions.
    ///
    /// A dry run only probes: it reports whether a rebuild would happen and
    /// touches neither the network nor the filesystem.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by request validation, probing,
    /// fetching, verification, extraction, or either build stage. A failed
    /// workspace cleanup is logged and does not fail the run.
    pub fn ensure_built(&self, request: &BuildRequest, dry_run: bool) -> Result<BuildOutcome> {
        request.validate()?;
        self.trust.ensure_outside(&request.workspace_dir)?;

        let binary = request.main_binary_path();
        let prober = VersionProber::new(self.executor);
        if !prober.rebuild_required(&binary, &request.versions)? {
            log::info!("{binary} already built from {}", request.versions);
            return Ok(BuildOutcome::new(request, false, dry_run));
        }
        if dry_run {
            log::info!("dry run: {binary} would be rebuilt from {}", request.versions);
            return Ok(BuildOutcome::new(request, true, true));
        }

        self.build(request)?;
        let outcome = BuildOutcome::new(request, true, false);

        if request.clean_after {
            clean_workspace(&request.workspace_dir);
        }
        Ok(outcome)
    }

    fn build(&self, request: &BuildRequest) -> Result<()> {
        let workspace = &request.workspace_dir;
        self.trust.ensure_present()?;
        std::fs::create_dir_all(workspace)?;
        let keyring = self.trust.install_into(workspace)?;

        let fetcher = ArchiveFetcher::new(
            self.downloader,
            SignatureVerifier::new(self.executor, &keyring),
            self.extractor,
        );
        let [openssl, pcre, nginx] = self.catalog.artifacts(workspace, &request.versions);
        let trees = SourceTrees {
            openssl: fetcher.fetch(&openssl)?,
            pcre: fetcher.fetch(&pcre)?,
            nginx: fetcher.fetch(&nginx)?,
        };

        let layout = BuildLayout {
            install_prefix: request.install_prefix.clone(),
            dependency_build_dir: request.dependency_build_dir(),
        };
        let installed = BuildSequencer::new(self.executor).run(&trees, &layout)?;
        log::info!("installed {installed}");
        Ok(())
    }
}

/// Remove the workspace after a successful build. Failure only warns.
fn clean_workspace(workspace: &Utf8Path) {
    match std::fs::remove_dir_all(workspace) {
        Ok(()) => log::info!("removed workspace {workspace}"),
        Err(err) => log::warn!("could not remove workspace {workspace}: {err}"),
    }
}

/// Run the pipeline with the production collaborators: host processes,
/// HTTP downloads, and `.tar.gz` extraction.
///
/// # Errors
///
/// See [`Orchestrator::ensure_built`].
pub fn ensure_built(settings: &Settings, dry_run: bool) -> Result<BuildOutcome> {
    let executor = settings
        .tool_timeout
        .map_or_else(SystemCommandExecutor::default, SystemCommandExecutor::with_timeout);
    if let Some(timeout) = executor.timeout() {
        log::debug!("external tools are killed after {}s", timeout.as_secs());
    }
    Orchestrator::new(
        &executor,
        &HttpDownloader,
        &TarGzExtractor,
        settings.trust.clone(),
    )
    .with_catalog(settings.catalog.clone())
    .ensure_built(&settings.request, dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::request::Versions;
    use crate::test_utils::{
        RecordingExecutor, StubDownloader, StubExtractor, failure_output, output_with,
        success_output, version_report,
    };
    use camino::Utf8PathBuf;
    use rstest::rstest;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: Utf8PathBuf,
        trust: TrustAnchor,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().expect("temp dir");
            let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
            let keyring = root.join("keys.gpg");
            std::fs::write(&keyring, b"keyring").expect("write keyring");
            Self {
                _temp: temp,
                root,
                trust: TrustAnchor::new(keyring),
            }
        }

        fn request(&self) -> BuildRequest {
            BuildRequest {
                versions: Versions::default(),
                install_prefix: self.root.join("nginx"),
                workspace_dir: self.root.join("ws"),
                clean_after: false,
            }
        }

        fn install(&self) {
            let binary = self.request().main_binary_path();
            std::fs::create_dir_all(self.root.join("nginx/sbin")).expect("create sbin");
            std::fs::write(binary, b"#!/bin/false\n").expect("write binary");
        }
    }

    /// Tools that succeed, with `make install` dropping a server binary that
    /// reports `installed` when probed.
    fn fake_toolchain(binary: Utf8PathBuf, installed: Versions) -> RecordingExecutor {
        RecordingExecutor::new(move |call| {
            if call.program() == binary.as_str() {
                return Ok(version_report(&installed));
            }
            if call.program() == "make" && call.arguments() == ["install"] {
                if let Some(sbin) = binary.parent() {
                    std::fs::create_dir_all(sbin)?;
                }
                std::fs::write(&binary, b"#!/bin/false\n")?;
            }
            Ok(success_output())
        })
    }

    #[test]
    fn builds_from_an_empty_workspace() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let executor = fake_toolchain(request.main_binary_path(), Versions::default());
        let downloader = StubDownloader::new();
        let extractor = StubExtractor::new();

        let outcome = Orchestrator::new(&executor, &downloader, &extractor, fixture.trust.clone())
            .ensure_built(&request, false)
            .expect("build");

        assert!(outcome.changed);
        assert!(!outcome.dry_run);
        assert_eq!(outcome.facts.main_version, "1.5.11");
        assert_eq!(outcome.facts.dependency_version, "1.0.1f");
        assert_eq!(outcome.facts.auxiliary_version, "8.34");
        assert_eq!(outcome.facts.main_binary_path, request.main_binary_path());
        assert!(request.main_binary_path().is_file());
        assert!(request.workspace_dir.join("trusted-keys.gpg").is_file());

        assert_eq!(
            downloader.requested(),
            [
                "https://www.openssl.org/source/openssl-1.0.1f.tar.gz",
                "https://www.openssl.org/source/openssl-1.0.1f.tar.gz.asc",
                "https://ftp.exim.org/pub/pcre/pcre-8.34.tar.gz",
                "https://ftp.exim.org/pub/pcre/pcre-8.34.tar.gz.sig",
                "https://nginx.org/download/nginx-1.5.11.tar.gz",
                "https://nginx.org/download/nginx-1.5.11.tar.gz.asc",
            ]
        );
        let programs: Vec<String> = executor
            .calls()
            .iter()
            .map(|call| call.program().to_owned())
            .collect();
        assert_eq!(
            programs,
            ["gpg", "gpg", "gpg", "./config", "make", "make", "./configure", "make", "make"]
        );
    }

    #[test]
    fn second_run_changes_nothing() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let extractor = StubExtractor::new();
        let first = fake_toolchain(request.main_binary_path(), Versions::default());
        Orchestrator::new(&first, &StubDownloader::new(), &extractor, fixture.trust.clone())
            .ensure_built(&request, false)
            .expect("first build");

        let second = fake_toolchain(request.main_binary_path(), Versions::default());
        let downloader = StubDownloader::new();
        let outcome = Orchestrator::new(&second, &downloader, &extractor, fixture.trust.clone())
            .ensure_built(&request, false)
            .expect("second run");

        assert!(!outcome.changed);
        assert!(downloader.requested().is_empty());
        assert_eq!(second.command_lines(), [format!("{} -V", request.main_binary_path())]);
    }

    #[rstest]
    #[case::nginx(Versions::new("1.5.12", "1.0.1f", "8.34"))]
    #[case::openssl(Versions::new("1.5.11", "1.0.1g", "8.34"))]
    #[case::pcre(Versions::new("1.5.11", "1.0.1f", "8.35"))]
    fn any_changed_version_triggers_a_rebuild(#[case] wanted: Versions) {
        let fixture = Fixture::new();
        fixture.install();
        let request = BuildRequest {
            versions: wanted,
            ..fixture.request()
        };
        let executor = fake_toolchain(request.main_binary_path(), Versions::default());

        let outcome = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect("rebuild");

        assert!(outcome.changed);
        assert_eq!(executor.count_program("./configure"), 1);
    }

    #[test]
    fn dry_run_reports_without_touching_anything() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let executor = RecordingExecutor::succeeding();
        let downloader = StubDownloader::new();

        let outcome = Orchestrator::new(
            &executor,
            &downloader,
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, true)
        .expect("dry run");

        assert!(outcome.changed);
        assert!(outcome.dry_run);
        assert!(!request.workspace_dir.exists());
        assert!(downloader.requested().is_empty());
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn dry_run_of_a_matching_install_is_unchanged() {
        let fixture = Fixture::new();
        fixture.install();
        let request = fixture.request();
        let executor = fake_toolchain(request.main_binary_path(), Versions::default());

        let outcome = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, true)
        .expect("dry run");

        assert!(!outcome.changed);
        assert!(outcome.dry_run);
    }

    #[test]
    fn clean_after_removes_only_the_workspace() {
        let fixture = Fixture::new();
        let request = BuildRequest {
            clean_after: true,
            ..fixture.request()
        };
        let executor = fake_toolchain(request.main_binary_path(), Versions::default());

        let outcome = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect("build");

        assert!(outcome.changed);
        assert!(!request.workspace_dir.exists());
        assert!(request.main_binary_path().is_file());
        assert!(fixture.trust.keyring().is_file());
    }

    #[test]
    fn failed_build_keeps_the_workspace() {
        let fixture = Fixture::new();
        let request = BuildRequest {
            clean_after: true,
            ..fixture.request()
        };
        let executor = RecordingExecutor::new(|call| {
            if call.program() == "./configure" {
                Ok(failure_output("./configure: error: C compiler cc is not found"))
            } else {
                Ok(success_output())
            }
        });

        let err = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect_err("expected build failure");

        assert!(matches!(err, ForgeError::BuildTool { stage: "nginx", .. }));
        assert!(request.workspace_dir.join("nginx-1.5.11").is_dir());
    }

    #[test]
    fn missing_keyring_fails_before_any_download() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let downloader = StubDownloader::new();
        let executor = RecordingExecutor::succeeding();

        let err = Orchestrator::new(
            &executor,
            &downloader,
            &StubExtractor::new(),
            TrustAnchor::new(fixture.root.join("missing.gpg")),
        )
        .ensure_built(&request, false)
        .expect_err("expected missing keyring");

        assert!(matches!(err, ForgeError::TrustAnchorMissing { .. }));
        assert!(downloader.requested().is_empty());
    }

    #[test]
    fn rejected_signature_stops_before_building() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let executor = RecordingExecutor::new(|call| {
            let is_pcre = call.arguments().iter().any(|arg| arg.ends_with("pcre-8.34.tar.gz"));
            if call.program() == "gpg" && is_pcre {
                Ok(failure_output("gpg: BAD signature"))
            } else {
                Ok(success_output())
            }
        });
        let extractor = StubExtractor::new();

        let err = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &extractor,
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect_err("expected authentication failure");

        assert!(matches!(err, ForgeError::Authentication { .. }));
        assert_eq!(extractor.extracted(), ["openssl-1.0.1f.tar.gz"]);
        assert_eq!(executor.count_program("./config"), 0);
        assert!(!request.workspace_dir.join("pcre-8.34").exists());
    }

    #[test]
    fn unreadable_probe_is_fatal() {
        let fixture = Fixture::new();
        fixture.install();
        let request = fixture.request();
        let executor = RecordingExecutor::new(|_| Ok(output_with(0, "", "nginx: invalid option")));
        let downloader = StubDownloader::new();

        let err = Orchestrator::new(
            &executor,
            &downloader,
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect_err("expected probe failure");

        assert!(matches!(err, ForgeError::ProbeParse { .. }));
        assert!(downloader.requested().is_empty());
    }

    #[test]
    fn invalid_request_is_rejected_before_probing() {
        let fixture = Fixture::new();
        let request = BuildRequest {
            install_prefix: fixture.root.join("ws/nginx"),
            ..fixture.request()
        };
        let executor = RecordingExecutor::succeeding();

        let err = Orchestrator::new(
            &executor,
            &StubDownloader::new(),
            &StubExtractor::new(),
            fixture.trust.clone(),
        )
        .ensure_built(&request, false)
        .expect_err("expected invalid request");

        assert!(matches!(err, ForgeError::InvalidRequest { .. }));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn keyring_stored_in_the_workspace_is_rejected() {
        let fixture = Fixture::new();
        let request = fixture.request();
        std::fs::create_dir_all(&request.workspace_dir).expect("create workspace");
        let keyring = request.workspace_dir.join("trusted-keys.gpg");
        std::fs::write(&keyring, b"keyring").expect("write keyring");
        let executor = RecordingExecutor::succeeding();
        let downloader = StubDownloader::new();

        let err = Orchestrator::new(
            &executor,
            &downloader,
            &StubExtractor::new(),
            TrustAnchor::new(keyring.clone()),
        )
        .ensure_built(&request, false)
        .expect_err("expected invalid request");

        assert!(matches!(err, ForgeError::InvalidRequest { .. }));
        assert!(executor.calls().is_empty());
        assert!(downloader.requested().is_empty());
        assert_eq!(std::fs::read(&keyring).expect("read keyring"), b"keyring");
    }

    #[test]
    fn catalog_override_changes_download_locations() {
        let fixture = Fixture::new();
        let request = fixture.request();
        let executor = fake_toolchain(request.main_binary_path(), Versions::default());
        let downloader = StubDownloader::new();
        let mut catalog = SourceCatalog::default();
        catalog.pcre = crate::source::SourceSpec::new("pcre", "https://mirror.test/pcre", ".sig");

        Orchestrator::new(&executor, &downloader, &StubExtractor::new(), fixture.trust.clone())
            .with_catalog(catalog)
            .ensure_built(&request, false)
            .expect("build");

        assert!(
            downloader
                .requested()
                .contains(&"https://mirror.test/pcre/pcre-8.34.tar.gz".to_owned())
        );
    }
}
