//! Shared test utilities for the forge crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::error::{ForgeError, Result};
use crate::exec::{CommandExecutor, Invocation};
use crate::fetch::download::{ArchiveDownloader, DownloadError};
use crate::fetch::extraction::{ArchiveExtractor, ExtractionError};
use crate::request::Versions;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a command `Output` with the given exit code and streams.
#[must_use]
pub fn output_with(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    output_with(0, "", "")
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    output_with(1, "", stderr)
}

/// Renders the `-V` report an nginx build with `versions` would print.
///
/// nginx writes its self-report to stderr, so the text is placed there.
#[must_use]
pub fn version_report(versions: &Versions) -> Output {
    let report = format!(
        concat!(
            "nginx version: nginx/{nginx}\n",
            "built by gcc 4.8.2 (Ubuntu 4.8.2-19ubuntu1)\n",
            "TLS SNI support enabled\n",
            "configure arguments: --prefix=/usr/local/nginx ",
            "--with-cc-opt=-I/ws/openssl-build/include --with-ld-opt=-L/ws/openssl-build/lib ",
            "--with-pcre=/ws/pcre-{pcre} --with-openssl=/ws/openssl-{openssl} ",
            "--with-http_ssl_module --with-http_spdy_module\n"
        ),
        nginx = versions.nginx,
        pcre = versions.pcre,
        openssl = versions.openssl,
    );
    output_with(0, "", &report)
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "make").
    pub program: String,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `program args...` and answer with `result`.
    #[must_use]
    pub fn new(program: &str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|&arg| arg.to_owned()).collect(),
            result,
        }
    }
}

/// A scripted implementation of `CommandExecutor` for testing.
///
/// Expected invocations are consumed in order; any deviation is reported as
/// [`ForgeError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Returns true when every scripted invocation has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.expected.borrow().is_empty()
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(ForgeError::StubMismatch {
                message: format!("unexpected invocation `{invocation}`"),
            });
        };

        if call.program != invocation.program() || call.args.as_slice() != invocation.arguments()
        {
            return Err(ForgeError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{invocation}`",
                    call.program,
                    call.args.join(" ")
                ),
            });
        }

        call.result
    }
}

/// Response function used by [`RecordingExecutor`].
pub type Responder = Box<dyn Fn(&Invocation) -> Result<Output>>;

/// An executor that answers every invocation through a closure and keeps a
/// log of what was run, in order.
pub struct RecordingExecutor {
    responder: Responder,
    calls: RefCell<Vec<Invocation>>,
}

impl RecordingExecutor {
    /// Create an executor answering through `responder`.
    #[must_use]
    pub fn new(responder: impl Fn(&Invocation) -> Result<Output> + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Create an executor for which every command succeeds silently.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(success_output()))
    }

    /// All invocations seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// The invocations rendered as command lines.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    /// Number of invocations of `program`.
    #[must_use]
    pub fn count_program(&self, program: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.program() == program)
            .count()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());
        (self.responder)(invocation)
    }
}

/// A downloader that writes a fixed body for every URL and records them.
#[derive(Debug, Default)]
pub struct StubDownloader {
    requested: RefCell<Vec<String>>,
    failing_url_suffix: Option<String>,
}

impl StubDownloader {
    /// Create a downloader for which every request succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a downloader that answers 404 for URLs ending in `suffix`.
    #[must_use]
    pub fn failing_for(suffix: &str) -> Self {
        Self {
            requested: RefCell::new(Vec::new()),
            failing_url_suffix: Some(suffix.to_owned()),
        }
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl ArchiveDownloader for StubDownloader {
    fn download(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        self.requested.borrow_mut().push(url.to_owned());
        if self
            .failing_url_suffix
            .as_deref()
            .is_some_and(|suffix| url.ends_with(suffix))
        {
            return Err(DownloadError::NotFound {
                url: url.to_owned(),
            });
        }
        std::fs::write(dest, url.as_bytes())?;
        Ok(())
    }
}

/// An extractor that fabricates the expected `<name>-<version>/` tree
/// instead of unpacking real tar data, recording each archive it saw.
#[derive(Debug, Default)]
pub struct StubExtractor {
    extracted: RefCell<Vec<String>>,
}

impl StubExtractor {
    /// Create a new stub extractor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File names of the archives extracted so far.
    #[must_use]
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.borrow().clone()
    }
}

impl ArchiveExtractor for StubExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> std::result::Result<usize, ExtractionError> {
        let file_name = archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tree = file_name.trim_end_matches(".tar.gz");
        let root = dest_dir.join(tree);
        std::fs::create_dir_all(&root)?;
        std::fs::write(root.join("README"), tree.as_bytes())?;
        self.extracted.borrow_mut().push(file_name);
        Ok(1)
    }
}
