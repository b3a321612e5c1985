//! External command execution.
//!
//! Every external tool the pipeline touches (the installed binary's
//! self-report, `gpg`, `./config`, `./configure`, `make`) is invoked through
//! [`CommandExecutor`], so the whole pipeline can be driven by a stub in
//! tests without spawning real processes.

use crate::error::{ForgeError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// A single external command: program, arguments, and working directory.
///
/// # Examples
///
/// ```
/// use nginx_forge::exec::Invocation;
///
/// let make = Invocation::new("make").arg("install_sw").current_dir("/ws/openssl-1.0.1f");
/// assert_eq!(make.to_string(), "make install_sw");
/// assert_eq!(make.working_dir().map(|dir| dir.as_str()), Some("/ws/openssl-1.0.1f"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    working_dir: Option<Utf8PathBuf>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The program to run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The working directory, if one was set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.working_dir.as_deref()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir.as_std_path());
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs the invocation to completion and returns its captured output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`Output::status`] and decide.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while spawning or waiting on the command,
    /// or [`ForgeError::Timeout`] when the executor enforces a deadline.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nginx_forge::exec::{CommandExecutor, Invocation, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run(&Invocation::new("make").arg("--version"))?;
    /// assert!(output.status.success());
    /// # Ok::<(), nginx_forge::error::ForgeError>(())
    /// ```
    fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// Without a timeout the calling thread blocks until the tool exits. With a
/// timeout the child is killed once the deadline passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Create an executor that kills tools running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// The configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        log::debug!("running `{invocation}`");
        match self.timeout {
            None => invocation.to_command().output().map_err(ForgeError::from),
            Some(timeout) => run_with_timeout(invocation, timeout),
        }
    }
}

/// Runs a command, killing it if it outlives `timeout`.
///
/// Output is captured through anonymous temporary files rather than pipes so
/// a chatty build cannot stall on a full pipe buffer while nobody reads it.
fn run_with_timeout(invocation: &Invocation, timeout: Duration) -> Result<Output> {
    let mut stdout_file = tempfile::tempfile()?;
    let mut stderr_file = tempfile::tempfile()?;

    let mut child = invocation
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()?;

    let Some(status) = child.wait_timeout(timeout)? else {
        // Timed out. The kill may race with a natural exit; either way the
        // timeout is what gets reported.
        if let Err(err) = child.kill() {
            log::debug!("could not kill `{invocation}`: {err}");
        }
        if let Err(err) = child.wait() {
            log::debug!("could not reap `{invocation}`: {err}");
        }
        return Err(ForgeError::Timeout {
            command: invocation.to_string(),
            seconds: timeout.as_secs(),
        });
    };

    Ok(Output {
        status,
        stdout: read_back(&mut stdout_file)?,
        stderr: read_back(&mut stderr_file)?,
    })
}

fn read_back(file: &mut File) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Join a command's stdout and stderr into one diagnostic string.
///
/// # Examples
///
/// ```
/// use nginx_forge::exec::combined_output;
/// # use std::process::{ExitStatus, Output};
/// # #[cfg(unix)]
/// # {
/// # use std::os::unix::process::ExitStatusExt;
/// let output = Output {
///     status: ExitStatus::from_raw(0),
///     stdout: b"checking for OS\n".to_vec(),
///     stderr: b"nginx version: nginx/1.5.11\n".to_vec(),
/// };
/// assert_eq!(
///     combined_output(&output),
///     "checking for OS\nnginx version: nginx/1.5.11"
/// );
/// # }
/// ```
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_owned(),
        (out, "") => out.to_owned(),
        (out, err) => format!("{out}\n{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{failure_output, output_with};
    use rstest::rstest;

    #[rstest]
    #[case::stdout_only("built", "", "built")]
    #[case::stderr_only("", "warning: deprecated", "warning: deprecated")]
    #[case::both("a\n", "b\n", "a\nb")]
    #[case::neither("", "", "")]
    fn combined_output_joins_streams(
        #[case] stdout: &str,
        #[case] stderr: &str,
        #[case] expected: &str,
    ) {
        let output = output_with(0, stdout, stderr);
        assert_eq!(combined_output(&output), expected);
    }

    #[test]
    fn combined_output_keeps_failure_text() {
        let output = failure_output("make: *** [all] Error 2");
        assert_eq!(combined_output(&output), "make: *** [all] Error 2");
    }

    #[test]
    fn invocation_display_joins_arguments() {
        let invocation = Invocation::new("./config").args(["no-shared", "--prefix=/out"]);
        assert_eq!(invocation.to_string(), "./config no-shared --prefix=/out");
        assert!(invocation.working_dir().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_captures_both_streams() {
        let executor = SystemCommandExecutor::default();
        let output = executor
            .run(&Invocation::new("sh").args(["-c", "echo out; echo err >&2"]))
            .expect("run sh");
        assert!(output.status.success());
        assert_eq!(combined_output(&output), "out\nerr");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_with_timeout_captures_output() {
        let executor = SystemCommandExecutor::with_timeout(Duration::from_secs(10));
        let output = executor
            .run(&Invocation::new("sh").args(["-c", "echo done; exit 3"]))
            .expect("run sh");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(combined_output(&output), "done");
    }

    #[test]
    fn system_executor_timeout_is_optional() {
        assert_eq!(SystemCommandExecutor::default().timeout(), None);
        assert_eq!(
            SystemCommandExecutor::with_timeout(Duration::from_secs(90)).timeout(),
            Some(Duration::from_secs(90))
        );
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_kills_tool_after_timeout() {
        let executor = SystemCommandExecutor::with_timeout(Duration::from_millis(100));
        let err = executor
            .run(&Invocation::new("sleep").arg("5"))
            .expect_err("expected timeout");
        assert!(matches!(err, ForgeError::Timeout { ref command, .. } if command == "sleep 5"));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_honours_working_dir() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        let executor = SystemCommandExecutor::default();
        let output = executor
            .run(&Invocation::new("pwd").current_dir(dir.clone()))
            .expect("run pwd");
        let reported = String::from_utf8_lossy(&output.stdout);
        assert!(reported.trim().ends_with(dir.file_name().unwrap_or_default()));
    }
}
