//! Two-stage native build of OpenSSL and nginx.
//!
//! The build is a short, fixed pipeline. Each stage is planned as a pure
//! value ([`StagePlan`]) and then executed step by step; the main stage is
//! only planned once the dependency stage has produced its output, so it
//! cannot start after a dependency failure.

use crate::error::{ForgeError, Result};
use crate::exec::{CommandExecutor, Invocation, combined_output};
use crate::request::{DEPENDENCY_LIBRARY, MAIN_BINARY};
use camino::{Utf8Path, Utf8PathBuf};

/// Modules and features compiled into the server.
const MAIN_FEATURE_FLAGS: &[&str] = &[
    "--with-http_ssl_module",
    "--with-http_spdy_module",
    "--with-file-aio",
    "--with-ipv6",
    "--with-http_gzip_static_module",
    "--with-http_stub_status_module",
    "--without-mail_pop3_module",
    "--without-mail_imap_module",
    "--without-mail_smtp_module",
];

/// Extracted source trees, one per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTrees {
    /// OpenSSL sources.
    pub openssl: Utf8PathBuf,
    /// PCRE sources.
    pub pcre: Utf8PathBuf,
    /// nginx sources.
    pub nginx: Utf8PathBuf,
}

/// Where build products go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    /// Install prefix for the server.
    pub install_prefix: Utf8PathBuf,
    /// Output directory of the OpenSSL build. Recreated on every build.
    pub dependency_build_dir: Utf8PathBuf,
}

/// A named build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Static OpenSSL build.
    Dependency,
    /// nginx build linked against the dependency stage output.
    Main,
}

impl Stage {
    /// Name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dependency => DEPENDENCY_LIBRARY,
            Self::Main => MAIN_BINARY,
        }
    }
}

/// The commands one stage runs, and what it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Stage being planned.
    pub stage: Stage,
    /// Directory emptied and recreated before the first step.
    pub reset_dir: Option<Utf8PathBuf>,
    /// Steps, run in order.
    pub steps: Vec<Invocation>,
    /// Path the stage produces on success.
    pub output: Utf8PathBuf,
}

/// Plan the static OpenSSL build into the layout's dependency directory.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use nginx_forge::sequencer::{BuildLayout, SourceTrees, plan_dependency_stage};
///
/// let trees = SourceTrees {
///     openssl: Utf8PathBuf::from("/ws/openssl-1.0.1f"),
///     pcre: Utf8PathBuf::from("/ws/pcre-8.34"),
///     nginx: Utf8PathBuf::from("/ws/nginx-1.5.11"),
/// };
/// let layout = BuildLayout {
///     install_prefix: Utf8PathBuf::from("/usr/local/nginx"),
///     dependency_build_dir: Utf8PathBuf::from("/ws/openssl-build"),
/// };
/// let plan = plan_dependency_stage(&trees, &layout);
/// assert_eq!(plan.steps.last().map(ToString::to_string).as_deref(), Some("make install_sw"));
/// assert_eq!(plan.output, "/ws/openssl-build");
/// ```
#[must_use]
pub fn plan_dependency_stage(trees: &SourceTrees, layout: &BuildLayout) -> StagePlan {
    let out = &layout.dependency_build_dir;
    let src = &trees.openssl;
    StagePlan {
        stage: Stage::Dependency,
        reset_dir: Some(out.clone()),
        steps: vec![
            Invocation::new("./config")
                .args([
                    format!("--prefix={out}"),
                    format!("--openssldir={out}"),
                    "no-shared".to_owned(),
                    "enable-ec_nistp_64_gcc_128".to_owned(),
                ])
                .current_dir(src.clone()),
            Invocation::new("make").current_dir(src.clone()),
            Invocation::new("make").arg("install_sw").current_dir(src.clone()),
        ],
        output: out.clone(),
    }
}

/// Plan the nginx build against `dependency_output`.
#[must_use]
pub fn plan_main_stage(
    trees: &SourceTrees,
    layout: &BuildLayout,
    dependency_output: &Utf8Path,
) -> StagePlan {
    let src = &trees.nginx;
    let configure = Invocation::new("./configure")
        .args([
            format!("--prefix={}", layout.install_prefix),
            format!("--with-cc-opt=-I{}", dependency_output.join("include")),
            format!("--with-ld-opt=-L{}", dependency_output.join("lib")),
            format!("--with-pcre={}", trees.pcre),
            format!("--with-openssl={}", trees.openssl),
        ])
        .args(MAIN_FEATURE_FLAGS.iter().copied())
        .current_dir(src.clone());
    StagePlan {
        stage: Stage::Main,
        reset_dir: None,
        steps: vec![
            configure,
            Invocation::new("make").current_dir(src.clone()),
            Invocation::new("make").arg("install").current_dir(src.clone()),
        ],
        output: layout.install_prefix.join("sbin").join(MAIN_BINARY),
    }
}

/// Runs the build stages through a [`CommandExecutor`].
pub struct BuildSequencer<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> BuildSequencer<'a> {
    /// Create a sequencer running tools through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Build OpenSSL, then nginx against it, and return the installed
    /// server path.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::BuildTool`] for the first step that exits
    /// unsuccessfully. Nothing already installed is rolled back.
    pub fn run(&self, trees: &SourceTrees, layout: &BuildLayout) -> Result<Utf8PathBuf> {
        let dependency = self.execute(&plan_dependency_stage(trees, layout))?;
        self.execute(&plan_main_stage(trees, layout, &dependency))
    }

    /// Run one planned stage and return its output path.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::BuildTool`] naming the stage and the failed
    /// step, or an I/O error if the reset directory cannot be recreated.
    pub fn execute(&self, plan: &StagePlan) -> Result<Utf8PathBuf> {
        let stage = plan.stage.name();
        log::info!("{stage} stage: starting");

        if let Some(dir) = &plan.reset_dir {
            reset_dir(dir)?;
        }

        for step in &plan.steps {
            log::debug!("{stage} stage: `{step}`");
            let output = self.executor.run(step)?;
            if !output.status.success() {
                return Err(ForgeError::BuildTool {
                    stage,
                    command: step.to_string(),
                    status: output.status,
                    output: combined_output(&output),
                });
            }
        }

        log::info!("{stage} stage: produced {}", plan.output);
        Ok(plan.output.clone())
    }
}

fn reset_dir(dir: &Utf8Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
