//! nginx-forge CLI entrypoint.
//!
//! Loads settings, runs the build pipeline, and prints the JSON result on
//! stdout. Progress is logged to stderr.

use clap::Parser;
use nginx_forge::cli::Cli;
use nginx_forge::config::load_settings;
use nginx_forge::error::Result;
use nginx_forge::orchestrator::ensure_built;
use nginx_forge::outcome::BuildOutcome;
use nginx_forge::output::{render_failure, render_outcome, write_line};
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level());
    let mut stdout = std::io::stdout();
    let exit_code = report(run(&cli), &mut stdout);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// `RUST_LOG` wins over the verbosity flags when set.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .is_err()
    {
        // A subscriber is already installed.
    }
}

fn run(cli: &Cli) -> Result<BuildOutcome> {
    let settings = load_settings(cli.config_path(), cli.overrides())?;
    log::debug!("resolved settings: {settings:?}");
    ensure_built(&settings, cli.dry_run)
}

fn report(result: Result<BuildOutcome>, stdout: &mut dyn Write) -> i32 {
    match result.and_then(|outcome| render_outcome(&outcome)) {
        Ok(json) => {
            write_line(stdout, json);
            0
        }
        Err(err) => {
            log::error!("{err}");
            write_line(stdout, render_failure(&err));
            1
        }
    }
}
