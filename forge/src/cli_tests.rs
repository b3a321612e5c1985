//! Tests for CLI parsing and override mapping.

use super::*;
use rstest::rstest;

fn parse(args: &[&str]) -> Cli {
    temp_env::with_var_unset(CONFIG_ENV, || {
        Cli::parse_from(std::iter::once("nginx-forge").chain(args.iter().copied()))
    })
}

#[test]
fn cli_parses_defaults() {
    let cli = parse(&[]);
    assert!(cli.config.is_none());
    assert!(cli.nginx_version.is_none());
    assert!(cli.install_prefix.is_none());
    assert!(!cli.clean_after);
    assert!(!cli.dry_run);
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
    assert_eq!(cli.overrides(), RequestOverrides::default());
}

#[test]
fn cli_maps_every_override() {
    let cli = parse(&[
        "--nginx-version",
        "1.5.12",
        "--openssl-version",
        "1.0.1g",
        "--pcre-version",
        "8.35",
        "--install-prefix",
        "/opt/nginx",
        "-w",
        "/scratch",
        "-k",
        "/etc/keys.gpg",
        "--clean-after",
        "--tool-timeout",
        "600",
    ]);
    let overrides = cli.overrides();
    assert_eq!(overrides.nginx_version.as_deref(), Some("1.5.12"));
    assert_eq!(overrides.openssl_version.as_deref(), Some("1.0.1g"));
    assert_eq!(overrides.pcre_version.as_deref(), Some("8.35"));
    assert_eq!(overrides.install_prefix, Some(Utf8PathBuf::from("/opt/nginx")));
    assert_eq!(overrides.workspace_dir, Some(Utf8PathBuf::from("/scratch")));
    assert_eq!(overrides.keyring, Some(Utf8PathBuf::from("/etc/keys.gpg")));
    assert_eq!(overrides.clean_after, Some(true));
    assert_eq!(overrides.tool_timeout_secs, Some(600));
}

#[test]
fn config_path_comes_from_the_environment() {
    let cli = temp_env::with_var(CONFIG_ENV, Some("/etc/nginx-forge.toml"), || {
        Cli::parse_from(["nginx-forge"])
    });
    assert_eq!(cli.config_path(), Some(Utf8Path::new("/etc/nginx-forge.toml")));
}

#[test]
fn config_flag_beats_the_environment() {
    let cli = temp_env::with_var(CONFIG_ENV, Some("/etc/nginx-forge.toml"), || {
        Cli::parse_from(["nginx-forge", "--config", "./local.toml"])
    });
    assert_eq!(cli.config_path(), Some(Utf8Path::new("./local.toml")));
}

#[rstest]
#[case::default(&[], "info")]
#[case::verbose(&["-v"], "debug")]
#[case::very_verbose(&["-vv"], "trace")]
#[case::quiet(&["-q"], "error")]
fn log_level_follows_verbosity(#[case] args: &[&str], #[case] expected: &str) {
    assert_eq!(parse(args).log_level(), expected);
}

#[test]
fn quiet_conflicts_with_verbose() {
    let result = temp_env::with_var_unset(CONFIG_ENV, || {
        Cli::try_parse_from(["nginx-forge", "-q", "-v"])
    });
    assert!(result.is_err());
}

#[test]
fn dry_run_flag_is_parsed() {
    assert!(parse(&["--dry-run"]).dry_run);
}
