//! Tests for CLI parsing.

use super::*;
use crate::config::ENV_REF;
use clap::CommandFactory;
use rstest::rstest;

fn parse<const N: usize>(args: [&str; N]) -> Result<Cli, clap::Error> {
    temp_env::with_var_unset(ENV_REF, || {
        Cli::try_parse_from(std::iter::once("msquic-pipeline").chain(args))
    })
}

#[test]
fn check_trigger_collects_changed_paths() {
    let cli = parse([
        "check-trigger",
        "--ref",
        "refs/heads/main",
        "--changed",
        "README.md",
        "--changed",
        "doc/a.md",
    ])
    .expect("parse");
    let Command::CheckTrigger(args) = cli.command else {
        panic!("expected check-trigger");
    };
    assert_eq!(args.git_ref, "refs/heads/main");
    assert_eq!(args.changed, ["README.md", "doc/a.md"]);
}

#[rstest]
#[case::windows("windows_x86_64", PlatformTarget::WindowsX86_64)]
#[case::ubuntu("ubuntu-20.04_x86_64", PlatformTarget::Ubuntu2004X86_64)]
#[case::android("android", PlatformTarget::Android)]
fn build_parses_platform(#[case] raw: &str, #[case] expected: PlatformTarget) {
    let cli = parse(["build", raw]).expect("parse");
    assert!(matches!(cli.command, Command::Build(BuildArgs { platform }) if platform == expected));
}

#[test]
fn help_lists_every_platform_by_its_matrix_name() {
    let help = Cli::command().render_long_help().to_string();
    let listed = help
        .lines()
        .skip_while(|line| *line != "PLATFORMS:")
        .nth(1)
        .expect("platform line");
    let names: Vec<&str> = listed.split_whitespace().collect();
    let expected: Vec<&str> = PlatformTarget::all().iter().map(|p| p.as_str()).collect();
    assert_eq!(names, expected);
    for name in names {
        assert!(parse(["build", name]).is_ok(), "{name} should parse");
    }
}

#[test]
fn build_rejects_unknown_platforms() {
    let err = parse(["build", "freebsd"]).expect_err("must reject");
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn extract_defaults_to_current_directory() {
    let cli = parse(["extract", "ios"]).expect("parse");
    let Command::Extract(args) = cli.command else {
        panic!("expected extract");
    };
    assert_eq!(args.source, Utf8PathBuf::from("."));
    assert!(!args.no_upload);
}

#[test]
fn global_flags_follow_the_subcommand() {
    let cli = parse([
        "release",
        "--ref",
        "refs/tags/v2.0.0",
        "--dry-run",
        "--quiet",
        "--config",
        "ci.toml",
    ])
    .expect("parse");
    assert!(cli.quiet);
    assert_eq!(cli.config, Some(Utf8PathBuf::from("ci.toml")));
    assert!(matches!(cli.command, Command::Release(ReleaseArgs { dry_run: true, .. })));
}

#[test]
fn ref_is_required_without_the_environment() {
    let err = parse(["release"]).expect_err("must require --ref");
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn ref_falls_back_to_the_environment() {
    let cli = temp_env::with_var(ENV_REF, Some("refs/tags/v9.9.9"), || {
        Cli::try_parse_from(["msquic-pipeline", "run"])
    })
    .expect("parse");
    let Command::Run(args) = cli.command else {
        panic!("expected run");
    };
    assert_eq!(args.git_ref, "refs/tags/v9.9.9");
    assert!(args.changed.is_empty());
    assert!(!args.dry_run);
}
