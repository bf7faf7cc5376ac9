//! Unit tests for configuration loading.

use super::*;
use crate::test_utils::utf8;
use rstest::rstest;

#[rstest]
fn defaults_match_the_workflow() {
    let config = PipelineConfig::default();

    assert_eq!(config.source.revision, "HEAD");
    assert_eq!(config.packaging.script, "run.py");
    assert_eq!(config.packaging.package_dir, "_package");
    assert_eq!(config.packaging.configuration, "release");
    assert_eq!(config.packaging.descriptor, "msquic.env");
    assert_eq!(config.packaging.timeout(), DEFAULT_TIMEOUT);
    assert_eq!(config.trigger.tag_marker, "tags/v");
    assert_eq!(
        config.trigger.paths_ignore,
        ["doc/**", "**.md", "LICENSE", "NOTICE"]
    );
    assert!(!config.matrix.fail_fast);
    assert!(config.release.repository.is_none());
}

#[rstest]
fn deserialises_partial_overrides() {
    let source = concat!(
        "[source]\nrepository = \"https://example.test/msquic-build.git\"\n\n",
        "[packaging]\ntimeout_minutes = 30\n\n",
        "[release]\nrepository = \"octo/msquic-build\"\ndraft = true\n",
    );

    let config = PipelineConfig::from_toml(source).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(config.source.repository, "https://example.test/msquic-build.git");
    assert_eq!(config.source.revision, "HEAD");
    assert_eq!(config.packaging.timeout(), Duration::from_secs(1800));
    assert_eq!(config.packaging.script, "run.py");
    assert_eq!(config.release.repository.as_deref(), Some("octo/msquic-build"));
    assert!(config.release.draft);
}

#[rstest]
#[case::top_level("unknown = 1\n")]
#[case::nested("[matrix]\nfail_fats = true\n")]
fn rejects_unknown_keys(#[case] source: &str) {
    assert!(PipelineConfig::from_toml(source).is_err());
}

#[rstest]
#[case::zero_timeout("[packaging]\ntimeout_minutes = 0\n", "packaging.timeout_minutes")]
#[case::empty_marker("[trigger]\ntag_marker = \"\"\n", "trigger.tag_marker")]
#[case::blank_script("[packaging]\nscript = \" \"\n", "packaging.script")]
fn validation_names_the_bad_field(#[case] source: &str, #[case] expected: &str) {
    let config = PipelineConfig::from_toml(source).expect("parses");
    match config.validate() {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
        other => panic!("expected invalid {expected}, got {other:?}"),
    }
}

#[test]
fn load_reads_an_explicit_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = utf8(dir.path()).join("pipeline.toml");
    std::fs::write(&path, "[workspace]\nroot = \"/tmp/ws\"\n").expect("write");

    let config = PipelineConfig::load(Some(&path)).expect("load");
    assert_eq!(config.workspace.root, Utf8PathBuf::from("/tmp/ws"));
    assert_eq!(config.workspace.artifacts_dir(), Utf8PathBuf::from("/tmp/ws/artifacts"));
}

#[test]
fn load_reports_a_missing_explicit_file() {
    let err = PipelineConfig::load(Some(Utf8Path::new("/definitely/absent.toml")))
        .expect_err("must fail");
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn load_reports_parse_errors_with_the_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = utf8(dir.path()).join("pipeline.toml");
    std::fs::write(&path, "[matrix\n").expect("write");

    let err = PipelineConfig::load(Some(&path)).expect_err("must fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("pipeline.toml"));
}

#[test]
fn host_environment_reads_ci_variables() {
    temp_env::with_vars(
        [
            (ENV_SHA, Some("0123abc")),
            (ENV_OUTPUT, Some("/tmp/out")),
            (ENV_REPOSITORY, Some("octo/msquic-build")),
            (ENV_TOKEN, Some("   ")),
        ],
        || {
            let env = HostEnvironment::from_env();
            assert_eq!(env.sha.as_deref(), Some("0123abc"));
            assert_eq!(env.output, Some(Utf8PathBuf::from("/tmp/out")));
            assert_eq!(env.repository.as_deref(), Some("octo/msquic-build"));
            assert_eq!(env.token, None);
        },
    );
}

#[test]
fn environment_overrides_revision_and_release_repository() {
    let mut config = PipelineConfig::default();
    let env = HostEnvironment {
        sha: Some("0123abc".to_owned()),
        repository: Some("octo/msquic-build".to_owned()),
        ..HostEnvironment::default()
    };

    config.apply_environment(&env);
    assert_eq!(config.source.revision, "0123abc");
    assert_eq!(config.release.repository.as_deref(), Some("octo/msquic-build"));
}

#[test]
fn output_dir_follows_the_packaging_layout() {
    let packaging = PackagingConfig::default();
    assert_eq!(
        packaging.output_dir(Utf8Path::new("/src"), "ios"),
        Utf8PathBuf::from("/src/_package/ios/release")
    );
}

#[test]
fn default_paths_resolve_against_the_base_directory() {
    let mut config = PipelineConfig::default();
    config.resolve_paths(Utf8Path::new("/work/msquic"));

    assert_eq!(
        config.workspace.root,
        Utf8PathBuf::from("/work/msquic/target/msquic-pipeline")
    );
    assert_eq!(
        config.workspace.jobs_dir(),
        Utf8PathBuf::from("/work/msquic/target/msquic-pipeline/jobs")
    );
    assert_eq!(config.source.repository, "/work/msquic");
}

#[rstest]
#[case::https("https://github.com/microsoft/msquic.git")]
#[case::file_url("file:///srv/git/msquic.git")]
#[case::scp_style("git@github.com:microsoft/msquic.git")]
#[case::absolute("/srv/git/msquic")]
fn remote_and_absolute_repositories_are_left_alone(#[case] repository: &str) {
    let mut config = PipelineConfig::default();
    config.source.repository = repository.to_owned();
    config.workspace.root = Utf8PathBuf::from("/var/lib/pipeline");

    config.resolve_paths(Utf8Path::new("/work/msquic"));
    assert_eq!(config.source.repository, repository);
    assert_eq!(config.workspace.root, Utf8PathBuf::from("/var/lib/pipeline"));
}

#[rstest]
#[case::sibling("../msquic-build", "/work/msquic/../msquic-build")]
#[case::nested("./vendor/msquic", "/work/msquic/vendor/msquic")]
fn relative_repositories_are_anchored(#[case] repository: &str, #[case] expected: &str) {
    let mut config = PipelineConfig::default();
    config.source.repository = repository.to_owned();

    config.resolve_paths(Utf8Path::new("/work/msquic"));
    assert_eq!(config.source.repository, expected);
}

#[rstest]
#[case::https("https://example.test/msquic.git", false)]
#[case::scp_style("git@example.test:msquic.git", false)]
#[case::dot(".", true)]
#[case::windows_drive("C:\\src\\msquic", true)]
fn local_repository_detection(#[case] repository: &str, #[case] local: bool) {
    let source = SourceConfig {
        repository: repository.to_owned(),
        ..SourceConfig::default()
    };
    assert_eq!(source.is_local(), local);
}
