//! Unit tests for the workflow state machine.

use super::*;
use crate::artifact::LocalArtifactStore;
use crate::download::PackagePathsFile;
use crate::job::JobStep;
use crate::test_utils::{FakeExecutor, RecordingPublisher, fake_package_name, utf8};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    config: PipelineConfig,
    store: LocalArtifactStore,
}

impl Harness {
    fn run(&self, executor: &FakeExecutor, publisher: &RecordingPublisher, git_ref: &str) -> WorkflowRun {
        Workflow::new(&self.config, executor, &self.store, publisher)
            .run(&GitRef::new(git_ref))
            .expect("workflow run")
    }
}

#[fixture]
fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = utf8(dir.path());
    let mut config = PipelineConfig::default();
    config.workspace.root = root.join("work");
    let store = LocalArtifactStore::new(config.workspace.artifacts_dir());
    Harness {
        _dir: dir,
        config,
        store,
    }
}

#[rstest]
#[case::start(WorkflowState::Triggered, WorkflowState::Building)]
#[case::join(WorkflowState::Building, WorkflowState::AllBuildsComplete)]
#[case::gate_open(WorkflowState::AllBuildsComplete, WorkflowState::Releasing)]
#[case::gate_closed(WorkflowState::AllBuildsComplete, WorkflowState::Done)]
#[case::published(WorkflowState::Releasing, WorkflowState::Released)]
#[case::release_failed(WorkflowState::Releasing, WorkflowState::Done)]
fn legal_transitions(#[case] from: WorkflowState, #[case] to: WorkflowState) {
    assert!(from.can_transition_to(to));
}

#[rstest]
#[case::skip_builds(WorkflowState::Triggered, WorkflowState::Releasing)]
#[case::release_before_join(WorkflowState::Building, WorkflowState::Releasing)]
#[case::release_without_step(WorkflowState::AllBuildsComplete, WorkflowState::Released)]
#[case::after_release(WorkflowState::Released, WorkflowState::Done)]
#[case::after_done(WorkflowState::Done, WorkflowState::Building)]
fn illegal_transitions_are_errors(#[case] from: WorkflowState, #[case] to: WorkflowState) {
    assert!(!from.can_transition_to(to));

    let mut run = WorkflowRun {
        path: vec![from],
        ..WorkflowRun::new()
    };
    let err = run.transition(to).expect_err("must reject");
    assert_eq!(
        err.to_string(),
        format!("illegal workflow transition from {from} to {to}")
    );
    assert_eq!(run.state(), from);
}

#[rstest]
fn version_tag_with_all_builds_green_releases_five_files(harness: Harness) {
    let executor = FakeExecutor::new();
    let publisher = RecordingPublisher::new();

    let run = harness.run(&executor, &publisher, "refs/tags/v2.0.0");

    assert_eq!(
        run.path(),
        [
            WorkflowState::Triggered,
            WorkflowState::Building,
            WorkflowState::AllBuildsComplete,
            WorkflowState::Releasing,
            WorkflowState::Released,
        ]
    );
    assert_eq!(run.conclusion(), Conclusion::Released);
    let requests = publisher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tag, "v2.0.0");
    assert_eq!(requests[0].files.len(), 5);

    let release = run.release().expect("published");
    let expected: Vec<_> = PlatformTarget::all()
        .iter()
        .map(|&p| fake_package_name(p))
        .collect();
    assert_eq!(release.assets, expected);
}

#[rstest]
fn published_files_match_the_consolidated_paths_byte_for_byte(harness: Harness) {
    let executor = FakeExecutor::new();
    let publisher = RecordingPublisher::new();

    let run = harness.run(&executor, &publisher, "refs/tags/v2.0.0");

    let recorded = PackagePathsFile::in_dir(&harness.config.workspace.downloads_dir())
        .read()
        .expect("read paths");
    let requests = publisher.requests();
    assert_eq!(requests[0].files, recorded);
    assert_eq!(run.package_paths(), recorded.as_slice());
    for file in &requests[0].files {
        assert!(Utf8PathBuf::from(file).is_file(), "{file} should exist");
    }
}

#[rstest]
#[case::checkout(PlatformTarget::WindowsX86_64, JobStep::Checkout)]
#[case::dependencies(PlatformTarget::Android, JobStep::Dependencies)]
#[case::packaging(PlatformTarget::Ios, JobStep::Package)]
fn any_failed_platform_blocks_the_release(
    harness: Harness,
    #[case] platform: PlatformTarget,
    #[case] step: JobStep,
) {
    let executor = FakeExecutor::new().failing(platform, step);
    let publisher = RecordingPublisher::new();

    let run = harness.run(&executor, &publisher, "refs/tags/v2.0.0");

    assert_eq!(run.state(), WorkflowState::Done);
    assert!(!run.path().contains(&WorkflowState::Releasing));
    assert!(publisher.requests().is_empty());
    assert_eq!(run.conclusion(), Conclusion::Failed);
    assert!(matches!(run.gate(), Some(GateDecision::Skip(_))));
}

#[rstest]
fn a_bad_descriptor_fails_the_platform_and_blocks_the_release(harness: Harness) {
    let executor =
        FakeExecutor::new().with_descriptor(PlatformTarget::MacosArm64, "CONTENT_TYPE=application/gzip\n");
    let publisher = RecordingPublisher::new();

    let run = harness.run(&executor, &publisher, "refs/tags/v2.0.0");

    let outcome = run
        .report()
        .outcome(PlatformTarget::MacosArm64)
        .expect("macos outcome");
    assert!(outcome.is_failure());
    assert!(publisher.requests().is_empty());
}

#[rstest]
fn branch_pushes_build_but_do_not_release(harness: Harness) {
    let executor = FakeExecutor::new();
    let publisher = RecordingPublisher::new();

    let run = harness.run(&executor, &publisher, "refs/heads/main");

    assert_eq!(run.state(), WorkflowState::Done);
    assert!(run.report().all_succeeded());
    assert!(publisher.requests().is_empty());
    assert_eq!(run.conclusion(), Conclusion::Built);
}

#[rstest]
fn a_rejected_publish_ends_in_done_without_a_release(harness: Harness) {
    let executor = FakeExecutor::new();
    let publisher = RecordingPublisher::rejecting("403 Forbidden");

    let run = harness.run(&executor, &publisher, "refs/tags/v2.0.0");

    assert_eq!(run.state(), WorkflowState::Done);
    assert!(run.release().is_none());
    assert!(run.failure().is_some_and(|f| f.contains("403 Forbidden")));
    assert_eq!(run.conclusion(), Conclusion::Failed);
}

#[rstest]
fn readme_only_pushes_to_main_do_not_trigger(harness: Harness) {
    let executor = FakeExecutor::new();
    let publisher = RecordingPublisher::new();
    let workflow = Workflow::new(&harness.config, &executor, &harness.store, &publisher);

    let event = PushEvent::new("refs/heads/main", vec!["README.md".to_owned()]);
    assert_eq!(
        workflow.trigger(&event).expect("evaluate"),
        TriggerDecision::Ignored
    );

    let event = PushEvent::new("refs/heads/main", vec!["src/lib.rs".to_owned()]);
    assert!(workflow.trigger(&event).expect("evaluate").is_triggered());
}

#[rstest]
fn draft_configuration_reaches_the_publisher(mut harness: Harness) {
    harness.config.release.draft = true;
    let executor = FakeExecutor::new();
    let mut publisher = crate::release::publish::MockReleasePublisher::new();
    publisher
        .expect_publish()
        .withf(|request| request.draft && request.tag == "v2.0.0" && request.files.len() == 5)
        .times(1)
        .returning(|request| {
            Ok(PublishedRelease {
                tag: request.tag.clone(),
                url: "https://example.test/releases/v2.0.0".to_owned(),
                assets: Vec::new(),
            })
        });

    let run = Workflow::new(&harness.config, &executor, &harness.store, &publisher)
        .run(&GitRef::new("refs/tags/v2.0.0"))
        .expect("workflow run");
    assert_eq!(run.state(), WorkflowState::Released);
}
