//! The end-to-end workflow.
//!
//! A triggered run builds every platform, waits for all of them, and then
//! either releases or stops. [`WorkflowRun`] records the states it passed
//! through; moves outside the table in
//! [`WorkflowState::can_transition_to`] are rejected as internal errors.

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::download::StoreArtifactDownloader;
use crate::error::{PipelineError, Result};
use crate::executor::CommandExecutor;
use crate::git_ref::GitRef;
use crate::job::{JobContext, JobOutcome};
use crate::matrix::{JobResult, MatrixReport, MatrixStrategy, run_matrix};
use crate::platform::{BuildJob, PlatformTarget};
use crate::release::{
    self, GateDecision, PublishedRelease, ReleaseError, ReleasePublisher, ReleaseRequest,
};
use crate::trigger::{PathFilter, PushEvent, TriggerDecision};
use log::{info, warn};
use std::fmt;

/// Where a workflow run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// A push event passed the trigger filter.
    Triggered,
    /// Platform jobs are running.
    Building,
    /// Every platform job is terminal.
    AllBuildsComplete,
    /// The release step is running.
    Releasing,
    /// A release was published.
    Released,
    /// The run ended without publishing.
    Done,
}

impl WorkflowState {
    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Triggered, Self::Building)
                | (Self::Building, Self::AllBuildsComplete)
                | (Self::AllBuildsComplete, Self::Releasing | Self::Done)
                | (Self::Releasing, Self::Released | Self::Done)
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Triggered => "Triggered",
            Self::Building => "Building",
            Self::AllBuildsComplete => "AllBuildsComplete",
            Self::Releasing => "Releasing",
            Self::Released => "Released",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished run is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// A release was published.
    Released,
    /// Every build succeeded and the ref is not a release tag.
    Built,
    /// A build or the release step failed.
    Failed,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Released => "released",
            Self::Built => "built",
            Self::Failed => "failed",
        })
    }
}

/// The record of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    path: Vec<WorkflowState>,
    report: MatrixReport,
    gate: Option<GateDecision>,
    package_paths: Vec<String>,
    release: Option<PublishedRelease>,
    failure: Option<String>,
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self {
            path: vec![WorkflowState::Triggered],
            report: MatrixReport::default(),
            gate: None,
            package_paths: Vec::new(),
            release: None,
            failure: None,
        }
    }
}

impl WorkflowRun {
    /// Start a run in [`WorkflowState::Triggered`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.path
            .last()
            .copied()
            .unwrap_or(WorkflowState::Triggered)
    }

    /// Every state entered so far, in order.
    #[must_use]
    pub fn path(&self) -> &[WorkflowState] {
        &self.path
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] if the state machine
    /// does not allow the move.
    pub fn transition(&mut self, next: WorkflowState) -> Result<()> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition { from, to: next });
        }
        info!("workflow: {from} -> {next}");
        self.path.push(next);
        Ok(())
    }

    /// The matrix outcomes.
    #[must_use]
    pub fn report(&self) -> &MatrixReport {
        &self.report
    }

    /// Every platform's outcome, in matrix order.
    #[must_use]
    pub fn outcomes(&self) -> &[JobOutcome] {
        self.report.outcomes()
    }

    /// The build-job results the release gate saw.
    #[must_use]
    pub fn job_results(&self) -> Vec<(BuildJob, JobResult)> {
        self.report.job_results()
    }

    /// The release gate's decision, once made.
    #[must_use]
    pub fn gate(&self) -> Option<&GateDecision> {
        self.gate.as_ref()
    }

    /// The consolidated package paths, when the release step got that far.
    #[must_use]
    pub fn package_paths(&self) -> &[String] {
        &self.package_paths
    }

    /// The published release.
    #[must_use]
    pub fn release(&self) -> Option<&PublishedRelease> {
        self.release.as_ref()
    }

    /// Why the release step failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Summarise the run.
    #[must_use]
    pub fn conclusion(&self) -> Conclusion {
        if self.release.is_some() {
            Conclusion::Released
        } else if self.failure.is_some() || !self.report.all_succeeded() {
            Conclusion::Failed
        } else {
            Conclusion::Built
        }
    }
}

/// Drives a run against injected collaborators.
#[derive(Clone, Copy)]
pub struct Workflow<'a> {
    config: &'a PipelineConfig,
    executor: &'a dyn CommandExecutor,
    store: &'a dyn ArtifactStore,
    publisher: &'a dyn ReleasePublisher,
}

impl fmt::Debug for Workflow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Workflow<'a> {
    /// Create a workflow.
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        executor: &'a dyn CommandExecutor,
        store: &'a dyn ArtifactStore,
        publisher: &'a dyn ReleasePublisher,
    ) -> Self {
        Self {
            config,
            executor,
            store,
            publisher,
        }
    }

    /// Apply the configured path filter to `event`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PathFilter`] for an invalid pattern.
    pub fn trigger(&self, event: &PushEvent) -> Result<TriggerDecision> {
        let filter = PathFilter::new(self.config.trigger.paths_ignore.as_slice())?;
        Ok(filter.evaluate(event))
    }

    /// Run every platform job, then release if the gate allows it.
    ///
    /// Release failures end the run in [`WorkflowState::Done`] with
    /// [`WorkflowRun::failure`] set; nothing is published.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] only if the state
    /// machine is driven out of order.
    pub fn run(&self, git_ref: &GitRef) -> Result<WorkflowRun> {
        let mut run = WorkflowRun::new();
        run.transition(WorkflowState::Building)?;

        let jobs_dir = self.config.workspace.jobs_dir();
        let context = JobContext {
            source: &self.config.source,
            packaging: &self.config.packaging,
            jobs_dir: &jobs_dir,
            executor: self.executor,
            store: self.store,
        };
        let strategy = MatrixStrategy {
            fail_fast: self.config.matrix.fail_fast,
        };
        run.report = run_matrix(PlatformTarget::all(), strategy, |platform, cancel| {
            context.run(platform, cancel)
        });
        run.transition(WorkflowState::AllBuildsComplete)?;

        let decision = release::evaluate(
            git_ref,
            &self.config.trigger.tag_marker,
            &run.report.job_results(),
        );
        run.gate = Some(decision.clone());
        let GateDecision::Release { tag } = decision else {
            if let Some(GateDecision::Skip(reason)) = &run.gate {
                info!("release skipped: {reason}");
            }
            run.transition(WorkflowState::Done)?;
            return Ok(run);
        };

        run.transition(WorkflowState::Releasing)?;
        match self.release(&tag, &mut run.package_paths) {
            Ok(published) => {
                run.release = Some(published);
                run.transition(WorkflowState::Released)?;
            }
            Err(err) => {
                warn!("release {tag} failed: {err}");
                run.failure = Some(err.to_string());
                run.transition(WorkflowState::Done)?;
            }
        }
        Ok(run)
    }

    fn release(
        &self,
        tag: &str,
        paths: &mut Vec<String>,
    ) -> std::result::Result<PublishedRelease, ReleaseError> {
        let downloader = StoreArtifactDownloader::new(self.store);
        *paths = release::aggregate(&downloader, &self.config.workspace.downloads_dir())?;
        let request = ReleaseRequest {
            draft: self.config.release.draft,
            ..ReleaseRequest::new(tag, paths.clone())
        };
        Ok(self.publisher.publish(&request)?)
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
