//! Error types for the pipeline.
//!
//! Each variant names the platform or input involved so a failed job's log
//! line is enough to locate the problem. Module-level errors convert into
//! [`PipelineError`] at the orchestration layer.

use crate::artifact::ArtifactError;
use crate::config::ConfigError;
use crate::descriptor::DescriptorError;
use crate::download::DownloadError;
use crate::job::JobOutcome;
use crate::package::PackageError;
use crate::platform::PlatformTarget;
use crate::release::ReleaseError;
use crate::step_output::StepOutputError;
use crate::trigger::PathFilterError;
use crate::workflow::{Conclusion, WorkflowState};
use thiserror::Error;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Cloning or checking out the source failed.
    #[error("checkout failed for {platform}: {message}")]
    Checkout {
        /// The platform whose job failed.
        platform: PlatformTarget,
        /// Description of the failure.
        message: String,
    },

    /// A toolchain dependency could not be installed.
    #[error("failed to install {tool} for {platform}: {message}")]
    DependencyInstall {
        /// The platform whose job failed.
        platform: PlatformTarget,
        /// Name of the dependency.
        tool: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The packaging tool exited unsuccessfully.
    #[error("packaging failed for {platform}: {message}")]
    Packaging {
        /// The platform whose job failed.
        platform: PlatformTarget,
        /// Description of the failure.
        message: String,
    },

    /// The package descriptor is missing, malformed, or unusable.
    #[error("descriptor error for {platform}: {source}")]
    Descriptor {
        /// The platform whose descriptor was read.
        platform: PlatformTarget,
        /// The underlying descriptor error.
        #[source]
        source: DescriptorError,
    },

    /// The package named by the descriptor is missing or unreadable.
    #[error("package error for {platform}: {source}")]
    Package {
        /// The platform whose package was inspected.
        platform: PlatformTarget,
        /// The underlying package error.
        #[source]
        source: PackageError,
    },

    /// An artifact upload or download failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// A platform's artifacts could not be retrieved.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The release step failed.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A path filter pattern is invalid.
    #[error(transparent)]
    PathFilter(#[from] PathFilterError),

    /// Writing a step output failed.
    #[error(transparent)]
    StepOutput(#[from] StepOutputError),

    /// The workflow attempted a transition its state machine forbids.
    #[error("illegal workflow transition from {from} to {to}")]
    IllegalTransition {
        /// The state the workflow was in.
        from: WorkflowState,
        /// The state it attempted to enter.
        to: WorkflowState,
    },

    /// A platform job did not succeed.
    #[error("build job did not succeed: {outcome}")]
    JobFailed {
        /// The job's outcome.
        outcome: JobOutcome,
    },

    /// A workflow run ended without success.
    #[error("workflow run concluded {conclusion}")]
    RunFailed {
        /// How the run concluded.
        conclusion: Conclusion,
    },

    /// A release was requested for a ref that is not a version tag.
    #[error("{git_ref} is not a release ref; expected it to contain \"{marker}\"")]
    NotAReleaseRef {
        /// The ref supplied.
        git_ref: String,
        /// The marker the ref must contain.
        marker: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
