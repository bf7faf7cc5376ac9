//! A single platform build job.
//!
//! Every platform runs the same five steps in its own job directory:
//! checkout, toolchain dependencies, packaging, extraction, upload. A failed
//! step ends the job; there are no retries.

use crate::artifact::ArtifactStore;
use crate::config::{PackagingConfig, SourceConfig};
use crate::descriptor::PackageName;
use crate::error::{PipelineError, Result};
use crate::executor::{CommandExecutor, CommandSpec, failure_message};
use crate::extractor::{self, Extraction};
use crate::matrix::CancellationFlag;
use crate::platform::PlatformTarget;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fmt;

/// The steps of a platform job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStep {
    /// Clone the sources and check out the revision.
    Checkout,
    /// Install platform toolchain dependencies.
    Dependencies,
    /// Run the packaging tool.
    Package,
    /// Read the descriptor and validate the package.
    Extract,
    /// Upload the package and descriptor artifacts.
    Upload,
}

impl JobStep {
    /// Every step in execution order.
    pub const ALL: [Self; 5] = [
        Self::Checkout,
        Self::Dependencies,
        Self::Package,
        Self::Extract,
        Self::Upload,
    ];

    /// Return the step label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Dependencies => "dependencies",
            Self::Package => "package",
            Self::Extract => "extract",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a platform job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Every step succeeded.
    Success {
        /// The package the job uploaded.
        package_name: PackageName,
    },
    /// A step failed.
    Failure {
        /// The failing step.
        step: JobStep,
        /// The diagnostic.
        message: String,
    },
    /// The job was cancelled before `step` started.
    Cancelled {
        /// The first step that did not run.
        step: JobStep,
    },
}

/// The terminal state of one platform's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// The platform built.
    pub platform: PlatformTarget,
    /// How the job ended.
    pub status: JobStatus,
}

impl JobOutcome {
    /// Whether every step succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Success { .. })
    }

    /// Whether a step failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.status, JobStatus::Failure { .. })
    }

    /// Whether the job was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, JobStatus::Cancelled { .. })
    }

    /// Return the uploaded package name for successful jobs.
    #[must_use]
    pub fn package_name(&self) -> Option<&PackageName> {
        match &self.status {
            JobStatus::Success { package_name } => Some(package_name),
            _ => None,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            JobStatus::Success { package_name } => {
                write!(f, "{}: success ({package_name})", self.platform)
            }
            JobStatus::Failure { step, message } => {
                write!(f, "{}: failed at {step}: {message}", self.platform)
            }
            JobStatus::Cancelled { step } => {
                write!(f, "{}: cancelled before {step}", self.platform)
            }
        }
    }
}

/// Everything a platform job needs, shared by all jobs of a matrix.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    /// Where to clone from and what to check out. A local repository path
    /// must be absolute; see [`PipelineConfig::resolve_paths`].
    ///
    /// [`PipelineConfig::resolve_paths`]: crate::config::PipelineConfig::resolve_paths
    pub source: &'a SourceConfig,
    /// How to invoke the packaging tool.
    pub packaging: &'a PackagingConfig,
    /// Parent of the per-platform job directories. Must be absolute, since
    /// every command runs with a job directory as its working directory.
    pub jobs_dir: &'a Utf8Path,
    /// Runs git, installers, and the packaging tool.
    pub executor: &'a dyn CommandExecutor,
    /// Receives the uploaded artifacts.
    pub store: &'a dyn ArtifactStore,
}

impl fmt::Debug for JobContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("source", self.source)
            .field("packaging", self.packaging)
            .field("jobs_dir", &self.jobs_dir)
            .finish_non_exhaustive()
    }
}

impl JobContext<'_> {
    /// Return the isolated working directory of `platform`'s job.
    #[must_use]
    pub fn job_dir(&self, platform: PlatformTarget) -> Utf8PathBuf {
        self.jobs_dir.join(platform.as_str())
    }

    /// Return where `platform`'s sources are checked out.
    #[must_use]
    pub fn source_dir(&self, platform: PlatformTarget) -> Utf8PathBuf {
        self.job_dir(platform).join("source")
    }

    /// Run every step for `platform`.
    ///
    /// `cancel` is checked before each step; once set, the job stops and
    /// reports the step it did not start.
    #[must_use]
    pub fn run(&self, platform: PlatformTarget, cancel: &CancellationFlag) -> JobOutcome {
        info!("{platform}: job started in {}", self.job_dir(platform));
        let status = match self.run_steps(platform, cancel) {
            Ok(extraction) => JobStatus::Success {
                package_name: extraction.package_name,
            },
            Err(StepError::Cancelled(step)) => JobStatus::Cancelled { step },
            Err(StepError::Failed(step, err)) => JobStatus::Failure {
                step,
                message: err.to_string(),
            },
        };
        let outcome = JobOutcome { platform, status };
        info!("{outcome}");
        outcome
    }

    fn run_steps(
        &self,
        platform: PlatformTarget,
        cancel: &CancellationFlag,
    ) -> std::result::Result<Extraction, StepError> {
        let guard = |step: JobStep| {
            if cancel.is_cancelled() {
                Err(StepError::Cancelled(step))
            } else {
                debug!("{platform}: {step}");
                Ok(())
            }
        };
        let failed = |step: JobStep| move |err: PipelineError| StepError::Failed(step, err);

        guard(JobStep::Checkout)?;
        let source = self
            .checkout(platform)
            .map_err(failed(JobStep::Checkout))?;
        guard(JobStep::Dependencies)?;
        self.install_dependencies(platform)
            .map_err(failed(JobStep::Dependencies))?;
        guard(JobStep::Package)?;
        self.package(platform, &source)
            .map_err(failed(JobStep::Package))?;
        guard(JobStep::Extract)?;
        let extraction = extractor::extract(&source, self.packaging, platform)
            .map_err(failed(JobStep::Extract))?;
        guard(JobStep::Upload)?;
        extractor::upload(&extraction, self.store).map_err(failed(JobStep::Upload))?;
        Ok(extraction)
    }

    /// Clone the sources into a fresh job directory and check out the
    /// configured revision.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Checkout`] if either git command fails.
    pub fn checkout(&self, platform: PlatformTarget) -> Result<Utf8PathBuf> {
        let job_dir = self.job_dir(platform);
        let source = self.source_dir(platform);
        if job_dir.exists() {
            std::fs::remove_dir_all(&job_dir)?;
        }
        std::fs::create_dir_all(&job_dir)?;

        let checkout_error = |message: String| PipelineError::Checkout { platform, message };
        let clone = CommandSpec::new("git")
            .args(["clone", "--quiet", self.source.repository.as_str(), source.as_str()])
            .current_dir(&job_dir);
        self.run_command(&clone).map_err(checkout_error)?;

        let checkout = CommandSpec::new("git")
            .args(["-C", source.as_str(), "checkout", "--quiet", "--force"])
            .args([self.source.revision.as_str()])
            .current_dir(&job_dir);
        self.run_command(&checkout).map_err(checkout_error)?;
        Ok(source)
    }

    /// Install the platform's toolchain dependencies, if it has any.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DependencyInstall`] naming the first
    /// dependency that fails.
    pub fn install_dependencies(&self, platform: PlatformTarget) -> Result<()> {
        let job_dir = self.job_dir(platform);
        for dependency in platform.dependencies() {
            debug!("{platform}: installing {}", dependency.name);
            let spec = CommandSpec::new(dependency.program)
                .args(dependency.args.iter().copied())
                .current_dir(&job_dir);
            self.run_command(&spec)
                .map_err(|message| PipelineError::DependencyInstall {
                    platform,
                    tool: dependency.name,
                    message,
                })?;
        }
        Ok(())
    }

    /// Run the packaging tool for `platform` in `source`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Packaging`] if the tool cannot be started,
    /// times out, or exits unsuccessfully.
    pub fn package(&self, platform: PlatformTarget, source: &Utf8Path) -> Result<()> {
        let spec = CommandSpec::new(platform.interpreter())
            .args([self.packaging.script.as_str(), "--package", platform.as_str()])
            .current_dir(source);
        self.run_command(&spec)
            .map_err(|message| PipelineError::Packaging { platform, message })
    }

    fn run_command(&self, spec: &CommandSpec) -> std::result::Result<(), String> {
        let output = self.executor.run(spec).map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(format!("{spec}: {}", failure_message(&output)))
        }
    }
}

enum StepError {
    Cancelled(JobStep),
    Failed(JobStep, PipelineError),
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
