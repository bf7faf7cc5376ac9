//! Parallel execution of platform jobs.
//!
//! Every platform job runs on its own scoped thread and the runner returns
//! only once all of them are terminal, which is the barrier the release step
//! waits on. Under fail-fast, the first failure in a build job cancels that
//! build job's remaining platforms at their next step boundary; other build
//! jobs are unaffected.

use crate::job::JobOutcome;
use crate::platform::{BuildJob, PlatformTarget};
use log::{info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A flag jobs poll between steps to learn they should stop.
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a matrix reacts to a failing platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixStrategy {
    /// Cancel the build job's remaining platforms after the first failure.
    pub fail_fast: bool,
}

/// The aggregate result of a build job, as seen by jobs that depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// Every platform succeeded.
    Success,
    /// At least one platform failed.
    Failure,
    /// No platform failed but at least one was cancelled.
    Cancelled,
    /// None of the build job's platforms ran.
    Skipped,
}

impl JobResult {
    /// Return the result as the hosted CI spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcomes of one matrix run, in the order the platforms were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixReport {
    outcomes: Vec<JobOutcome>,
}

impl MatrixReport {
    /// Wrap a set of outcomes.
    #[must_use]
    pub fn new(outcomes: Vec<JobOutcome>) -> Self {
        Self { outcomes }
    }

    /// Return every outcome.
    #[must_use]
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    /// Return the outcome for `platform`, if it ran.
    #[must_use]
    pub fn outcome(&self, platform: PlatformTarget) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.platform == platform)
    }

    /// Return the aggregate result of `job`.
    #[must_use]
    pub fn job_result(&self, job: BuildJob) -> JobResult {
        let mut outcomes = self
            .outcomes
            .iter()
            .filter(|o| o.platform.build_job() == job)
            .peekable();
        if outcomes.peek().is_none() {
            return JobResult::Skipped;
        }
        let (mut failed, mut cancelled) = (false, false);
        for outcome in outcomes {
            failed |= outcome.is_failure();
            cancelled |= outcome.is_cancelled();
        }
        if failed {
            JobResult::Failure
        } else if cancelled {
            JobResult::Cancelled
        } else {
            JobResult::Success
        }
    }

    /// Return the result of every build job in declaration order.
    #[must_use]
    pub fn job_results(&self) -> Vec<(BuildJob, JobResult)> {
        BuildJob::ALL
            .into_iter()
            .map(|job| (job, self.job_result(job)))
            .collect()
    }

    /// Whether every build job succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.job_results()
            .iter()
            .all(|(_, result)| *result == JobResult::Success)
    }
}

/// One cancellation flag per build job.
#[derive(Debug, Default)]
struct BuildJobFlags {
    windows: CancellationFlag,
    macos: CancellationFlag,
    ubuntu: CancellationFlag,
}

impl BuildJobFlags {
    fn for_platform(&self, platform: PlatformTarget) -> &CancellationFlag {
        match platform.build_job() {
            BuildJob::Windows => &self.windows,
            BuildJob::Macos => &self.macos,
            BuildJob::Ubuntu => &self.ubuntu,
        }
    }
}

/// Run `job` for every platform concurrently and wait for all of them.
///
/// # Panics
///
/// Re-raises the panic of any job thread that panicked.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::descriptor::PackageName;
/// use msquic_pipeline::job::{JobOutcome, JobStatus};
/// use msquic_pipeline::matrix::{MatrixStrategy, run_matrix};
/// use msquic_pipeline::platform::PlatformTarget;
///
/// let report = run_matrix(PlatformTarget::all(), MatrixStrategy::default(), |platform, _| {
///     JobOutcome {
///         platform,
///         status: JobStatus::Success {
///             package_name: PackageName::try_from("pkg.tar.gz").expect("valid"),
///         },
///     }
/// });
/// assert!(report.all_succeeded());
/// ```
pub fn run_matrix<F>(platforms: &[PlatformTarget], strategy: MatrixStrategy, job: F) -> MatrixReport
where
    F: Fn(PlatformTarget, &CancellationFlag) -> JobOutcome + Sync,
{
    let flags = BuildJobFlags::default();
    info!(
        "running {} platform jobs (fail-fast: {})",
        platforms.len(),
        strategy.fail_fast
    );

    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = platforms
            .iter()
            .map(|&platform| {
                let flags = &flags;
                let job = &job;
                scope.spawn(move || {
                    let flag = flags.for_platform(platform);
                    let outcome = job(platform, flag);
                    if strategy.fail_fast && outcome.is_failure() {
                        warn!("{platform} failed; cancelling {}", platform.build_job());
                        flag.cancel();
                    }
                    outcome
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    });

    MatrixReport::new(outcomes)
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
