//! Release gating.
//!
//! A release runs only when the triggering ref contains the tag marker and
//! every build job it depends on succeeded. A failed or cancelled build job
//! blocks the release whatever the ref.

use crate::git_ref::GitRef;
use crate::matrix::JobResult;
use crate::platform::BuildJob;
use std::fmt;

/// Whether the release step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Publish a release under `tag`.
    Release {
        /// The release tag name.
        tag: String,
    },
    /// Skip the release step.
    Skip(SkipReason),
}

impl GateDecision {
    /// Whether the release step runs.
    #[must_use]
    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release { .. })
    }
}

/// Why the release step was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// At least one build job did not succeed.
    UpstreamNotSuccessful {
        /// The build jobs that did not succeed, with their results.
        jobs: Vec<(BuildJob, JobResult)>,
    },
    /// The ref does not contain the tag marker.
    NotATag {
        /// The triggering ref.
        git_ref: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamNotSuccessful { jobs } => {
                f.write_str("build jobs did not succeed:")?;
                for (job, result) in jobs {
                    write!(f, " {job}={result}")?;
                }
                Ok(())
            }
            Self::NotATag { git_ref } => write!(f, "{git_ref} is not a release tag"),
        }
    }
}

/// Decide whether to release.
///
/// Every build job must be present in `results` with
/// [`JobResult::Success`]. The tag name is the ref's short name.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::git_ref::{DEFAULT_TAG_MARKER, GitRef};
/// use msquic_pipeline::matrix::JobResult;
/// use msquic_pipeline::platform::BuildJob;
/// use msquic_pipeline::release::gate::{GateDecision, evaluate};
///
/// let results: Vec<_> = BuildJob::ALL.into_iter().map(|j| (j, JobResult::Success)).collect();
/// let decision = evaluate(&GitRef::new("refs/tags/v2.0.0"), DEFAULT_TAG_MARKER, &results);
/// assert_eq!(decision, GateDecision::Release { tag: "v2.0.0".to_owned() });
/// ```
#[must_use]
pub fn evaluate(git_ref: &GitRef, marker: &str, results: &[(BuildJob, JobResult)]) -> GateDecision {
    let unsuccessful: Vec<_> = BuildJob::ALL
        .into_iter()
        .map(|job| {
            let result = results
                .iter()
                .find(|(j, _)| *j == job)
                .map_or(JobResult::Skipped, |(_, r)| *r);
            (job, result)
        })
        .filter(|(_, result)| *result != JobResult::Success)
        .collect();
    if !unsuccessful.is_empty() {
        return GateDecision::Skip(SkipReason::UpstreamNotSuccessful { jobs: unsuccessful });
    }

    if !git_ref.is_release_tag(marker) {
        return GateDecision::Skip(SkipReason::NotATag {
            git_ref: git_ref.to_string(),
        });
    }

    GateDecision::Release {
        tag: git_ref.release_tag().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_ref::DEFAULT_TAG_MARKER;
    use rstest::rstest;

    fn all(result: JobResult) -> Vec<(BuildJob, JobResult)> {
        BuildJob::ALL.into_iter().map(|job| (job, result)).collect()
    }

    #[rstest]
    #[case::version_tag("refs/tags/v1.0.0", true)]
    #[case::main("refs/heads/main", false)]
    #[case::plain_tag("refs/tags/latest", false)]
    fn ref_decides_when_builds_succeed(#[case] git_ref: &str, #[case] releases: bool) {
        let decision = evaluate(
            &GitRef::new(git_ref),
            DEFAULT_TAG_MARKER,
            &all(JobResult::Success),
        );
        assert_eq!(decision.is_release(), releases);
    }

    #[rstest]
    #[case::windows(BuildJob::Windows, JobResult::Failure)]
    #[case::macos(BuildJob::Macos, JobResult::Cancelled)]
    #[case::ubuntu(BuildJob::Ubuntu, JobResult::Failure)]
    fn any_unsuccessful_build_job_blocks_release(
        #[case] job: BuildJob,
        #[case] result: JobResult,
    ) {
        let mut results = all(JobResult::Success);
        for entry in &mut results {
            if entry.0 == job {
                entry.1 = result;
            }
        }
        let decision = evaluate(&GitRef::new("refs/tags/v2.0.0"), DEFAULT_TAG_MARKER, &results);
        assert_eq!(
            decision,
            GateDecision::Skip(SkipReason::UpstreamNotSuccessful {
                jobs: vec![(job, result)]
            })
        );
    }

    #[test]
    fn missing_build_jobs_count_as_skipped() {
        let results = vec![(BuildJob::Windows, JobResult::Success)];
        let decision = evaluate(&GitRef::new("refs/tags/v2.0.0"), DEFAULT_TAG_MARKER, &results);
        let GateDecision::Skip(reason) = decision else {
            panic!("expected skip");
        };
        assert_eq!(
            reason.to_string(),
            "build jobs did not succeed: build-macos=skipped build-ubuntu=skipped"
        );
    }

    #[test]
    fn branch_refs_containing_the_marker_use_the_branch_name() {
        let decision = evaluate(
            &GitRef::new("refs/heads/tags/v3"),
            DEFAULT_TAG_MARKER,
            &all(JobResult::Success),
        );
        assert_eq!(
            decision,
            GateDecision::Release {
                tag: "tags/v3".to_owned()
            }
        );
    }

    #[test]
    fn not_a_tag_reason_names_the_ref() {
        let decision = evaluate(
            &GitRef::new("refs/heads/main"),
            DEFAULT_TAG_MARKER,
            &all(JobResult::Success),
        );
        assert_eq!(
            decision,
            GateDecision::Skip(SkipReason::NotATag {
                git_ref: "refs/heads/main".to_owned()
            })
        );
    }
}
