//! Output formatting for the pipeline CLI.
//!
//! Progress and summaries go to stderr; stdout and the step output file are
//! reserved for machine-readable values.

use crate::matrix::MatrixReport;
use crate::release::{GateDecision, PublishedRelease};
use crate::workflow::WorkflowRun;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format the matrix outcomes, one line per platform followed by one line
/// per build job and its runner image.
#[must_use]
pub fn matrix_summary(report: &MatrixReport) -> String {
    let mut lines: Vec<String> = report
        .outcomes()
        .iter()
        .map(|outcome| format!("  {outcome}"))
        .collect();
    lines.extend(
        report
            .job_results()
            .into_iter()
            .map(|(job, result)| format!("  {job} on {}: {result}", job.runner())),
    );
    lines.join("\n")
}

/// Format a published release.
///
/// # Example
///
/// ```
/// use msquic_pipeline::output::release_summary;
/// use msquic_pipeline::release::PublishedRelease;
///
/// let release = PublishedRelease {
///     tag: "v2.0.0".to_owned(),
///     url: "https://example.test/releases/v2.0.0".to_owned(),
///     assets: vec!["msquic-v2.0.0_android.tar.gz".to_owned()],
/// };
/// let text = release_summary(&release);
/// assert!(text.starts_with("Released v2.0.0"));
/// assert!(text.contains("  - msquic-v2.0.0_android.tar.gz"));
/// ```
#[must_use]
pub fn release_summary(release: &PublishedRelease) -> String {
    let mut lines = vec![format!("Released {} at {}", release.tag, release.url)];
    lines.extend(release.assets.iter().map(|asset| format!("  - {asset}")));
    lines.join("\n")
}

/// Format the end of a workflow run.
#[must_use]
pub fn run_summary(run: &WorkflowRun) -> String {
    let mut lines = vec![
        "Build results:".to_owned(),
        matrix_summary(run.report()),
    ];
    match run.gate() {
        Some(GateDecision::Skip(reason)) => lines.push(format!("Release skipped: {reason}")),
        Some(GateDecision::Release { tag }) => match (run.release(), run.failure()) {
            (Some(release), _) => lines.push(release_summary(release)),
            (None, Some(failure)) => lines.push(format!("Release {tag} failed: {failure}")),
            (None, None) => lines.push(format!("Release {tag} did not complete")),
        },
        None => {}
    }
    let path: Vec<String> = run.path().iter().map(ToString::to_string).collect();
    lines.push(format!("Workflow: {}", path.join(" -> ")));
    lines.push(format!("Conclusion: {}", run.conclusion()));
    lines.join("\n")
}

/// What a dry-run release would publish.
#[derive(Debug)]
pub struct DryRunRelease<'a> {
    /// The release tag.
    pub tag: &'a str,
    /// The target repository, when known.
    pub repository: Option<&'a str>,
    /// The consolidated asset paths.
    pub files: &'a [String],
}

impl DryRunRelease<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no release will be published".to_owned(),
            String::new(),
            format!("Tag: {}", self.tag),
            format!(
                "Repository: {}",
                self.repository.unwrap_or("(not configured)")
            ),
            String::new(),
            "Assets:".to_owned(),
        ];
        lines.extend(self.files.iter().map(|file| format!("  - {file}")));
        lines.join("\n")
    }
}
