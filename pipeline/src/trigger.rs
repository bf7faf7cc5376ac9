//! Push-event filtering.
//!
//! The workflow fires on every push except those whose changes are confined
//! to documentation. Filter patterns use the hosted CI's glob dialect, where
//! `*` stays within one path segment and `**` crosses segments; they are
//! translated to [`glob::Pattern`]s matched with a literal separator.

use crate::git_ref::GitRef;
use glob::{MatchOptions, Pattern};
use log::debug;
use thiserror::Error;

/// The default `paths-ignore` list.
pub const DEFAULT_PATHS_IGNORE: &[&str] = &["doc/**", "**.md", "LICENSE", "NOTICE"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A filter pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path filter \"{pattern}\": {reason}")]
pub struct PathFilterError {
    /// The rejected pattern.
    pub pattern: String,
    /// Description of the syntax error.
    pub reason: String,
}

/// A push event: the ref that moved and the paths it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// The pushed ref.
    pub git_ref: GitRef,
    /// Repository-relative paths changed by the push.
    pub changed_paths: Vec<String>,
}

impl PushEvent {
    /// Create a push event.
    pub fn new(git_ref: impl Into<GitRef>, changed_paths: Vec<String>) -> Self {
        Self {
            git_ref: git_ref.into(),
            changed_paths,
        }
    }
}

/// Whether a push starts the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The workflow runs.
    Triggered,
    /// Every changed path matched an ignore pattern.
    Ignored,
}

impl TriggerDecision {
    /// Whether the workflow runs.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered)
    }
}

/// Compiled `paths-ignore` patterns.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::trigger::{PathFilter, PushEvent};
///
/// let filter = PathFilter::default_ignore();
/// let docs_only = PushEvent::new("refs/heads/main", vec!["README.md".to_owned()]);
/// assert!(!filter.evaluate(&docs_only).is_triggered());
///
/// let code = PushEvent::new("refs/heads/main", vec!["run.py".to_owned()]);
/// assert!(filter.evaluate(&code).is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<(String, Pattern)>,
}

impl PathFilter {
    /// Compile a list of hosted-CI filter patterns.
    ///
    /// # Errors
    ///
    /// Returns [`PathFilterError`] for the first pattern that fails to compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PathFilterError> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                Pattern::new(&translate(raw))
                    .map(|compiled| (raw.to_owned(), compiled))
                    .map_err(|e| PathFilterError {
                        pattern: raw.to_owned(),
                        reason: e.msg.to_owned(),
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// The default documentation-only filter.
    #[must_use]
    pub fn default_ignore() -> Self {
        let patterns = DEFAULT_PATHS_IGNORE
            .iter()
            .filter_map(|raw| Pattern::new(&translate(raw)).ok().map(|p| ((*raw).to_owned(), p)))
            .collect();
        Self { patterns }
    }

    /// Whether `path` matches any ignore pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        self.patterns
            .iter()
            .any(|(_, pattern)| pattern.matches_with(path, MATCH_OPTIONS))
    }

    /// Decide whether a push starts the workflow.
    ///
    /// Tag pushes always trigger because path filters are not evaluated for
    /// tags. A push with no reported paths triggers. Otherwise the workflow
    /// is skipped only when every changed path is ignored.
    #[must_use]
    pub fn evaluate(&self, event: &PushEvent) -> TriggerDecision {
        if event.git_ref.is_tag() {
            debug!("{} is a tag push; path filters do not apply", event.git_ref);
            return TriggerDecision::Triggered;
        }
        if event.changed_paths.is_empty() {
            return TriggerDecision::Triggered;
        }
        match event.changed_paths.iter().find(|p| !self.is_ignored(p)) {
            Some(path) => {
                debug!("{path} is not ignored; workflow triggers");
                TriggerDecision::Triggered
            }
            None => TriggerDecision::Ignored,
        }
    }
}

/// Rewrite a hosted-CI pattern into [`glob::Pattern`] syntax.
///
/// A segment that starts with `**` followed by more text (`**.md`) means
/// "any path ending in that text", which the glob crate spells `**/*.md`.
fn translate(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment.strip_prefix("**") {
            Some(rest) if !rest.is_empty() => format!("**/*{rest}"),
            _ => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn filter() -> PathFilter {
        PathFilter::default_ignore()
    }

    fn push(git_ref: &str, paths: &[&str]) -> PushEvent {
        PushEvent::new(git_ref, paths.iter().map(|p| (*p).to_owned()).collect())
    }

    #[rstest]
    #[case::root_markdown("README.md", true)]
    #[case::nested_markdown("doc/guide/setup.md", true)]
    #[case::deep_markdown("a/b/c/CHANGES.md", true)]
    #[case::doc_tree("doc/images/arch.png", true)]
    #[case::license("LICENSE", true)]
    #[case::notice("NOTICE", true)]
    #[case::nested_license("third_party/LICENSE", false)]
    #[case::script("run.py", false)]
    #[case::version_file("VERSION", false)]
    #[case::workflow(".github/workflows/build.yml", false)]
    #[case::doc_prefix_only("docs/readme.txt", false)]
    #[case::markdown_like("notes.mdx", false)]
    fn default_ignore_patterns(filter: PathFilter, #[case] path: &str, #[case] ignored: bool) {
        assert_eq!(filter.is_ignored(path), ignored, "{path}");
    }

    #[rstest]
    fn docs_only_push_to_main_is_ignored(filter: PathFilter) {
        let event = push("refs/heads/main", &["README.md"]);
        assert_eq!(filter.evaluate(&event), TriggerDecision::Ignored);
    }

    #[rstest]
    fn mixed_push_triggers(filter: PathFilter) {
        let event = push("refs/heads/main", &["README.md", "VERSION"]);
        assert!(filter.evaluate(&event).is_triggered());
    }

    #[rstest]
    fn tag_push_ignores_path_filters(filter: PathFilter) {
        let event = push("refs/tags/v2.0.0", &["README.md"]);
        assert!(filter.evaluate(&event).is_triggered());
    }

    #[rstest]
    fn push_without_paths_triggers(filter: PathFilter) {
        let event = push("refs/heads/feature", &[]);
        assert!(filter.evaluate(&event).is_triggered());
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        let filter = PathFilter::new(&["doc/*"]).expect("valid");
        assert!(filter.is_ignored("doc/a.txt"));
        assert!(!filter.is_ignored("doc/sub/a.txt"));
    }

    #[test]
    fn invalid_patterns_are_reported() {
        let err = PathFilter::new(&["doc/[unclosed"]).expect_err("must reject");
        assert_eq!(err.pattern, "doc/[unclosed");
    }

    #[rstest]
    #[case::leading_recursive("**.md", "**/*.md")]
    #[case::trailing_recursive("doc/**", "doc/**")]
    #[case::plain("LICENSE", "LICENSE")]
    #[case::nested("src/**.rs", "src/**/*.rs")]
    fn translates_recursive_suffix_segments(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(translate(raw), expected);
    }
}
