//! Classification of the ref that triggered a run.

use std::fmt;

/// Substring that marks a version-tag ref.
pub const DEFAULT_TAG_MARKER: &str = "tags/v";

const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_PREFIX: &str = "refs/heads/";

/// The fully-qualified ref of a push, e.g. `refs/tags/v2.0.0`.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::git_ref::{DEFAULT_TAG_MARKER, GitRef};
///
/// let tag = GitRef::new("refs/tags/v1.2.3");
/// assert!(tag.is_release_tag(DEFAULT_TAG_MARKER));
/// assert_eq!(tag.tag_name(), Some("v1.2.3"));
///
/// let branch = GitRef::new("refs/heads/main");
/// assert!(!branch.is_release_tag(DEFAULT_TAG_MARKER));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitRef(String);

impl GitRef {
    /// Wrap a ref string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the ref as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ref contains the release marker substring.
    ///
    /// This is a plain substring test, so `refs/tags/v1` and
    /// `refs/heads/tags/v1` both qualify while `refs/tags/1.0` does not.
    #[must_use]
    pub fn is_release_tag(&self, marker: &str) -> bool {
        !marker.is_empty() && self.0.contains(marker)
    }

    /// Whether the ref names a tag.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAG_PREFIX)
    }

    /// Return the short tag name for tag refs.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        self.0.strip_prefix(TAG_PREFIX).filter(|name| !name.is_empty())
    }

    /// Return the short branch name for branch refs.
    #[must_use]
    pub fn branch_name(&self) -> Option<&str> {
        self.0
            .strip_prefix(BRANCH_PREFIX)
            .filter(|name| !name.is_empty())
    }

    /// Return the name a release for this ref is published under.
    ///
    /// Tags and branches lose their `refs/...` prefix; any other ref is
    /// used verbatim.
    #[must_use]
    pub fn release_tag(&self) -> &str {
        self.tag_name()
            .or_else(|| self.branch_name())
            .unwrap_or(&self.0)
    }
}

impl From<&str> for GitRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::version_tag("refs/tags/v1.2.3", true)]
    #[case::prerelease_tag("refs/tags/v2.0.0-rc.1", true)]
    #[case::main("refs/heads/main", false)]
    #[case::unversioned_tag("refs/tags/nightly", false)]
    #[case::numeric_tag("refs/tags/1.0.0", false)]
    #[case::branch_named_like_tag("refs/heads/tags/v1", true)]
    fn release_marker_is_a_substring_test(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(GitRef::new(value).is_release_tag(DEFAULT_TAG_MARKER), expected);
    }

    #[test]
    fn empty_marker_never_matches() {
        assert!(!GitRef::new("refs/tags/v1").is_release_tag(""));
    }

    #[test]
    fn short_names() {
        assert_eq!(GitRef::new("refs/tags/v2.0.0").tag_name(), Some("v2.0.0"));
        assert_eq!(GitRef::new("refs/heads/main").tag_name(), None);
        assert_eq!(GitRef::new("refs/heads/main").branch_name(), Some("main"));
        assert_eq!(GitRef::new("refs/tags/").tag_name(), None);
        assert!(GitRef::new("refs/tags/v1").is_tag());
    }

    #[rstest]
    #[case::tag("refs/tags/v2.0.0", "v2.0.0")]
    #[case::branch_named_like_tag("refs/heads/tags/v3", "tags/v3")]
    #[case::other_namespace("refs/pull/7/tags/v1", "refs/pull/7/tags/v1")]
    fn release_tag_strips_the_ref_namespace(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(GitRef::new(value).release_tag(), expected);
    }
}
