//! Package descriptor (`msquic.env`) parsing.
//!
//! The packaging tool records the filename of the package it produced in a
//! small `KEY=VALUE` file next to the package. Later stages read the
//! `PACKAGE_NAME` entry to find the package without having to know how the
//! tool names its archives.
//!
//! The same rules apply on every platform: blank lines and `#` comments are
//! skipped, Windows line endings are tolerated, and a missing or unusable
//! `PACKAGE_NAME` is a hard error rather than an empty name.

use crate::package::PackageFormat;
use camino::Utf8Path;
use std::fmt;
use std::fs;
use thiserror::Error;

/// The descriptor filename written by the packaging tool.
pub const DESCRIPTOR_FILE_NAME: &str = "msquic.env";

/// Key holding the package filename.
pub const PACKAGE_NAME_KEY: &str = "PACKAGE_NAME";

/// Key holding the package MIME type.
pub const CONTENT_TYPE_KEY: &str = "CONTENT_TYPE";

/// Errors arising from reading or validating a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A non-blank, non-comment line is not a `KEY=VALUE` pair.
    #[error("descriptor line {line_number} is not a KEY=VALUE pair: \"{line}\"")]
    MalformedLine {
        /// 1-based line number.
        line_number: usize,
        /// The offending line, trimmed.
        line: String,
    },

    /// The descriptor has no `PACKAGE_NAME` entry.
    #[error("descriptor has no PACKAGE_NAME entry")]
    MissingPackageName,

    /// `PACKAGE_NAME` is present but cannot name an artifact.
    #[error("invalid PACKAGE_NAME \"{value}\": {reason}")]
    InvalidPackageName {
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The descriptor file could not be read.
    #[error("failed to read descriptor {path}: {reason}")]
    Read {
        /// Path of the descriptor.
        path: String,
        /// Description of the I/O error.
        reason: String,
    },
}

/// Result type alias using [`DescriptorError`].
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// A validated package filename taken from `PACKAGE_NAME`.
///
/// The name is a bare filename: non-empty, free of path separators, and not
/// `.` or `..`, so it can be used both as an artifact key and as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the archive format implied by the extension, if recognised.
    #[must_use]
    pub fn format(&self) -> Option<PackageFormat> {
        PackageFormat::from_file_name(&self.0)
    }
}

impl TryFrom<&str> for PackageName {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self> {
        let reason = if value.is_empty() {
            Some("value is empty")
        } else if value.contains(['/', '\\']) {
            Some("value contains a path separator")
        } else if value == "." || value == ".." {
            Some("value is a relative directory reference")
        } else if value.chars().any(char::is_control) {
            Some("value contains control characters")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(DescriptorError::InvalidPackageName {
                value: value.to_owned(),
                reason,
            }),
            None => Ok(Self(value.to_owned())),
        }
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parsed contents of a descriptor file.
///
/// Entries keep their first-seen order; a repeated key takes the last value,
/// as it would when the file is sourced by a shell.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::descriptor::PackageDescriptor;
///
/// let descriptor = PackageDescriptor::parse(
///     "\nCONTENT_TYPE=application/gzip\nPACKAGE_NAME=msquic-v2.4.8_ios.tar.gz\n\n",
/// )
/// .expect("well-formed descriptor");
/// let name = descriptor.package_name().expect("has a package name");
/// assert_eq!(name.as_str(), "msquic-v2.4.8_ios.tar.gz");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    entries: Vec<(String, String)>,
}

impl PackageDescriptor {
    /// Parse descriptor text.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MalformedLine`] for a line that is neither
    /// blank, a comment, nor a `KEY=VALUE` pair with a non-empty key.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut descriptor = Self::default();
        for (index, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(malformed(index, line));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(index, line));
            }
            descriptor.insert(key, unquote(value.trim()));
        }
        Ok(descriptor)
    }

    /// Read and parse the descriptor at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Read`] if the file cannot be read, or any
    /// error from [`Self::parse`].
    pub fn read(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| DescriptorError::Read {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&contents)
    }

    /// Set `key` to `value`, replacing any earlier value in place.
    pub fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => value.clone_into(&mut entry.1),
            None => self.entries.push((key.to_owned(), value.to_owned())),
        }
    }

    /// Return the raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return the validated `PACKAGE_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MissingPackageName`] when the key is absent
    /// and [`DescriptorError::InvalidPackageName`] when its value is empty or
    /// path-like.
    pub fn package_name(&self) -> Result<PackageName> {
        let value = self
            .get(PACKAGE_NAME_KEY)
            .ok_or(DescriptorError::MissingPackageName)?;
        PackageName::try_from(value)
    }

    /// Return the package format declared by `CONTENT_TYPE`, if recognised.
    #[must_use]
    pub fn content_type(&self) -> Option<PackageFormat> {
        self.get(CONTENT_TYPE_KEY)
            .and_then(PackageFormat::from_content_type)
    }

    /// Iterate over the entries in first-seen order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the descriptor as `KEY=VALUE` lines.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }
}

fn malformed(index: usize, line: &str) -> DescriptorError {
    DescriptorError::MalformedLine {
        line_number: index + 1,
        line: line.to_owned(),
    }
}

/// Strip one pair of surrounding double quotes.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("PACKAGE_NAME=pkg.tar.gz")]
    #[case::leading_blank("\n\nPACKAGE_NAME=pkg.tar.gz")]
    #[case::trailing_blank("PACKAGE_NAME=pkg.tar.gz\n\n\n")]
    #[case::whitespace_lines("  \n\t\nPACKAGE_NAME=pkg.tar.gz\n   \n")]
    #[case::crlf("\r\nCONTENT_TYPE=application/gzip\r\nPACKAGE_NAME=pkg.tar.gz\r\n\r\n")]
    #[case::comment("# written by run.py\nPACKAGE_NAME=pkg.tar.gz\n")]
    #[case::quoted("PACKAGE_NAME=\"pkg.tar.gz\"\n")]
    #[case::spaced(" PACKAGE_NAME = pkg.tar.gz \n")]
    fn extracts_package_name(#[case] contents: &str) {
        let descriptor = PackageDescriptor::parse(contents).expect("parse");
        let name = descriptor.package_name().expect("package name");
        assert_eq!(name.as_str(), "pkg.tar.gz");
    }

    #[test]
    fn reads_content_type() {
        let descriptor =
            PackageDescriptor::parse("CONTENT_TYPE=application/zip\nPACKAGE_NAME=a.zip\n")
                .expect("parse");
        assert_eq!(descriptor.content_type(), Some(PackageFormat::Zip));
        assert_eq!(
            descriptor.package_name().expect("name").format(),
            Some(PackageFormat::Zip)
        );
    }

    #[test]
    fn last_value_wins_for_repeated_keys() {
        let descriptor =
            PackageDescriptor::parse("PACKAGE_NAME=old.zip\nOTHER=1\nPACKAGE_NAME=new.zip\n")
                .expect("parse");
        assert_eq!(descriptor.get(PACKAGE_NAME_KEY), Some("new.zip"));
        let keys: Vec<&str> = descriptor.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["PACKAGE_NAME", "OTHER"]);
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let descriptor = PackageDescriptor::parse("EXTRA=a=b\n").expect("parse");
        assert_eq!(descriptor.get("EXTRA"), Some("a=b"));
    }

    #[rstest]
    #[case::no_separator("PACKAGE_NAME=a.zip\njunk\n", 2)]
    #[case::empty_key("\n=value\n", 2)]
    fn reports_malformed_lines(#[case] contents: &str, #[case] expected_line: usize) {
        let err = PackageDescriptor::parse(contents).expect_err("must reject");
        assert!(
            matches!(err, DescriptorError::MalformedLine { line_number, .. } if line_number == expected_line),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn missing_package_name_is_an_error() {
        let descriptor =
            PackageDescriptor::parse("CONTENT_TYPE=application/gzip\n").expect("parse");
        assert_eq!(
            descriptor.package_name(),
            Err(DescriptorError::MissingPackageName)
        );
    }

    #[rstest]
    #[case::empty("PACKAGE_NAME=")]
    #[case::empty_quotes("PACKAGE_NAME=\"\"")]
    #[case::unix_path("PACKAGE_NAME=../escape.tar.gz")]
    #[case::windows_path("PACKAGE_NAME=dir\\pkg.zip")]
    #[case::dot_dot("PACKAGE_NAME=..")]
    fn unusable_package_names_are_errors(#[case] contents: &str) {
        let descriptor = PackageDescriptor::parse(contents).expect("parse");
        let err = descriptor.package_name().expect_err("must reject");
        assert!(matches!(err, DescriptorError::InvalidPackageName { .. }));
    }

    #[test]
    fn render_writes_key_value_lines() {
        let mut descriptor = PackageDescriptor::default();
        descriptor.insert(CONTENT_TYPE_KEY, "application/gzip");
        descriptor.insert(PACKAGE_NAME_KEY, "pkg.tar.gz");
        assert_eq!(
            descriptor.render(),
            "CONTENT_TYPE=application/gzip\nPACKAGE_NAME=pkg.tar.gz\n"
        );
    }

    #[test]
    fn read_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = camino::Utf8PathBuf::try_from(dir.path().join(DESCRIPTOR_FILE_NAME))
            .expect("UTF-8 path");
        let err = PackageDescriptor::read(&path).expect_err("must fail");
        assert!(matches!(err, DescriptorError::Read { .. }));
    }
}
