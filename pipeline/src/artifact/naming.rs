//! Artifact naming policy.
//!
//! Package artifacts take the package filename verbatim so the name the
//! packaging tool chose survives into the release. Descriptor artifacts are
//! named `<platform>.env` so the release job can find a platform's
//! descriptor without knowing its package name.

use super::error::{ArtifactError, Result};
use crate::descriptor::PackageName;
use crate::platform::PlatformTarget;
use std::fmt;

const DESCRIPTOR_SUFFIX: &str = ".env";

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A package archive.
    Package,
    /// A platform's package descriptor.
    Descriptor,
}

/// A validated artifact name.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::artifact::{ArtifactKind, ArtifactName};
/// use msquic_pipeline::platform::PlatformTarget;
///
/// let name = ArtifactName::descriptor(PlatformTarget::Android);
/// assert_eq!(name.as_str(), "android.env");
/// assert_eq!(name.kind(), ArtifactKind::Descriptor);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    value: String,
    kind: ArtifactKind,
}

impl ArtifactName {
    /// Name the package artifact after its filename.
    #[must_use]
    pub fn package(name: &PackageName) -> Self {
        Self {
            value: name.as_str().to_owned(),
            kind: ArtifactKind::Package,
        }
    }

    /// Name the descriptor artifact for `platform`.
    #[must_use]
    pub fn descriptor(platform: PlatformTarget) -> Self {
        Self {
            value: platform.descriptor_artifact_name(),
            kind: ArtifactKind::Descriptor,
        }
    }

    /// Parse a stored name, classifying it by shape.
    ///
    /// `<platform>.env` for a known platform is a descriptor; any other
    /// bare filename is a package.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidName`] if `value` is empty, contains a
    /// path separator, or is a relative directory reference.
    pub fn parse(value: &str) -> Result<Self> {
        validate(value)?;
        let is_descriptor = value
            .strip_suffix(DESCRIPTOR_SUFFIX)
            .is_some_and(|stem| PlatformTarget::try_from(stem).is_ok());
        Ok(Self {
            value: value.to_owned(),
            kind: if is_descriptor {
                ArtifactKind::Descriptor
            } else {
                ArtifactKind::Package
            },
        })
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Return what the artifact holds.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

fn validate(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "name is empty"
    } else if value.contains(['/', '\\']) {
        "name contains a path separator"
    } else if value == "." || value == ".." {
        "name is a relative directory reference"
    } else if value.starts_with('.') {
        "name starts with a dot"
    } else {
        return Ok(());
    };
    Err(ArtifactError::InvalidName {
        value: value.to_owned(),
        reason,
    })
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn package_name_is_used_verbatim() {
        let package = PackageName::try_from("msquic-v2.0.0_windows_x86_64.zip").expect("valid");
        let name = ArtifactName::package(&package);
        assert_eq!(name.as_str(), "msquic-v2.0.0_windows_x86_64.zip");
        assert_eq!(name.kind(), ArtifactKind::Package);
    }

    #[test]
    fn descriptor_names_cover_every_platform() {
        let names: Vec<_> = PlatformTarget::ALL
            .into_iter()
            .map(|p| ArtifactName::descriptor(p).to_string())
            .collect();
        assert_eq!(
            names,
            [
                "windows_x86_64.env",
                "macos_arm64.env",
                "ios.env",
                "ubuntu-20.04_x86_64.env",
                "android.env",
            ]
        );
    }

    #[rstest]
    #[case::descriptor("ios.env", ArtifactKind::Descriptor)]
    #[case::unknown_env("solaris.env", ArtifactKind::Package)]
    #[case::package("msquic-v2.0.0_ios.tar.gz", ArtifactKind::Package)]
    fn parse_classifies_names(#[case] value: &str, #[case] kind: ArtifactKind) {
        assert_eq!(ArtifactName::parse(value).expect("valid").kind(), kind);
    }

    #[rstest]
    #[case::empty("")]
    #[case::nested("a/b")]
    #[case::windows_nested("a\\b")]
    #[case::parent("..")]
    #[case::hidden(".partial")]
    fn parse_rejects_unusable_names(#[case] value: &str) {
        assert!(matches!(
            ArtifactName::parse(value),
            Err(ArtifactError::InvalidName { .. })
        ));
    }
}
