//! Platform targets and the build jobs that group them.
//!
//! Only the five platforms of the build matrix are accepted. Any other name
//! is rejected at construction time with a descriptive error, so every later
//! stage can rely on a known runner image, interpreter, and package format.

use crate::package::PackageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A platform name was not one of the supported matrix entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported platform \"{value}\"; expected one of: {expected}")]
pub struct UnsupportedPlatform {
    /// The rejected platform string.
    pub value: String,
    /// Comma-separated list of accepted platform names.
    pub expected: String,
}

/// One named build configuration of the matrix.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::platform::{BuildJob, PlatformTarget};
///
/// let target: PlatformTarget = "android".parse().expect("known platform");
/// assert_eq!(target.build_job(), BuildJob::Ubuntu);
/// assert_eq!(target.package_extension(), ".tar.gz");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformTarget {
    /// 64-bit Windows, packaged as a zip archive.
    WindowsX86_64,
    /// Apple Silicon macOS.
    MacosArm64,
    /// iOS universal static library (device and simulator).
    Ios,
    /// Ubuntu 20.04 on x86-64.
    Ubuntu2004X86_64,
    /// Android arm64-v8a.
    Android,
}

impl PlatformTarget {
    /// Every platform in matrix order.
    pub const ALL: [Self; 5] = [
        Self::WindowsX86_64,
        Self::MacosArm64,
        Self::Ios,
        Self::Ubuntu2004X86_64,
        Self::Android,
    ];

    /// Return every platform in matrix order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &Self::ALL
    }

    /// Return the platform name as passed to the packaging tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WindowsX86_64 => "windows_x86_64",
            Self::MacosArm64 => "macos_arm64",
            Self::Ios => "ios",
            Self::Ubuntu2004X86_64 => "ubuntu-20.04_x86_64",
            Self::Android => "android",
        }
    }

    /// Return the build job this platform runs under.
    #[must_use]
    pub const fn build_job(self) -> BuildJob {
        match self {
            Self::WindowsX86_64 => BuildJob::Windows,
            Self::MacosArm64 | Self::Ios => BuildJob::Macos,
            Self::Ubuntu2004X86_64 | Self::Android => BuildJob::Ubuntu,
        }
    }

    /// Return the Python interpreter used to invoke the packaging tool.
    #[must_use]
    pub const fn interpreter(self) -> &'static str {
        match self {
            Self::WindowsX86_64 => "python",
            _ => "python3",
        }
    }

    /// Return the archive format the packaging tool produces.
    #[must_use]
    pub const fn package_format(self) -> PackageFormat {
        match self {
            Self::WindowsX86_64 => PackageFormat::Zip,
            _ => PackageFormat::TarGz,
        }
    }

    /// Return the package filename extension, including the leading dot.
    #[must_use]
    pub const fn package_extension(self) -> &'static str {
        self.package_format().extension()
    }

    /// Return the toolchain dependencies installed before packaging.
    ///
    /// Only Android needs extra tooling: a build generator and the SDK
    /// platform matching `ANDROID_PLATFORM=android-29`.
    #[must_use]
    pub fn dependencies(self) -> &'static [ToolchainDependency] {
        match self {
            Self::Android => ANDROID_DEPENDENCIES,
            _ => &[],
        }
    }

    /// Return the name of the descriptor artifact, `<platform>.env`.
    #[must_use]
    pub fn descriptor_artifact_name(self) -> String {
        format!("{}.env", self.as_str())
    }

    fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|target| target.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A tool that must be installed before a platform can be packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolchainDependency {
    /// Short label used in logs and errors.
    pub name: &'static str,
    /// Program to run.
    pub program: &'static str,
    /// Arguments passed to the program.
    pub args: &'static [&'static str],
}

const ANDROID_DEPENDENCIES: &[ToolchainDependency] = &[
    ToolchainDependency {
        name: "apt index",
        program: "sudo",
        args: &["apt-get", "update"],
    },
    ToolchainDependency {
        name: "ninja-build",
        program: "sudo",
        args: &["apt-get", "install", "-y", "ninja-build"],
    },
    ToolchainDependency {
        name: "android-sdk",
        program: "sdkmanager",
        args: &["--install", "platforms;android-29"],
    },
];

impl TryFrom<&str> for PlatformTarget {
    type Error = UnsupportedPlatform;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|target| target.as_str() == value)
            .ok_or_else(|| UnsupportedPlatform {
                value: value.to_owned(),
                expected: Self::supported_names(),
            })
    }
}

impl TryFrom<String> for PlatformTarget {
    type Error = UnsupportedPlatform;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl std::str::FromStr for PlatformTarget {
    type Err = UnsupportedPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<PlatformTarget> for String {
    fn from(value: PlatformTarget) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three build jobs the release job depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildJob {
    /// `build-windows`, on a Windows runner.
    Windows,
    /// `build-macos`, on an Apple Silicon runner.
    Macos,
    /// `build-ubuntu`, on an Ubuntu runner.
    Ubuntu,
}

impl BuildJob {
    /// Every build job in declaration order.
    pub const ALL: [Self; 3] = [Self::Windows, Self::Macos, Self::Ubuntu];

    /// Return the job identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "build-windows",
            Self::Macos => "build-macos",
            Self::Ubuntu => "build-ubuntu",
        }
    }

    /// Return the runner image the job executes on.
    #[must_use]
    pub const fn runner(self) -> &'static str {
        match self {
            Self::Windows => "windows-2019",
            Self::Macos => "macos-14",
            Self::Ubuntu => "ubuntu-20.04",
        }
    }

    /// Return the platforms in this job's matrix.
    #[must_use]
    pub fn platforms(self) -> Vec<PlatformTarget> {
        PlatformTarget::ALL
            .into_iter()
            .filter(|target| target.build_job() == self)
            .collect()
    }
}

impl fmt::Display for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
