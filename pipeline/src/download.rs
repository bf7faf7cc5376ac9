//! Per-platform artifact download.
//!
//! The release job fetches each platform's package through a downloader and
//! records the local path in `package_paths.env`, one path per line. The
//! file is the hand-off between the downloads and the consolidation step, so
//! paths are written and read back verbatim.

use crate::artifact::{ArtifactError, ArtifactName, ArtifactStore};
use crate::descriptor::{DescriptorError, PackageDescriptor};
use crate::platform::PlatformTarget;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use thiserror::Error;

/// Filename of the accumulated path list.
pub const PACKAGE_PATHS_FILE: &str = "package_paths.env";

/// Errors arising while downloading a platform's artifacts.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// An artifact could not be fetched from the store.
    #[error("failed to download {platform} artifacts: {source}")]
    Artifact {
        /// The platform being downloaded.
        platform: PlatformTarget,
        /// The underlying store error.
        #[source]
        source: ArtifactError,
    },

    /// The downloaded descriptor is unusable.
    #[error("downloaded descriptor for {platform} is unusable: {source}")]
    Descriptor {
        /// The platform being downloaded.
        platform: PlatformTarget,
        /// The underlying descriptor error.
        #[source]
        source: DescriptorError,
    },

    /// A path cannot be recorded on a single line.
    #[error("cannot record path {path:?} in {PACKAGE_PATHS_FILE}: it contains a line break")]
    UnrepresentablePath {
        /// The rejected path.
        path: String,
    },

    /// The path list could not be read or written.
    #[error("failed to access {path}: {source}")]
    PathsFile {
        /// The path list.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`DownloadError`].
pub type Result<T> = std::result::Result<T, DownloadError>;

/// The `package_paths.env` list of downloaded package paths.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use msquic_pipeline::download::PackagePathsFile;
///
/// let file = PackagePathsFile::new("downloads/package_paths.env");
/// file.append(Utf8Path::new("downloads/ios/msquic-v2.0.0_ios.tar.gz"))?;
/// assert_eq!(file.read()?.len(), 1);
/// # Ok::<(), msquic_pipeline::download::DownloadError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePathsFile {
    path: Utf8PathBuf,
}

impl PackagePathsFile {
    /// Refer to the list at `path`; the file is created on first append.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Refer to `<dir>/package_paths.env`.
    #[must_use]
    pub fn in_dir(dir: &Utf8Path) -> Self {
        Self::new(dir.join(PACKAGE_PATHS_FILE))
    }

    /// Return the list's location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Append one path as its own line.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnrepresentablePath`] if the path contains a
    /// line break, or [`DownloadError::PathsFile`] on I/O failure.
    pub fn append(&self, package: &Utf8Path) -> Result<()> {
        let line = package.as_str();
        if line.contains(['\n', '\r']) {
            return Err(DownloadError::UnrepresentablePath {
                path: line.to_owned(),
            });
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(self.io_error())?;
        writeln!(file, "{line}").map_err(self.io_error())
    }

    /// Read the recorded paths, skipping blank lines.
    ///
    /// A missing file reads as an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PathsFile`] if the file exists but cannot be
    /// read.
    pub fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(self.io_error())?;
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Remove the list so a new run starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PathsFile`] if an existing file cannot be
    /// removed.
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(self.io_error())?;
        }
        Ok(())
    }

    fn io_error(&self) -> impl FnOnce(std::io::Error) -> DownloadError + '_ {
        move |source| DownloadError::PathsFile {
            path: self.path.clone(),
            source,
        }
    }
}

/// Retrieves one platform's package and records where it landed.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformArtifactDownloader: Send + Sync {
    /// Download `platform`'s package under `dest` and append its local path
    /// to `paths_file`. Returns the local path.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the artifacts cannot be fetched, the
    /// descriptor is unusable, or the path list cannot be written.
    fn download(
        &self,
        platform: PlatformTarget,
        dest: &Utf8Path,
        paths_file: &PackagePathsFile,
    ) -> Result<Utf8PathBuf>;
}

/// A downloader backed by an [`ArtifactStore`].
///
/// The package name is not known up front, so the platform's descriptor
/// artifact (`<platform>.env`) is fetched first and its `PACKAGE_NAME`
/// selects the package artifact.
pub struct StoreArtifactDownloader<'a> {
    store: &'a dyn ArtifactStore,
}

impl<'a> StoreArtifactDownloader<'a> {
    /// Create a downloader reading from `store`.
    pub fn new(store: &'a dyn ArtifactStore) -> Self {
        Self { store }
    }
}

impl PlatformArtifactDownloader for StoreArtifactDownloader<'_> {
    fn download(
        &self,
        platform: PlatformTarget,
        dest: &Utf8Path,
        paths_file: &PackagePathsFile,
    ) -> Result<Utf8PathBuf> {
        let artifact_error = |source| DownloadError::Artifact { platform, source };
        let descriptor_error = |source| DownloadError::Descriptor { platform, source };
        let platform_dir = dest.join(platform.as_str());

        let descriptor_path = self
            .store
            .download(&ArtifactName::descriptor(platform), &platform_dir.join("descriptor"))
            .map_err(artifact_error)?;
        let descriptor = PackageDescriptor::read(&descriptor_path).map_err(descriptor_error)?;
        let package_name = descriptor.package_name().map_err(descriptor_error)?;

        let package = self
            .store
            .download(&ArtifactName::package(&package_name), &platform_dir)
            .map_err(artifact_error)?;
        paths_file.append(&package)?;
        debug!("{platform}: downloaded {package}");
        Ok(package)
    }
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
