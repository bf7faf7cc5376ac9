//! Package archive formats and inspection.
//!
//! The packaging tool emits a `.zip` on Windows and a gzip-compressed tar
//! everywhere else. Before a package is republished as an artifact the
//! extractor opens it here to make sure it is a readable, non-empty archive
//! of the expected format.

use camino::Utf8Path;
use log::{debug, warn};
use std::fs;
use std::io::Read;
use thiserror::Error;

/// Archive entry the packaging tool copies into every package.
const LICENSE_ENTRY: &str = "LICENSE";

/// The archive format of a package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    /// A zip archive (`application/zip`).
    Zip,
    /// A gzip-compressed tar archive (`application/gzip`).
    TarGz,
}

impl PackageFormat {
    /// Return the filename extension, including the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
        }
    }

    /// Return the MIME type recorded as `CONTENT_TYPE` in the descriptor.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Zip => "application/zip",
            Self::TarGz => "application/gzip",
        }
    }

    /// Infer the format from a package filename.
    ///
    /// # Examples
    ///
    /// ```
    /// use msquic_pipeline::package::PackageFormat;
    ///
    /// assert_eq!(
    ///     PackageFormat::from_file_name("msquic-v2.4.8_android.tar.gz"),
    ///     Some(PackageFormat::TarGz)
    /// );
    /// assert_eq!(PackageFormat::from_file_name("notes.txt"), None);
    /// ```
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(Self::Zip.extension()) {
            Some(Self::Zip)
        } else if name.ends_with(Self::TarGz.extension()) {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// Map a descriptor `CONTENT_TYPE` value back to a format.
    #[must_use]
    pub fn from_content_type(value: &str) -> Option<Self> {
        match value {
            "application/zip" => Some(Self::Zip),
            "application/gzip" => Some(Self::TarGz),
            _ => None,
        }
    }
}

/// Errors raised while inspecting a package archive.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The package file is missing next to its descriptor.
    #[error("package file not found: {path}")]
    NotFound {
        /// Where the package was expected.
        path: String,
    },

    /// The archive could not be read as the expected format.
    #[error("package {path} is not a readable {format} archive: {reason}")]
    Unreadable {
        /// Path of the package.
        path: String,
        /// Expected format extension.
        format: &'static str,
        /// Description of the decoding failure.
        reason: String,
    },

    /// The archive holds no file entries.
    #[error("package {path} contains no files")]
    Empty {
        /// Path of the package.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error while inspecting package: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary of a package archive's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    /// Names of the file entries, in archive order.
    pub entries: Vec<String>,
    /// Size of the archive in bytes.
    pub size: u64,
}

impl PackageSummary {
    /// Whether the archive carries a license file at any depth.
    #[must_use]
    pub fn has_license(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.rsplit('/').next() == Some(LICENSE_ENTRY))
    }
}

/// Open a package archive and list its file entries.
///
/// # Errors
///
/// Returns [`PackageError::NotFound`] if the file does not exist,
/// [`PackageError::Unreadable`] if it does not decode as `format`, and
/// [`PackageError::Empty`] if it holds no files.
pub fn inspect_package(path: &Utf8Path, format: PackageFormat) -> Result<PackageSummary, PackageError> {
    if !path.is_file() {
        return Err(PackageError::NotFound {
            path: path.to_string(),
        });
    }
    let size = fs::metadata(path)?.len();
    let file = fs::File::open(path)?;

    let entries = match format {
        PackageFormat::Zip => zip_entries(file),
        PackageFormat::TarGz => tar_gz_entries(file),
    }
    .map_err(|reason| PackageError::Unreadable {
        path: path.to_string(),
        format: format.extension(),
        reason,
    })?;

    if entries.is_empty() {
        return Err(PackageError::Empty {
            path: path.to_string(),
        });
    }

    let summary = PackageSummary { entries, size };
    debug!("inspected {path}: {} entries, {size} bytes", summary.entries.len());
    if !summary.has_license() {
        warn!("package {path} does not contain a {LICENSE_ENTRY} file");
    }
    Ok(summary)
}

fn zip_entries(file: fs::File) -> Result<Vec<String>, String> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| e.to_string())?;
        if entry.is_file() {
            names.push(entry.name().to_owned());
        }
    }
    Ok(names)
}

fn tar_gz_entries(file: impl Read) -> Result<Vec<String>, String> {
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    let mut names = Vec::new();
    for entry in archive.entries().map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        if entry.header().entry_type().is_file() {
            let path = entry.path().map_err(|e| e.to_string())?;
            names.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_tar_gz, write_zip};
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().join(name)).expect("UTF-8 path")
    }

    #[rstest]
    #[case::zip("a.zip", Some(PackageFormat::Zip))]
    #[case::tar_gz("a.tar.gz", Some(PackageFormat::TarGz))]
    #[case::plain_gz("a.gz", None)]
    #[case::tar("a.tar", None)]
    fn infers_format_from_name(#[case] name: &str, #[case] expected: Option<PackageFormat>) {
        assert_eq!(PackageFormat::from_file_name(name), expected);
    }

    #[test]
    fn content_type_round_trips() {
        for format in [PackageFormat::Zip, PackageFormat::TarGz] {
            assert_eq!(
                PackageFormat::from_content_type(format.content_type()),
                Some(format)
            );
        }
        assert_eq!(PackageFormat::from_content_type("text/plain"), None);
    }

    #[test]
    fn lists_tar_gz_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "pkg.tar.gz");
        write_tar_gz(&path, &[("msquic/lib/libmsquic.a", "lib"), ("msquic/LICENSE", "MIT")]);

        let summary = inspect_package(&path, PackageFormat::TarGz).expect("readable");
        assert_eq!(summary.entries, vec!["msquic/lib/libmsquic.a", "msquic/LICENSE"]);
        assert!(summary.has_license());
        assert!(summary.size > 0);
    }

    #[test]
    fn lists_zip_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "pkg.zip");
        write_zip(&path, &[("msquic/lib/msquic.lib", "lib")]);

        let summary = inspect_package(&path, PackageFormat::Zip).expect("readable");
        assert_eq!(summary.entries, vec!["msquic/lib/msquic.lib"]);
        assert!(!summary.has_license());
    }

    #[test]
    fn rejects_wrong_format() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "pkg.zip");
        fs::write(&path, b"definitely not a zip").expect("write");

        let err = inspect_package(&path, PackageFormat::Zip).expect_err("must fail");
        assert!(matches!(err, PackageError::Unreadable { format: ".zip", .. }));
    }

    #[test]
    fn rejects_empty_archive() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "pkg.tar.gz");
        write_tar_gz(&path, &[]);

        let err = inspect_package(&path, PackageFormat::TarGz).expect_err("must fail");
        assert!(matches!(err, PackageError::Empty { .. }));
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "absent.tar.gz");
        let err = inspect_package(&path, PackageFormat::TarGz).expect_err("must fail");
        assert!(matches!(err, PackageError::NotFound { .. }));
    }
}
