//! Package path consolidation.

use super::{ReleaseError, Result};
use crate::download::{PackagePathsFile, PlatformArtifactDownloader};
use crate::platform::PlatformTarget;
use crate::step_output::{StepOutputError, StepOutputs};
use camino::Utf8Path;
use log::info;

/// Name of the multi-line step output listing the package paths.
pub const PACKAGE_PATHS_OUTPUT: &str = "package_paths";

/// Download every platform's package into `dest` and return the
/// consolidated list of local paths, in matrix order.
///
/// The path list in `dest` is reset first so a rerun cannot pick up a
/// previous run's entries. Any download failure aborts the aggregation, and
/// the result must hold exactly one path per platform.
///
/// # Errors
///
/// Returns [`ReleaseError::Download`] for the first failed download and
/// [`ReleaseError::Incomplete`] if the list does not hold one path per
/// platform.
pub fn aggregate(
    downloader: &dyn PlatformArtifactDownloader,
    dest: &Utf8Path,
) -> Result<Vec<String>> {
    std::fs::create_dir_all(dest).map_err(|source| {
        crate::download::DownloadError::PathsFile {
            path: dest.to_owned(),
            source,
        }
    })?;
    let paths_file = PackagePathsFile::in_dir(dest);
    paths_file.reset()?;

    for &platform in PlatformTarget::all() {
        downloader.download(platform, dest, &paths_file)?;
    }

    let paths = paths_file.read()?;
    let expected = PlatformTarget::all().len();
    if paths.len() != expected {
        return Err(ReleaseError::Incomplete {
            expected,
            found: paths.len(),
        });
    }
    info!("consolidated {} package paths", paths.len());
    Ok(paths)
}

/// Expose the consolidated list as the multi-line `package_paths` output.
///
/// # Errors
///
/// Returns a [`StepOutputError`] if the output cannot be written.
pub fn write_outputs(paths: &[String], outputs: &StepOutputs) -> std::result::Result<(), StepOutputError> {
    outputs.set_lines(PACKAGE_PATHS_OUTPUT, paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadError, MockPlatformArtifactDownloader};
    use crate::step_output::parse_outputs;
    use crate::test_utils::utf8;
    use camino::Utf8PathBuf;

    fn recording_downloader() -> MockPlatformArtifactDownloader {
        let mut downloader = MockPlatformArtifactDownloader::new();
        downloader
            .expect_download()
            .times(5)
            .returning(|platform, dest, paths_file| {
                let path = dest.join(platform.as_str()).join(format!("pkg_{platform}"));
                paths_file.append(&path)?;
                Ok(path)
            });
        downloader
    }

    #[test]
    fn consolidates_one_path_per_platform_in_matrix_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dest = utf8(dir.path());

        let paths = aggregate(&recording_downloader(), &dest).expect("aggregate");
        let expected: Vec<_> = PlatformTarget::all()
            .iter()
            .map(|p| dest.join(p.as_str()).join(format!("pkg_{p}")).into_string())
            .collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn stale_entries_from_an_earlier_run_are_discarded() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dest = utf8(dir.path());
        PackagePathsFile::in_dir(&dest)
            .append(Utf8Path::new("/stale/pkg.zip"))
            .expect("seed");

        let paths = aggregate(&recording_downloader(), &dest).expect("aggregate");
        assert!(!paths.iter().any(|p| p == "/stale/pkg.zip"));
    }

    #[test]
    fn a_failed_download_aborts_aggregation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dest = utf8(dir.path());
        let mut downloader = MockPlatformArtifactDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_, _, _| {
                Err(DownloadError::UnrepresentablePath {
                    path: "bad".to_owned(),
                })
            });

        let err = aggregate(&downloader, &dest).expect_err("must fail");
        assert!(matches!(err, ReleaseError::Download(_)));
    }

    #[test]
    fn a_downloader_that_records_nothing_yields_an_incomplete_set() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dest = utf8(dir.path());
        let mut downloader = MockPlatformArtifactDownloader::new();
        downloader
            .expect_download()
            .times(5)
            .returning(|_, dest, _| Ok(Utf8PathBuf::from(dest)));

        let err = aggregate(&downloader, &dest).expect_err("must fail");
        assert!(matches!(
            err,
            ReleaseError::Incomplete {
                expected: 5,
                found: 0
            }
        ));
    }

    #[test]
    fn output_is_a_delimited_multiline_value() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = utf8(dir.path()).join("github_output");
        let paths = vec!["/d/a.zip".to_owned(), "/d/b.tar.gz".to_owned()];

        write_outputs(&paths, &StepOutputs::File(output.clone())).expect("write");
        let contents = std::fs::read_to_string(output).expect("read");
        assert_eq!(
            parse_outputs(&contents),
            [(PACKAGE_PATHS_OUTPUT.to_owned(), "/d/a.zip\n/d/b.tar.gz".to_owned())]
        );
    }
}
