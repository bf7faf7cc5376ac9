//! Artifact extraction.
//!
//! After the packaging tool runs, the extractor reads the platform's
//! descriptor, resolves `PACKAGE_NAME`, checks the package next to it, and
//! prepares the two uploads every platform job makes: the package and the
//! descriptor.

use crate::artifact::{ArtifactName, ArtifactStore};
use crate::config::PackagingConfig;
use crate::descriptor::{PackageDescriptor, PackageName};
use crate::error::{PipelineError, Result};
use crate::package::{PackageSummary, inspect_package};
use crate::platform::PlatformTarget;
use crate::step_output::StepOutputs;
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};

/// Name of the step output carrying the package filename.
pub const PACKAGE_NAME_OUTPUT: &str = "package_name";

/// The result of extracting one platform's packaging output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The platform the output belongs to.
    pub platform: PlatformTarget,
    /// The parsed descriptor.
    pub descriptor: PackageDescriptor,
    /// The validated `PACKAGE_NAME`.
    pub package_name: PackageName,
    /// Path of the descriptor file.
    pub descriptor_path: Utf8PathBuf,
    /// Path of the package file.
    pub package_path: Utf8PathBuf,
    /// Contents of the package archive.
    pub summary: PackageSummary,
}

impl Extraction {
    /// Return the uploads this extraction produces: the package under its
    /// own name and the descriptor under `<platform>.env`.
    #[must_use]
    pub fn uploads(&self) -> [(ArtifactName, &Utf8Path); 2] {
        [
            (ArtifactName::package(&self.package_name), &self.package_path),
            (ArtifactName::descriptor(self.platform), &self.descriptor_path),
        ]
    }
}

/// Return where the packaging tool writes `platform`'s descriptor.
#[must_use]
pub fn descriptor_path(
    source: &Utf8Path,
    packaging: &PackagingConfig,
    platform: PlatformTarget,
) -> Utf8PathBuf {
    packaging
        .output_dir(source, platform.as_str())
        .join(&packaging.descriptor)
}

/// Read and validate `platform`'s packaging output under `source`.
///
/// # Errors
///
/// Returns [`PipelineError::Descriptor`] if the descriptor is missing,
/// malformed, or lacks a usable `PACKAGE_NAME`, and
/// [`PipelineError::Package`] if the named package is missing or is not a
/// readable, non-empty archive of the platform's format.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use msquic_pipeline::config::PackagingConfig;
/// use msquic_pipeline::extractor::extract;
/// use msquic_pipeline::platform::PlatformTarget;
///
/// let extraction = extract(
///     Utf8Path::new("."),
///     &PackagingConfig::default(),
///     PlatformTarget::MacosArm64,
/// )?;
/// println!("{}", extraction.package_name);
/// # Ok::<(), msquic_pipeline::error::PipelineError>(())
/// ```
pub fn extract(
    source: &Utf8Path,
    packaging: &PackagingConfig,
    platform: PlatformTarget,
) -> Result<Extraction> {
    let descriptor_path = descriptor_path(source, packaging, platform);
    let descriptor_error = |source| PipelineError::Descriptor { platform, source };

    let descriptor = PackageDescriptor::read(&descriptor_path).map_err(descriptor_error)?;
    let package_name = descriptor.package_name().map_err(descriptor_error)?;

    let format = platform.package_format();
    if package_name.format() != Some(format) {
        warn!(
            "{platform}: package {package_name} does not carry the expected {} extension",
            format.extension()
        );
    }
    if descriptor.content_type().is_some_and(|declared| declared != format) {
        warn!("{platform}: descriptor CONTENT_TYPE disagrees with the {format:?} package format");
    }

    let package_path = descriptor_path
        .parent()
        .map_or_else(|| Utf8PathBuf::from(package_name.as_str()), |dir| {
            dir.join(package_name.as_str())
        });
    let summary = inspect_package(&package_path, format)
        .map_err(|source| PipelineError::Package { platform, source })?;

    info!("{platform}: extracted package {package_name}");
    Ok(Extraction {
        platform,
        descriptor,
        package_name,
        descriptor_path,
        package_path,
        summary,
    })
}

/// Expose the package filename as the `package_name` step output.
///
/// # Errors
///
/// Returns [`PipelineError::StepOutput`] if the output cannot be written.
pub fn write_outputs(extraction: &Extraction, outputs: &StepOutputs) -> Result<()> {
    outputs.set(PACKAGE_NAME_OUTPUT, extraction.package_name.as_str())?;
    Ok(())
}

/// Upload the package and descriptor artifacts.
///
/// # Errors
///
/// Returns [`PipelineError::Artifact`] if either upload fails, including
/// when a name has already been claimed.
pub fn upload(extraction: &Extraction, store: &dyn ArtifactStore) -> Result<()> {
    for (name, path) in extraction.uploads() {
        store.upload(&name, path)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
