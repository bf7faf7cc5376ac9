//! Shared test utilities for the pipeline crate.
//!
//! [`FakeExecutor`] stands in for git, the package manager, and the
//! packaging tool: it records every command and reproduces their effects on
//! disk, including a real descriptor and a real archive for each platform.
//! [`RecordingPublisher`] captures release requests in memory.

#![expect(clippy::expect_used, reason = "test fixtures panic when setup fails")]

use crate::descriptor::{CONTENT_TYPE_KEY, DESCRIPTOR_FILE_NAME, PACKAGE_NAME_KEY};
use crate::executor::{CommandExecutor, CommandSpec, ExecError};
use crate::job::JobStep;
use crate::package::PackageFormat;
use crate::platform::PlatformTarget;
use crate::release::publish::{PublishError, PublishedRelease, ReleasePublisher, ReleaseRequest};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::process::{ExitStatus, Output};
use std::sync::{Mutex, PoisonError};

/// Version string the fake packaging tool embeds in package names.
pub const FAKE_VERSION: &str = "v2.0.0";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(u32::from_ne_bytes(code.to_ne_bytes()))
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Writes a gzip-compressed tar archive holding `entries` as `(name, contents)`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_gz(path: &Utf8Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).expect("create tar.gz");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .expect("finish tar.gz");
}

/// Writes a zip archive holding `entries` as `(name, contents)`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_zip(path: &Utf8Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).expect("create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish zip");
}

/// Return the package filename the fake packaging tool produces.
pub fn fake_package_name(platform: PlatformTarget) -> String {
    format!("msquic-{FAKE_VERSION}_{platform}{}", platform.package_extension())
}

/// Return the descriptor the fake packaging tool writes, padded with blank
/// lines the way the real tool's output sometimes is.
pub fn fake_descriptor(platform: PlatformTarget) -> String {
    format!(
        "\n{CONTENT_TYPE_KEY}={}\n{PACKAGE_NAME_KEY}={}\n\n",
        platform.package_format().content_type(),
        fake_package_name(platform)
    )
}

/// Write a packaging tool's output for `platform` under `source`.
///
/// Produces `<source>/_package/<platform>/release/msquic.env` holding
/// `descriptor` and, next to it, the archive named by
/// [`fake_package_name`].
///
/// # Panics
///
/// Panics if the files cannot be written.
pub fn write_package_output(source: &Utf8Path, platform: PlatformTarget, descriptor: &str) {
    let dir = source.join("_package").join(platform.as_str()).join("release");
    fs::create_dir_all(&dir).expect("create package dir");
    fs::write(dir.join(DESCRIPTOR_FILE_NAME), descriptor).expect("write descriptor");

    let archive = dir.join(fake_package_name(platform));
    let entries = [
        ("msquic/include/msquic.h", "/* msquic */"),
        ("msquic/LICENSE", "MIT License"),
    ];
    match platform.package_format() {
        PackageFormat::Zip => write_zip(&archive, &entries),
        PackageFormat::TarGz => write_tar_gz(&archive, &entries),
    }
}

/// A `CommandExecutor` that simulates the tools a platform job runs.
///
/// - Commands whose working directory is missing fail to start, as they
///   would for real.
/// - `git clone` creates the destination directory, resolved against the
///   working directory; `git checkout` succeeds.
/// - Dependency installs succeed.
/// - The packaging tool writes a descriptor and archive via
///   [`write_package_output`].
///
/// The platform of a command is recovered from its working directory, which
/// the job always sets to a path containing the platform name.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    failures: HashMap<PlatformTarget, JobStep>,
    descriptors: HashMap<PlatformTarget, String>,
}

impl FakeExecutor {
    /// Creates an executor under which every platform builds successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `step` fail for `platform`.
    #[must_use]
    pub fn failing(mut self, platform: PlatformTarget, step: JobStep) -> Self {
        self.failures.insert(platform, step);
        self
    }

    /// Makes the packaging tool write `contents` as the descriptor for
    /// `platform` instead of the well-formed default.
    #[must_use]
    pub fn with_descriptor(mut self, platform: PlatformTarget, contents: &str) -> Self {
        self.descriptors.insert(platform, contents.to_owned());
        self
    }

    /// Returns every command run so far, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the commands run for `platform`.
    pub fn calls_for(&self, platform: PlatformTarget) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|spec| platform_of(spec) == Some(platform))
            .collect()
    }

    fn step_of(spec: &CommandSpec) -> JobStep {
        match spec.program.as_str() {
            "git" => JobStep::Checkout,
            "python" | "python3" => JobStep::Package,
            _ => JobStep::Dependencies,
        }
    }

    fn simulate(spec: &CommandSpec, platform: Option<PlatformTarget>, descriptor: Option<&str>) {
        match (Self::step_of(spec), spec.args.first().map(String::as_str)) {
            (JobStep::Checkout, Some("clone")) => {
                if let Some(dest) = spec.args.last() {
                    let dest = match spec.cwd.as_deref() {
                        Some(cwd) => cwd.join(dest),
                        None => Utf8PathBuf::from(dest),
                    };
                    fs::create_dir_all(dest).expect("create clone destination");
                }
            }
            (JobStep::Package, _) => {
                if let (Some(platform), Some(cwd)) = (platform, spec.cwd.as_deref()) {
                    let default = fake_descriptor(platform);
                    write_package_output(cwd, platform, descriptor.unwrap_or(&default));
                }
            }
            _ => {}
        }
    }
}

impl CommandExecutor for FakeExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output, ExecError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());

        if let Some(cwd) = spec.cwd.as_deref().filter(|cwd| !cwd.is_dir()) {
            return Err(ExecError::Spawn {
                command: spec.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory {cwd} does not exist"),
                ),
            });
        }

        let platform = platform_of(spec);
        let step = Self::step_of(spec);
        if platform.and_then(|p| self.failures.get(&p)) == Some(&step) {
            return Ok(failure_output(&format!("simulated {step} failure")));
        }

        let descriptor = platform.and_then(|p| self.descriptors.get(&p));
        Self::simulate(spec, platform, descriptor.map(String::as_str));
        Ok(success_output())
    }
}

fn platform_of(spec: &CommandSpec) -> Option<PlatformTarget> {
    spec.cwd
        .as_deref()?
        .components()
        .find_map(|component| PlatformTarget::try_from(component.as_str()).ok())
}

/// A `ReleasePublisher` that records requests instead of calling an API.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    requests: Mutex<Vec<ReleaseRequest>>,
    failure: Option<String>,
}

impl RecordingPublisher {
    /// Creates a publisher that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that rejects every request with `reason`.
    pub fn rejecting(reason: &str) -> Self {
        Self {
            requests: Mutex::default(),
            failure: Some(reason.to_owned()),
        }
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<ReleaseRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReleasePublisher for RecordingPublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(reason) = &self.failure {
            return Err(PublishError::Http {
                url: format!("recording://releases/{}", request.tag),
                reason: reason.clone(),
            });
        }
        Ok(PublishedRelease {
            tag: request.tag.clone(),
            url: format!("recording://releases/{}", request.tag),
            assets: request
                .files
                .iter()
                .map(|file| asset_name(file))
                .collect(),
        })
    }
}

fn asset_name(file: &str) -> String {
    Utf8Path::new(file)
        .file_name()
        .map_or_else(|| file.to_owned(), str::to_owned)
}

/// Converts a `tempfile` path into a UTF-8 path for use with camino APIs.
///
/// # Panics
///
/// Panics if the path is not valid UTF-8.
pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::try_from(path.to_path_buf()).expect("UTF-8 path")
}
