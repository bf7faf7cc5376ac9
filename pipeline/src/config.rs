//! Pipeline configuration.
//!
//! Settings come from an optional `msquic-pipeline.toml` and are then
//! overridden by the hosted CI's environment (`GITHUB_SHA`,
//! `GITHUB_REPOSITORY`, ...). Every table falls back to its defaults when
//! omitted, and unknown keys are rejected so typos surface immediately.

use crate::executor::DEFAULT_TIMEOUT;
use crate::git_ref::DEFAULT_TAG_MARKER;
use crate::trigger::DEFAULT_PATHS_IGNORE;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "msquic-pipeline.toml";

/// Ref of the triggering push.
pub const ENV_REF: &str = "GITHUB_REF";
/// Commit of the triggering push.
pub const ENV_SHA: &str = "GITHUB_SHA";
/// Step output file.
pub const ENV_OUTPUT: &str = "GITHUB_OUTPUT";
/// `owner/name` of the repository running the workflow.
pub const ENV_REPOSITORY: &str = "GITHUB_REPOSITORY";
/// Token used to create releases.
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file {path} not found")]
    NotFound {
        /// The requested path.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The file being read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the schema.
    #[error("invalid configuration {path}: {message}")]
    Parse {
        /// The file being parsed.
        path: Utf8PathBuf,
        /// The parser's diagnostic.
        message: String,
    },

    /// A setting has an unusable value.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted name of the setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The working directory could not be used to anchor relative paths.
    #[error("cannot resolve paths against the working directory: {reason}")]
    WorkingDirectory {
        /// Why the working directory was unusable.
        reason: String,
    },
}

/// Result type alias using [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level pipeline configuration.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::config::PipelineConfig;
///
/// let config = PipelineConfig::from_toml("[matrix]\nfail_fast = true\n").expect("valid");
/// assert!(config.matrix.fail_fast);
/// assert_eq!(config.packaging.script, "run.py");
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Where the packaging sources are cloned from.
    pub source: SourceConfig,
    /// How the packaging tool is invoked and where it writes.
    pub packaging: PackagingConfig,
    /// Local working directories.
    pub workspace: WorkspaceConfig,
    /// Push-event filtering and release gating.
    pub trigger: TriggerConfig,
    /// Release publication.
    pub release: ReleaseConfig,
    /// Build matrix strategy.
    pub matrix: MatrixConfig,
}

impl PipelineConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML parser's error for malformed input or unknown keys.
    pub fn from_toml(source: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load configuration from `explicit`, or from [`DEFAULT_CONFIG_FILE`]
    /// in the working directory when present, or fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `explicit` does not exist, a read
    /// or parse error for a broken file, or [`ConfigError::Invalid`] if a
    /// value fails validation.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::NotFound {
                    path: path.to_owned(),
                });
            }
            Some(path) => Some(path.to_owned()),
            None => Some(Utf8PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Self::from_toml(&source).map_err(|e| ConfigError::Parse {
                    path,
                    message: e.to_string(),
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialise but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.packaging.timeout_minutes == 0 {
            return invalid("packaging.timeout_minutes", "must be greater than zero");
        }
        if self.trigger.tag_marker.is_empty() {
            return invalid("trigger.tag_marker", "must not be empty");
        }
        if self.packaging.script.trim().is_empty() {
            return invalid("packaging.script", "must not be empty");
        }
        if self.source.repository.trim().is_empty() {
            return invalid("source.repository", "must not be empty");
        }
        Ok(())
    }

    /// Anchor a relative workspace root and a relative local repository at
    /// `base`.
    ///
    /// Job commands run inside per-platform directories, so neither path may
    /// stay relative once a job starts. Remote repositories are unchanged.
    pub fn resolve_paths(&mut self, base: &Utf8Path) {
        if self.workspace.root.is_relative() {
            self.workspace.root = anchored(base, &self.workspace.root);
        }
        if self.source.is_local() && Utf8Path::new(&self.source.repository).is_relative() {
            self.source.repository =
                anchored(base, Utf8Path::new(&self.source.repository)).into_string();
        }
    }

    /// [`resolve_paths`](Self::resolve_paths) against the process working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkingDirectory`] if the working directory
    /// cannot be read or is not valid UTF-8.
    pub fn resolve_against_current_dir(&mut self) -> Result<()> {
        let unusable = |reason: String| ConfigError::WorkingDirectory { reason };
        let cwd = std::env::current_dir().map_err(|e| unusable(e.to_string()))?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| unusable(e.to_string()))?;
        self.resolve_paths(&cwd);
        Ok(())
    }

    /// Apply hosted-CI overrides: the pushed commit becomes the revision to
    /// package and the running repository becomes the release target.
    pub fn apply_environment(&mut self, env: &HostEnvironment) {
        if let Some(sha) = &env.sha {
            sha.clone_into(&mut self.source.revision);
        }
        if let Some(repository) = &env.repository {
            self.release.repository = Some(repository.clone());
        }
    }
}

/// `[source]`: the repository holding the packaging tool.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Clone URL or local path.
    pub repository: String,
    /// Revision checked out in every job.
    pub revision: String,
}

impl SourceConfig {
    /// Whether `repository` is a filesystem path rather than a remote URL.
    ///
    /// URLs with a scheme and scp-style `host:path` remotes are remote; a
    /// single letter before the colon is a Windows drive.
    #[must_use]
    pub fn is_local(&self) -> bool {
        let repository = self.repository.as_str();
        if repository.contains("://") {
            return false;
        }
        !matches!(
            repository.split_once(':'),
            Some((host, _)) if host.len() > 1 && !host.contains(['/', '\\'])
        )
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: ".".to_owned(),
            revision: "HEAD".to_owned(),
        }
    }
}

/// `[packaging]`: the packaging tool and its output layout.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackagingConfig {
    /// Script run with `--package <platform>`.
    pub script: String,
    /// Output directory, relative to the source checkout.
    pub package_dir: String,
    /// Build configuration subdirectory.
    pub configuration: String,
    /// Descriptor filename.
    pub descriptor: String,
    /// Per-command time limit in minutes.
    pub timeout_minutes: u64,
}

impl PackagingConfig {
    /// Return the per-command time limit.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    /// Return `<source>/<package_dir>/<platform>/<configuration>`.
    #[must_use]
    pub fn output_dir(&self, source: &Utf8Path, platform: &str) -> Utf8PathBuf {
        source
            .join(&self.package_dir)
            .join(platform)
            .join(&self.configuration)
    }
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            script: "run.py".to_owned(),
            package_dir: "_package".to_owned(),
            configuration: "release".to_owned(),
            descriptor: crate::descriptor::DESCRIPTOR_FILE_NAME.to_owned(),
            timeout_minutes: DEFAULT_TIMEOUT.as_secs() / 60,
        }
    }
}

/// `[workspace]`: where jobs, artifacts, and release downloads live.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Root of all working directories.
    pub root: Utf8PathBuf,
}

impl WorkspaceConfig {
    /// Return the directory holding per-platform job checkouts.
    #[must_use]
    pub fn jobs_dir(&self) -> Utf8PathBuf {
        self.root.join("jobs")
    }

    /// Return the artifact store root.
    #[must_use]
    pub fn artifacts_dir(&self) -> Utf8PathBuf {
        self.root.join("artifacts")
    }

    /// Return the release download directory.
    #[must_use]
    pub fn downloads_dir(&self) -> Utf8PathBuf {
        self.root.join("downloads")
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("target/msquic-pipeline"),
        }
    }
}

/// `[trigger]`: push filtering and release gating.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerConfig {
    /// Pushes touching only these paths do not start the workflow.
    pub paths_ignore: Vec<String>,
    /// Substring a ref must contain to publish a release.
    pub tag_marker: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            paths_ignore: DEFAULT_PATHS_IGNORE.iter().map(|p| (*p).to_owned()).collect(),
            tag_marker: DEFAULT_TAG_MARKER.to_owned(),
        }
    }
}

/// `[release]`: where releases are published.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// `owner/name` of the repository receiving the release.
    pub repository: Option<String>,
    /// Base URL of the REST API.
    pub api_url: String,
    /// Create releases as drafts.
    pub draft: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_url: "https://api.github.com".to_owned(),
            draft: false,
        }
    }
}

/// `[matrix]`: the build matrix strategy.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    /// Cancel a build job's remaining platforms after its first failure.
    pub fail_fast: bool,
}

fn anchored(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    base.join(path)
        .components()
        .filter(|component| *component != Utf8Component::CurDir)
        .collect()
}

/// Values supplied by the hosted CI's environment.
///
/// Blank variables are treated as unset.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostEnvironment {
    /// `GITHUB_SHA`.
    pub sha: Option<String>,
    /// `GITHUB_OUTPUT`.
    pub output: Option<Utf8PathBuf>,
    /// `GITHUB_REPOSITORY`.
    pub repository: Option<String>,
    /// `GITHUB_TOKEN`.
    pub token: Option<String>,
}

impl HostEnvironment {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            sha: get(ENV_SHA),
            output: get(ENV_OUTPUT).map(Utf8PathBuf::from),
            repository: get(ENV_REPOSITORY),
            token: get(ENV_TOKEN),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
