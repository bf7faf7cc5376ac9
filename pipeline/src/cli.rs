//! CLI argument definitions for the pipeline.
//!
//! Each subcommand corresponds to one stage of the hosted workflow, so a CI
//! job can call exactly the stage it runs; `run` chains them in-process.

use crate::platform::PlatformTarget;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Build, extract, and release prebuilt msquic packages.
#[derive(Parser, Debug)]
#[command(name = "msquic-pipeline")]
#[command(version, about)]
#[command(after_help = concat!(
    "PLATFORMS:\n",
    "  windows_x86_64  macos_arm64  ios  ubuntu-20.04_x86_64  android\n\n",
    "EXAMPLES:\n",
    "  Decide whether a push starts the workflow:\n",
    "    $ msquic-pipeline check-trigger --ref refs/heads/main --changed README.md\n\n",
    "  Build one platform and upload its artifacts:\n",
    "    $ msquic-pipeline build android\n\n",
    "  Preview a release for a tag:\n",
    "    $ msquic-pipeline release --ref refs/tags/v2.0.0 --dry-run\n\n",
    "  Run the whole workflow locally:\n",
    "    $ msquic-pipeline run --ref refs/tags/v2.0.0",
))]
pub struct Cli {
    /// Configuration file [default: msquic-pipeline.toml when present].
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stage to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decide whether a push event starts the workflow.
    CheckTrigger(TriggerArgs),

    /// Run one platform job: checkout, dependencies, package, extract, upload.
    Build(BuildArgs),

    /// Read a platform's package descriptor and upload its artifacts.
    Extract(ExtractArgs),

    /// Gate on the ref, collect every platform's package, and publish.
    Release(ReleaseArgs),

    /// Run the whole workflow in-process.
    Run(RunArgs),
}

/// Arguments for `check-trigger`.
#[derive(Args, Debug, Clone)]
pub struct TriggerArgs {
    /// The pushed ref.
    #[arg(long = "ref", value_name = "REF", env = "GITHUB_REF")]
    pub git_ref: String,

    /// A path changed by the push (can be repeated).
    #[arg(long, value_name = "PATH")]
    pub changed: Vec<String>,
}

/// Arguments for `build`.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Platform to build.
    #[arg(value_name = "PLATFORM")]
    pub platform: PlatformTarget,
}

/// Arguments for `extract`.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Platform whose descriptor is read.
    #[arg(value_name = "PLATFORM")]
    pub platform: PlatformTarget,

    /// Directory the packaging tool ran in.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source: Utf8PathBuf,

    /// Only expose the package name; do not upload artifacts.
    #[arg(long)]
    pub no_upload: bool,
}

/// Arguments for `release`.
#[derive(Args, Debug, Clone)]
pub struct ReleaseArgs {
    /// The triggering ref.
    #[arg(long = "ref", value_name = "REF", env = "GITHUB_REF")]
    pub git_ref: String,

    /// Collect packages and print the release without publishing it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// The pushed ref.
    #[arg(long = "ref", value_name = "REF", env = "GITHUB_REF")]
    pub git_ref: String,

    /// A path changed by the push (can be repeated).
    #[arg(long, value_name = "PATH")]
    pub changed: Vec<String>,

    /// Build everything but print the release instead of publishing it.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
