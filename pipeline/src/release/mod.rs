//! Release aggregation.
//!
//! The release step runs after every build job has finished. It is gated on
//! the triggering ref and on the build results, downloads every platform's
//! package, consolidates the local paths, and publishes them as the assets
//! of a release.
//!
//! # Sub-modules
//!
//! - [`aggregate`] - Downloading and consolidating package paths.
//! - [`gate`] - Deciding whether a release runs.
//! - [`publish`] - Publishing a release and its assets.

pub mod aggregate;
pub mod gate;
pub mod publish;

use crate::download::DownloadError;
use thiserror::Error;

pub use aggregate::{PACKAGE_PATHS_OUTPUT, aggregate, write_outputs};
pub use gate::{GateDecision, SkipReason, evaluate};
pub use publish::{
    DryRunPublisher, GithubReleasePublisher, PublishError, PublishedRelease, ReleasePublisher,
    ReleaseRequest,
};

/// Errors that abort the release step. None of them leaves a partial
/// release behind.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A platform's package could not be downloaded.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The consolidated list does not hold one package per platform.
    #[error("expected {expected} package paths, found {found}; refusing to publish a partial release")]
    Incomplete {
        /// Number of platforms.
        expected: usize,
        /// Number of paths recorded.
        found: usize,
    },

    /// The release could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Result type alias using [`ReleaseError`].
pub type Result<T> = std::result::Result<T, ReleaseError>;
