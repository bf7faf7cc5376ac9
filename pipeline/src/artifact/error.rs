//! Error types for artifact naming and storage.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from artifact names or store operations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// An artifact name is not usable as a store key.
    #[error("invalid artifact name \"{value}\": {reason}")]
    InvalidName {
        /// The rejected name.
        value: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// An upload targeted a name that is already taken.
    #[error("artifact {name} already exists; artifact names cannot be reused")]
    AlreadyExists {
        /// The contested name.
        name: String,
    },

    /// No artifact with the requested name has been uploaded.
    #[error("artifact {name} not found")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// The file to upload does not exist or is not a regular file.
    #[error("cannot upload {path}: not a file")]
    SourceMissing {
        /// The path passed to the upload.
        path: Utf8PathBuf,
    },

    /// A filesystem operation on the store failed.
    #[error("artifact store {operation} failed for {path}: {source}")]
    Io {
        /// What the store was doing.
        operation: &'static str,
        /// The path involved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`ArtifactError`].
pub type Result<T> = std::result::Result<T, ArtifactError>;
