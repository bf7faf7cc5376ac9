//! Named artifacts shared between jobs.
//!
//! Each platform job uploads two artifacts: the package itself, named by the
//! descriptor's `PACKAGE_NAME`, and the descriptor, named `<platform>.env`.
//! The release job downloads them again by name. The store is append-only:
//! a name, once claimed, cannot be overwritten.
//!
//! # Sub-modules
//!
//! - [`error`] - Error types for naming and store operations.
//! - [`naming`] - Validated artifact names (`ArtifactName`).
//! - [`store`] - The `ArtifactStore` trait and its filesystem implementation.

pub mod error;
pub mod naming;
pub mod store;

pub use error::ArtifactError;
pub use naming::{ArtifactKind, ArtifactName};
pub use store::{ArtifactStore, LocalArtifactStore};
