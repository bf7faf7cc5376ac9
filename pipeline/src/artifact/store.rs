//! Append-only artifact storage.

use super::error::{ArtifactError, Result};
use super::naming::ArtifactName;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io;

/// Directory inside a slot where an upload is written before it is published.
const INCOMING_DIR: &str = ".incoming";

/// A namespace of uploaded artifacts keyed by name.
///
/// Implementations must be safe to share between concurrently running
/// platform jobs and must refuse to overwrite an existing name.
pub trait ArtifactStore: Send + Sync {
    /// Upload `file` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::AlreadyExists`] if `name` is taken,
    /// [`ArtifactError::SourceMissing`] if `file` is not a regular file, or
    /// [`ArtifactError::Io`] on storage failure.
    fn upload(&self, name: &ArtifactName, file: &Utf8Path) -> Result<()>;

    /// Download the artifact `name` into `dest_dir`, keeping its original
    /// filename, and return the path of the restored file.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotFound`] if nothing was uploaded under
    /// `name`, or [`ArtifactError::Io`] on storage failure.
    fn download(&self, name: &ArtifactName, dest_dir: &Utf8Path) -> Result<Utf8PathBuf>;

    /// List the stored artifact names in lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] if the store cannot be read.
    fn list(&self) -> Result<Vec<ArtifactName>>;
}

/// An artifact store on the local filesystem.
///
/// Each artifact lives at `<root>/<name>/<file>`. Creating the `<name>`
/// directory is the claim: it either succeeds for exactly one uploader or
/// fails with `AlreadyExists`, so concurrent uploads need no further
/// coordination. The file is copied into a hidden staging directory inside
/// the slot and renamed into place, so a reader never sees a partial file.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use msquic_pipeline::artifact::{ArtifactName, ArtifactStore, LocalArtifactStore};
/// use msquic_pipeline::platform::PlatformTarget;
///
/// let store = LocalArtifactStore::new("target/artifacts");
/// let name = ArtifactName::descriptor(PlatformTarget::Ios);
/// store.upload(&name, Utf8Path::new("_package/ios/release/msquic.env"))?;
/// # Ok::<(), msquic_pipeline::artifact::ArtifactError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: Utf8PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the store root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn slot(&self, name: &ArtifactName) -> Utf8PathBuf {
        self.root.join(name.as_str())
    }

    fn claim(&self, name: &ArtifactName) -> Result<Utf8PathBuf> {
        fs::create_dir_all(&self.root).map_err(io_error("create", &self.root))?;
        let slot = self.slot(name);
        match fs::create_dir(&slot) {
            Ok(()) => Ok(slot),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(ArtifactError::AlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(io_error("claim", &slot)(e)),
        }
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn upload(&self, name: &ArtifactName, file: &Utf8Path) -> Result<()> {
        let file_name = match file.file_name() {
            Some(file_name) if file.is_file() => file_name,
            _ => {
                return Err(ArtifactError::SourceMissing {
                    path: file.to_owned(),
                });
            }
        };

        let slot = self.claim(name)?;
        let incoming = slot.join(INCOMING_DIR);
        let staged = incoming.join(file_name);
        fs::create_dir(&incoming).map_err(io_error("stage", &incoming))?;
        fs::copy(file, &staged).map_err(io_error("copy", file))?;

        let published = slot.join(file_name);
        fs::rename(&staged, &published).map_err(io_error("publish", &published))?;
        fs::remove_dir(&incoming).map_err(io_error("clean", &incoming))?;
        debug!("uploaded artifact {name} from {file}");
        Ok(())
    }

    fn download(&self, name: &ArtifactName, dest_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let slot = self.slot(name);
        let not_found = || ArtifactError::NotFound {
            name: name.to_string(),
        };
        if !slot.is_dir() {
            return Err(not_found());
        }

        let mut files = slot
            .read_dir_utf8()
            .map_err(io_error("read", &slot))?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path().to_owned())
            .collect::<Vec<_>>();
        files.sort();
        let source = files.into_iter().next().ok_or_else(not_found)?;
        let file_name = source.file_name().ok_or_else(not_found)?;

        fs::create_dir_all(dest_dir).map_err(io_error("create", dest_dir))?;
        let dest = dest_dir.join(file_name);
        fs::copy(&source, &dest).map_err(io_error("copy", &source))?;
        debug!("downloaded artifact {name} to {dest}");
        Ok(dest)
    }

    fn list(&self) -> Result<Vec<ArtifactName>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in self.root.read_dir_utf8().map_err(io_error("read", &self.root))? {
            let entry = entry.map_err(io_error("read", &self.root))?;
            if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            if let Ok(name) = ArtifactName::parse(entry.file_name()) {
                names.push(name);
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }
}

fn io_error(operation: &'static str, path: &Utf8Path) -> impl FnOnce(io::Error) -> ArtifactError {
    let path = path.to_owned();
    move |source| ArtifactError::Io {
        operation,
        path,
        source,
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
