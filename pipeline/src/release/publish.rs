//! Release publication.
//!
//! [`GithubReleasePublisher`] talks to the hosted CI's REST API. A new
//! release is created as a draft, every consolidated package is uploaded to
//! it, and only then is it published; a failed upload leaves an unpublished
//! draft that the next run picks up again. Assets already attached under the
//! same name are deleted before re-uploading. All asset files are checked
//! before the API is called at all.

use crate::config::{HostEnvironment, ReleaseConfig};
use crate::package::PackageFormat;
use camino::Utf8Path;
use log::{debug, info};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
/// Network timeout for a single API request, including asset uploads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors arising while publishing a release.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No target repository is configured.
    #[error("no release repository configured; set [release] repository or GITHUB_REPOSITORY")]
    MissingRepository,

    /// No API token is available.
    #[error("no API token available; set GITHUB_TOKEN")]
    MissingToken,

    /// An asset file is missing or has no filename.
    #[error("release asset {path} is not a file")]
    MissingAsset {
        /// The consolidated path.
        path: String,
    },

    /// An HTTP request failed.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The API answered with an unexpected body.
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse {
        /// The URL that was requested.
        url: String,
        /// Why the body could not be used.
        reason: String,
    },

    /// An asset could not be read.
    #[error("failed to read release asset {path}: {source}")]
    Io {
        /// The asset path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// The tag the release is attached to.
    pub tag: String,
    /// The release title.
    pub name: String,
    /// Local paths of the assets, exactly as consolidated.
    pub files: Vec<String>,
    /// Create the release as a draft.
    pub draft: bool,
}

impl ReleaseRequest {
    /// Create a request titled after its tag.
    #[must_use]
    pub fn new(tag: &str, files: Vec<String>) -> Self {
        Self {
            tag: tag.to_owned(),
            name: tag.to_owned(),
            files,
            draft: false,
        }
    }
}

/// A release that now carries the requested assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRelease {
    /// The release tag.
    pub tag: String,
    /// Where the release can be viewed.
    pub url: String,
    /// Asset names, in upload order.
    pub assets: Vec<String>,
}

/// Publishes a release with a set of asset files.
#[cfg_attr(test, mockall::automock)]
pub trait ReleasePublisher: Send + Sync {
    /// Publish `request`, creating the release if needed and attaching every
    /// file in `request.files`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] if any file is missing or any API call
    /// fails.
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    html_url: String,
    upload_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    assets: Vec<AssetResponse>,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    id: u64,
    name: String,
}

/// Publishes through the REST API using `ureq`.
#[derive(Debug, Clone)]
pub struct GithubReleasePublisher {
    api_url: String,
    repository: String,
    token: String,
}

impl GithubReleasePublisher {
    /// Create a publisher for `repository` (`owner/name`).
    #[must_use]
    pub fn new(api_url: &str, repository: &str, token: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_owned(),
            repository: repository.to_owned(),
            token: token.to_owned(),
        }
    }

    /// Create a publisher from configuration and the CI environment.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MissingRepository`] or
    /// [`PublishError::MissingToken`] when either is unavailable.
    pub fn from_config(
        config: &ReleaseConfig,
        env: &HostEnvironment,
    ) -> Result<Self, PublishError> {
        let repository = config
            .repository
            .as_deref()
            .or(env.repository.as_deref())
            .ok_or(PublishError::MissingRepository)?;
        let token = env.token.as_deref().ok_or(PublishError::MissingToken)?;
        Ok(Self::new(&config.api_url, repository, token))
    }

    /// URL of the release lookup for `tag`.
    ///
    /// # Examples
    ///
    /// ```
    /// use msquic_pipeline::release::GithubReleasePublisher;
    ///
    /// let publisher = GithubReleasePublisher::new("https://api.github.com/", "octo/pkg", "t");
    /// assert_eq!(
    ///     publisher.release_by_tag_url("v2.0.0"),
    ///     "https://api.github.com/repos/octo/pkg/releases/tags/v2.0.0"
    /// );
    /// ```
    #[must_use]
    pub fn release_by_tag_url(&self, tag: &str) -> String {
        format!("{}/tags/{tag}", self.releases_url())
    }

    /// URL of the release collection.
    #[must_use]
    pub fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_url, self.repository)
    }

    fn find_release(&self, tag: &str) -> Result<Option<ReleaseResponse>, PublishError> {
        let url = self.release_by_tag_url(tag);
        let response = http_agent()
            .get(url.as_str())
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .call();
        match response {
            Ok(response) => {
                let body = response
                    .into_body()
                    .read_to_string()
                    .map_err(|e| http_error(&url, &e))?;
                parse_release(&url, &body).map(Some)
            }
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(http_error(&url, &e)),
        }
    }

    /// URL of the release with `id`.
    fn release_url(&self, id: u64) -> String {
        format!("{}/{id}", self.releases_url())
    }

    /// URL of the release asset with `id`.
    fn asset_url(&self, id: u64) -> String {
        format!("{}/assets/{id}", self.releases_url())
    }

    fn create_draft(&self, request: &ReleaseRequest) -> Result<ReleaseResponse, PublishError> {
        let url = self.releases_url();
        let body = serde_json::json!({
            "tag_name": request.tag,
            "name": request.name,
            "draft": true,
        })
        .to_string();
        let response = http_agent()
            .post(url.as_str())
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| http_error(&url, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| http_error(&url, &e))?;
        parse_release(&url, &body)
    }

    fn publish_draft(&self, release: &ReleaseResponse) -> Result<ReleaseResponse, PublishError> {
        let url = self.release_url(release.id);
        let body = serde_json::json!({ "draft": false }).to_string();
        let response = http_agent()
            .patch(url.as_str())
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| http_error(&url, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| http_error(&url, &e))?;
        parse_release(&url, &body)
    }

    fn delete_asset(&self, asset: &AssetResponse) -> Result<(), PublishError> {
        let url = self.asset_url(asset.id);
        http_agent()
            .delete(url.as_str())
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .call()
            .map_err(|e| http_error(&url, &e))?;
        debug!("deleted stale release asset {}", asset.name);
        Ok(())
    }

    fn upload_asset(&self, upload_url: &str, asset: &Asset<'_>) -> Result<(), PublishError> {
        let bytes = std::fs::read(asset.path).map_err(|source| PublishError::Io {
            path: asset.path.to_string(),
            source,
        })?;
        let url = upload_target(upload_url);
        http_agent()
            .post(url)
            .query("name", asset.name)
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Content-Type", asset_content_type(asset.name))
            .send(bytes)
            .map_err(|e| http_error(url, &e))?;
        debug!("uploaded release asset {}", asset.name);
        Ok(())
    }
}

impl ReleasePublisher for GithubReleasePublisher {
    /// Attach every asset to the release for `request.tag`, then publish it.
    ///
    /// The release stays a draft until the last upload succeeds, and stays
    /// one afterwards when `request.draft` is set. A release that was
    /// already published keeps its state; its assets are replaced in place.
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError> {
        let assets = request
            .files
            .iter()
            .map(|file| Asset::resolve(file))
            .collect::<Result<Vec<_>, _>>()?;

        let release = match self.find_release(&request.tag)? {
            Some(existing) => {
                info!("release {} exists; attaching assets", request.tag);
                existing
            }
            None => {
                info!("creating draft release {}", request.tag);
                self.create_draft(request)?
            }
        };

        for asset in &assets {
            if let Some(stale) = release.assets.iter().find(|a| a.name == asset.name) {
                self.delete_asset(stale)?;
            }
            self.upload_asset(&release.upload_url, asset)?;
        }

        let url = if release.draft && !request.draft {
            info!("publishing release {}", request.tag);
            self.publish_draft(&release)?.html_url
        } else {
            release.html_url
        };
        Ok(PublishedRelease {
            tag: request.tag.clone(),
            url,
            assets: assets.iter().map(|a| a.name.to_owned()).collect(),
        })
    }
}

/// A release asset: a local file and the name it is published under.
struct Asset<'a> {
    path: &'a Utf8Path,
    name: &'a str,
}

impl<'a> Asset<'a> {
    fn resolve(file: &'a str) -> Result<Self, PublishError> {
        let path = Utf8Path::new(file);
        match path.file_name() {
            Some(name) if path.is_file() => Ok(Self { path, name }),
            _ => Err(PublishError::MissingAsset {
                path: file.to_owned(),
            }),
        }
    }
}

/// A publisher that only logs what it would publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

impl ReleasePublisher for DryRunPublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError> {
        let assets = request
            .files
            .iter()
            .map(|file| Asset::resolve(file).map(|asset| asset.name.to_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "dry run: would publish {} with {} assets",
            request.tag,
            assets.len()
        );
        Ok(PublishedRelease {
            tag: request.tag.clone(),
            url: format!("(dry run) {}", request.tag),
            assets,
        })
    }
}

/// Return the content type an asset is uploaded with, by extension.
#[must_use]
pub fn asset_content_type(name: &str) -> &'static str {
    PackageFormat::from_file_name(name).map_or(FALLBACK_CONTENT_TYPE, PackageFormat::content_type)
}

/// Strip the URI-template suffix (`{?name,label}`) from an upload URL.
fn upload_target(upload_url: &str) -> &str {
    upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base)
}

fn parse_release(url: &str, body: &str) -> Result<ReleaseResponse, PublishError> {
    serde_json::from_str(body).map_err(|e| PublishError::InvalidResponse {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn http_error(url: &str, err: &ureq::Error) -> PublishError {
    PublishError::Http {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
