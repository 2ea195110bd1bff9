//! GitHub releases wire model and parser.
//!
//! Decodes the JSON array returned by `GET /repos/{owner}/{repo}/releases`
//! into the in-memory release model. The wire schema is snake_case with
//! ISO 8601 timestamps; fields the API may omit decode to `None` rather
//! than failing. The identity fields (`tag_name`, release `name`, asset
//! `url` and `name`) are required and their absence is a parse error.

use crate::error::{Result, UpdateError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

/// A published (or draft/prerelease) version in a GitHub repository.
///
/// `tag_name` is the sole identity key: the skip list matches on it, and
/// two releases with the same tag are the same release regardless of any
/// other field.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Display name of the release.
    pub name: String,
    /// Git tag the release was created from. Identity key for skipping.
    pub tag_name: String,
    /// Changelog / release notes body.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether the release is an unpublished draft.
    #[serde(default)]
    pub draft: bool,
    /// Whether the release is flagged as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
    /// Commitish the release tag points at.
    #[serde(default)]
    pub target_commitish: Option<String>,
    /// Web page for the release.
    #[serde(default)]
    pub html_url: Option<Url>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Downloadable artifacts, in the order the API returned them.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Account that published the release.
    #[serde(default)]
    pub author: Option<Author>,
}

/// A downloadable artifact attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    /// API URL of the asset.
    pub url: Url,
    /// File name of the asset.
    pub name: String,
    /// Direct download link shown to users.
    #[serde(default)]
    pub browser_download_url: Option<Url>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub download_count: Option<u64>,
    /// Upload state. Unknown values are a parse error.
    #[serde(default)]
    pub state: Option<AssetState>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// URL a prompt should offer for download.
    ///
    /// Prefers the browser download link; falls back to the API URL when
    /// the asset has no browser link (e.g. still uploading).
    pub fn download_url(&self) -> &Url {
        self.browser_download_url.as_ref().unwrap_or(&self.url)
    }
}

/// Upload state of a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Uploaded,
    Open,
}

/// Account that authored a release. Read-only metadata for display.
#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<Url>,
    #[serde(default)]
    pub html_url: Option<Url>,
}

/// Decode a releases API response body into the release model.
///
/// # Errors
///
/// Returns [`UpdateError::Parse`] when the payload is not a JSON array of
/// releases matching the expected schema (missing required field, wrong
/// type, malformed timestamp).
pub fn parse_releases(bytes: &[u8]) -> Result<Vec<Release>> {
    serde_json::from_slice(bytes).map_err(|e| UpdateError::Parse(e.to_string()))
}
