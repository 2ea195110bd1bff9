//! Updater configuration.

use crate::github::{Asset, Release};
use crate::policy::{self, AssetSelector, UpdatePredicate};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default number of releases requested per check.
pub const DEFAULT_MAX_RELEASES: u32 = 1;

/// Default deadline for one releases fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for an [`Updater`](crate::Updater).
///
/// Only the project URL and the update predicate are required; everything
/// else has a sensible default. The predicate carries the embedding
/// application's version semantics (typically "is this release's tag newer
/// than the running version"), which the updater itself never interprets.
#[derive(Clone)]
pub struct UpdaterConfig {
    /// Project page on GitHub, e.g. `https://github.com/acme/widget`.
    pub project_url: Url,
    /// Namespace for the persisted settings file. `None` selects the
    /// shared default namespace of the chosen store.
    pub settings_namespace: Option<String>,
    /// Auto-check value seeded into the settings store on first run.
    pub auto_check_by_default: bool,
    /// Releases requested per check (`per_page`). Clamped to GitHub's
    /// documented maximum of 100 when building the query URL.
    pub max_releases: u32,
    /// Deadline for one releases fetch.
    pub fetch_timeout: Duration,
    /// Override for the API endpoint. `None` means `api.github.com`;
    /// tests point this at a local mock server.
    pub api_base: Option<Url>,
    pub(crate) predicate: UpdatePredicate,
    pub(crate) asset_selector: AssetSelector,
}

impl UpdaterConfig {
    /// Configuration with default options for `project_url`, offering
    /// updates for releases accepted by `predicate`.
    pub fn new(
        project_url: Url,
        predicate: impl Fn(&Release) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            project_url,
            settings_namespace: None,
            auto_check_by_default: true,
            max_releases: DEFAULT_MAX_RELEASES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            api_base: None,
            predicate: Arc::new(predicate),
            asset_selector: Arc::new(policy::first_asset),
        }
    }

    /// Scope persisted settings to `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.settings_namespace = Some(namespace.into());
        self
    }

    /// Set the auto-check value used when no preference is stored yet.
    pub fn with_auto_check_default(mut self, value: bool) -> Self {
        self.auto_check_by_default = value;
        self
    }

    /// Request up to `max` releases per check.
    pub fn with_max_releases(mut self, max: u32) -> Self {
        self.max_releases = max;
        self
    }

    /// Set the fetch deadline.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Send release queries to `base` instead of `api.github.com`.
    pub fn with_api_base(mut self, base: Url) -> Self {
        self.api_base = Some(base);
        self
    }

    /// Replace the default first-asset-or-none selector.
    pub fn with_asset_selector(
        mut self,
        selector: impl Fn(&[Asset]) -> Option<Asset> + Send + Sync + 'static,
    ) -> Self {
        self.asset_selector = Arc::new(selector);
        self
    }
}
