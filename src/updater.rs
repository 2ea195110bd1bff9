//! Update check orchestrator.
//!
//! Drives one check cycle (fetch, parse, decide, notify) on a spawned
//! task so the host's interaction thread never blocks on network I/O.
//! Within a cycle the stages run strictly in that order; across cycles
//! the only guarantee is single-flight: a check requested while another
//! is in flight emits [`UpdateEvent::CheckInProgress`] and starts
//! nothing, so one logical check never produces two fetches or two
//! prompts.
//!
//! Every fetch/parse failure is contained here: it becomes a
//! [`UpdateEvent::CheckFailed`] notification plus a diagnostic log entry
//! and never reaches the host as a panic or error return.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::fetch::{HttpFetcher, ReleaseFetcher};
use crate::github::{self, Asset, Release};
use crate::policy::{self, UpdatePredicate};
use crate::settings::{JsonFileStore, SettingsStore, UpdaterSettings};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use url::Url;

/// GitHub caps `per_page` at 100; larger requests are silently truncated
/// by the API, so the query builder clamps instead.
pub const MAX_RELEASES_PER_PAGE: u32 = 100;

/// Default settings namespace when the config names none.
const DEFAULT_NAMESPACE: &str = "nudge";

/// Outcome of a check cycle, delivered to the host's presentation layer.
///
/// The host renders these however it likes (dialog, toast, log line);
/// the updater never blocks on user interaction.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// An eligible release was found. `asset` is the artifact chosen by
    /// the configured selector; `None` means the release has no usable
    /// download and the prompt should say so instead of offering a link.
    UpdateFound {
        release: Release,
        asset: Option<Asset>,
    },
    /// No eligible release. Only emitted for checks requested with
    /// `show_if_latest = true`.
    UpToDate,
    /// The check failed (network, timeout, malformed payload). Also
    /// logged; hosts may surface or ignore it.
    CheckFailed { error: String },
    /// A check was requested while another one was still running.
    CheckInProgress,
}

/// Checks a GitHub repository's releases and reports whether the host
/// application should offer an update.
///
/// Construction seeds the persisted auto-check preference and, when that
/// preference is on, immediately starts a silent background check
/// (`show_if_latest = false`), so launching the app never produces
/// "you're up to date" noise. Constructors must therefore run inside a
/// Tokio runtime.
pub struct Updater {
    config: UpdaterConfig,
    settings: Arc<UpdaterSettings>,
    fetcher: Arc<dyn ReleaseFetcher>,
    events: mpsc::UnboundedSender<UpdateEvent>,
    checking: Arc<AtomicBool>,
}

impl Updater {
    /// Updater with the given settings store and an HTTP fetcher built
    /// from the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the
    /// settings store rejects the first-run defaults.
    pub fn new(
        config: UpdaterConfig,
        store: Box<dyn SettingsStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UpdateEvent>)> {
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
        Self::with_fetcher(config, store, fetcher)
    }

    /// Updater persisting to the platform config directory, under the
    /// configured namespace.
    pub fn with_default_store(
        config: UpdaterConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UpdateEvent>)> {
        let namespace = config
            .settings_namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());
        let store = JsonFileStore::for_namespace(&namespace)?;
        Self::new(config, Box::new(store))
    }

    /// Updater with an injected fetch capability. This is the seam tests
    /// use to substitute canned or failing fetchers.
    pub fn with_fetcher(
        config: UpdaterConfig,
        store: Box<dyn SettingsStore>,
        fetcher: Arc<dyn ReleaseFetcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UpdateEvent>)> {
        let settings = Arc::new(UpdaterSettings::new(store));
        settings.ensure_defaults(config.auto_check_by_default)?;

        let (events, receiver) = mpsc::unbounded_channel();
        let updater = Self {
            config,
            settings,
            fetcher,
            events,
            checking: Arc::new(AtomicBool::new(false)),
        };

        if updater.auto_check()? {
            updater.check_for_updates(false);
        }
        Ok((updater, receiver))
    }

    /// Start an asynchronous update check.
    ///
    /// Returns `true` if a new check was started. When a check is already
    /// in flight, emits [`UpdateEvent::CheckInProgress`] and returns
    /// `false` without fetching anything.
    ///
    /// `show_if_latest` controls whether a check that finds no eligible
    /// release still notifies with [`UpdateEvent::UpToDate`]: user-
    /// initiated checks want the confirmation, background checks do not.
    pub fn check_for_updates(&self, show_if_latest: bool) -> bool {
        if self
            .checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("update check already in flight");
            let _ = self.events.send(UpdateEvent::CheckInProgress);
            return false;
        }

        let url = match self.query_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("update check failed: {e}");
                let _ = self.events.send(UpdateEvent::CheckFailed {
                    error: e.to_string(),
                });
                self.checking.store(false, Ordering::Release);
                return true;
            }
        };

        let fetcher = Arc::clone(&self.fetcher);
        let settings = Arc::clone(&self.settings);
        let predicate = Arc::clone(&self.config.predicate);
        let selector = Arc::clone(&self.config.asset_selector);
        let events = self.events.clone();
        let checking = Arc::clone(&self.checking);

        tokio::spawn(async move {
            match run_check(fetcher.as_ref(), &url, &settings, &predicate).await {
                Ok(Some(release)) => {
                    let asset = selector(&release.assets);
                    if asset.is_none() {
                        tracing::warn!(
                            tag = %release.tag_name,
                            "update found but release has no downloadable asset"
                        );
                    } else {
                        tracing::info!(tag = %release.tag_name, "update available");
                    }
                    let _ = events.send(UpdateEvent::UpdateFound { release, asset });
                }
                Ok(None) => {
                    tracing::debug!("no eligible release");
                    if show_if_latest {
                        let _ = events.send(UpdateEvent::UpToDate);
                    }
                }
                Err(e) => {
                    tracing::warn!("update check failed: {e}");
                    let _ = events.send(UpdateEvent::CheckFailed {
                        error: e.to_string(),
                    });
                }
            }
            // Terminal notification is sent before the guard drops, so a
            // follow-up check can never race a still-pending prompt.
            checking.store(false, Ordering::Release);
        });
        true
    }

    /// Whether a check is currently in flight. `false` means the updater
    /// is idle and the next [`check_for_updates`](Self::check_for_updates)
    /// will start a fresh cycle.
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    /// Whether a silent check runs at startup.
    pub fn auto_check(&self) -> Result<bool> {
        self.settings.auto_check()
    }

    /// Persist the auto-check preference. Takes effect on the next
    /// construction; it does not start or stop anything now.
    pub fn set_auto_check(&self, value: bool) -> Result<()> {
        self.settings.set_auto_check(value)
    }

    /// Tags the user opted out of, oldest first.
    pub fn skipped_versions(&self) -> Result<Vec<String>> {
        self.settings.skipped_versions()
    }

    /// Never offer `tag` again. Idempotent.
    pub fn skip_version(&self, tag: &str) -> Result<()> {
        self.settings.skip(tag)
    }

    /// Allow `tag` to be offered again. No-op when it was never skipped.
    pub fn unskip_version(&self, tag: &str) -> Result<()> {
        self.settings.unskip(tag)
    }

    /// Forget every skipped version.
    pub fn clear_skipped_versions(&self) -> Result<()> {
        self.settings.clear_skipped()
    }

    fn query_url(&self) -> Result<Url> {
        release_query_url(
            &self.config.project_url,
            self.config.api_base.as_ref(),
            self.config.max_releases,
        )
    }
}

/// One check cycle up to the decision: fetch, parse, select.
async fn run_check(
    fetcher: &dyn ReleaseFetcher,
    url: &Url,
    settings: &UpdaterSettings,
    predicate: &UpdatePredicate,
) -> Result<Option<Release>> {
    let bytes = fetcher.fetch(url).await?;
    let releases = github::parse_releases(&bytes)?;
    let skipped = settings.skipped_versions()?;
    Ok(policy::select_first_eligible(&releases, &skipped, predicate).cloned())
}

/// Build the releases query URL for a project page.
///
/// Rewrites the host to the API endpoint (or `api_base` when given),
/// prefixes the repository path with `/repos`, appends `/releases`, and
/// sets `per_page` to `max_releases` clamped to
/// [`MAX_RELEASES_PER_PAGE`].
///
/// # Errors
///
/// Returns [`UpdateError::Config`] when the project URL has no host or
/// no repository path.
pub fn release_query_url(
    project_url: &Url,
    api_base: Option<&Url>,
    max_releases: u32,
) -> Result<Url> {
    if project_url.host_str().is_none() {
        return Err(UpdateError::Config(format!(
            "project URL has no host: {project_url}"
        )));
    }
    let repo_path = project_url.path().trim_end_matches('/');
    if repo_path.is_empty() {
        return Err(UpdateError::Config(format!(
            "project URL has no repository path: {project_url}"
        )));
    }

    let mut url = match api_base {
        Some(base) => base.clone(),
        None => Url::parse("https://api.github.com")
            .map_err(|e| UpdateError::Config(e.to_string()))?,
    };
    let base_path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{base_path}/repos{repo_path}/releases"));
    url.set_query(None);

    let per_page = max_releases.clamp(1, MAX_RELEASES_PER_PAGE);
    url.query_pairs_mut()
        .append_pair("per_page", &per_page.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    const RELEASES_JSON: &str = r#"[{
        "name": "v2.0", "tag_name": "v2.0",
        "assets": [{"url": "http://x/api/1", "name": "app.zip",
                    "browser_download_url": "http://x/app.zip"}]
    }]"#;

    /// Fetcher returning a canned payload, counting calls, optionally
    /// holding each fetch until released.
    struct StubFetcher {
        body: std::result::Result<Vec<u8>, UpdateError>,
        calls: AtomicUsize,
        gate: Option<Notify>,
    }

    impl StubFetcher {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Ok(body.as_bytes().to_vec()),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn failing(error: UpdateError) -> Arc<Self> {
            Arc::new(Self {
                body: Err(error),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Ok(body.as_bytes().to_vec()),
                calls: AtomicUsize::new(0),
                gate: Some(Notify::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReleaseFetcher for StubFetcher {
        async fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.body {
                Ok(bytes) => Ok(bytes.clone()),
                Err(UpdateError::Timeout) => Err(UpdateError::Timeout),
                Err(e) => Err(UpdateError::Network(e.to_string())),
            }
        }
    }

    fn test_config() -> UpdaterConfig {
        let url = Url::parse("https://github.com/acme/widget").unwrap();
        // Background auto-check off so each test drives its own checks.
        UpdaterConfig::new(url, |r| r.tag_name.as_str() > "v1.0").with_auto_check_default(false)
    }

    fn build(
        config: UpdaterConfig,
        fetcher: Arc<StubFetcher>,
    ) -> (Updater, mpsc::UnboundedReceiver<UpdateEvent>) {
        Updater::with_fetcher(config, Box::new(MemoryStore::new()), fetcher).unwrap()
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<UpdateEvent>) -> UpdateEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for update event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn found_emits_release_and_first_asset() {
        let (updater, mut rx) = build(test_config(), StubFetcher::ok(RELEASES_JSON));
        assert!(updater.check_for_updates(false));

        match next_event(&mut rx).await {
            UpdateEvent::UpdateFound { release, asset } => {
                assert_eq!(release.tag_name, "v2.0");
                let asset = asset.expect("release has an asset");
                assert_eq!(asset.name, "app.zip");
                assert_eq!(asset.download_url().as_str(), "http://x/app.zip");
            }
            other => panic!("expected UpdateFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn skipped_release_is_up_to_date() {
        let (updater, mut rx) = build(test_config(), StubFetcher::ok(RELEASES_JSON));
        updater.skip_version("v2.0").unwrap();
        updater.check_for_updates(true);
        assert!(matches!(next_event(&mut rx).await, UpdateEvent::UpToDate));
    }

    #[tokio::test]
    async fn empty_release_list_is_up_to_date() {
        let (updater, mut rx) = build(test_config(), StubFetcher::ok("[]"));
        updater.check_for_updates(true);
        assert!(matches!(next_event(&mut rx).await, UpdateEvent::UpToDate));
    }

    #[tokio::test]
    async fn silent_check_suppresses_up_to_date() {
        let fetcher = StubFetcher::ok("[]");
        let (updater, mut rx) = build(test_config(), Arc::clone(&fetcher));

        updater.check_for_updates(false);
        while updater.is_checking() {
            tokio::task::yield_now().await;
        }

        // The terminal event (if any) is sent before the updater goes
        // idle, so an empty channel here proves the check stayed silent.
        assert_eq!(fetcher.call_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_without_assets_is_found_without_download() {
        let json = r#"[{"name": "v2.0", "tag_name": "v2.0"}]"#;
        let (updater, mut rx) = build(test_config(), StubFetcher::ok(json));
        updater.check_for_updates(false);

        match next_event(&mut rx).await {
            UpdateEvent::UpdateFound { release, asset } => {
                assert_eq!(release.tag_name, "v2.0");
                assert!(asset.is_none());
            }
            other => panic!("expected UpdateFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_asset_selector_applies() {
        let json = r#"[{"name": "v2.0", "tag_name": "v2.0", "assets": [
            {"url": "http://x/api/1", "name": "app.zip"},
            {"url": "http://x/api/2", "name": "app.dmg"}
        ]}]"#;
        let config = test_config().with_asset_selector(|assets| {
            assets.iter().find(|a| a.name.ends_with(".dmg")).cloned()
        });
        let (updater, mut rx) = build(config, StubFetcher::ok(json));
        updater.check_for_updates(false);

        match next_event(&mut rx).await {
            UpdateEvent::UpdateFound { asset, .. } => {
                assert_eq!(asset.unwrap().name, "app.dmg");
            }
            other => panic!("expected UpdateFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_failure_becomes_check_failed() {
        let fetcher = StubFetcher::failing(UpdateError::Network("connection refused".into()));
        let (updater, mut rx) = build(test_config(), fetcher);
        updater.check_for_updates(true);

        match next_event(&mut rx).await {
            UpdateEvent::CheckFailed { error } => {
                assert!(error.contains("connection refused"));
            }
            other => panic!("expected CheckFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_becomes_check_failed() {
        let (updater, mut rx) = build(test_config(), StubFetcher::ok(r#"[{"name": "no tag"}]"#));
        updater.check_for_updates(false);
        assert!(matches!(
            next_event(&mut rx).await,
            UpdateEvent::CheckFailed { .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_check_is_single_flight() {
        let fetcher = StubFetcher::gated(RELEASES_JSON);
        let (updater, mut rx) = build(test_config(), Arc::clone(&fetcher));

        assert!(updater.check_for_updates(false));
        while fetcher.call_count() < 1 {
            tokio::task::yield_now().await;
        }

        // Second request while the first fetch is parked on the gate.
        assert!(!updater.check_for_updates(false));
        assert!(matches!(
            next_event(&mut rx).await,
            UpdateEvent::CheckInProgress
        ));

        fetcher.gate.as_ref().unwrap().notify_one();
        assert!(matches!(
            next_event(&mut rx).await,
            UpdateEvent::UpdateFound { .. }
        ));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn check_allowed_again_after_completion() {
        let fetcher = StubFetcher::ok(RELEASES_JSON);
        let (updater, mut rx) = build(test_config(), Arc::clone(&fetcher));

        updater.check_for_updates(false);
        assert!(matches!(
            next_event(&mut rx).await,
            UpdateEvent::UpdateFound { .. }
        ));
        while updater.is_checking() {
            tokio::task::yield_now().await;
        }

        assert!(updater.check_for_updates(false));
        assert!(matches!(
            next_event(&mut rx).await,
            UpdateEvent::UpdateFound { .. }
        ));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn auto_check_runs_silently_at_construction() {
        let fetcher = StubFetcher::ok("[]");
        let config = test_config().with_auto_check_default(true);
        let (updater, mut rx) = Updater::with_fetcher(
            config,
            Box::new(MemoryStore::new()),
            fetcher.clone(),
        )
        .unwrap();

        while updater.is_checking() {
            tokio::task::yield_now().await;
        }
        // Silent check ran: one fetch, nothing emitted.
        assert_eq!(fetcher.call_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stored_preference_disables_auto_check() {
        let store = MemoryStore::new();
        store.set_bool(crate::settings::AUTO_CHECK_KEY, false).unwrap();
        let fetcher = StubFetcher::ok(RELEASES_JSON);
        let config = test_config().with_auto_check_default(true);
        let (updater, _rx) =
            Updater::with_fetcher(config, Box::new(store), fetcher.clone()).unwrap();

        assert!(!updater.auto_check().unwrap());
        tokio::task::yield_now().await;
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn query_url_rewrites_host_and_path() {
        let project = Url::parse("https://github.com/acme/widget").unwrap();
        let url = release_query_url(&project, None, 5).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/widget/releases?per_page=5"
        );
    }

    #[test]
    fn query_url_clamps_per_page() {
        let project = Url::parse("https://github.com/acme/widget").unwrap();
        let url = release_query_url(&project, None, 500).unwrap();
        assert!(url.as_str().ends_with("per_page=100"));

        let url = release_query_url(&project, None, 0).unwrap();
        assert!(url.as_str().ends_with("per_page=1"));
    }

    #[test]
    fn query_url_honors_api_base_override() {
        let project = Url::parse("https://github.com/acme/widget").unwrap();
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        let url = release_query_url(&project, Some(&base), 1).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/repos/acme/widget/releases?per_page=1"
        );
    }

    #[test]
    fn query_url_rejects_project_without_repo_path() {
        let project = Url::parse("https://github.com").unwrap();
        assert!(matches!(
            release_query_url(&project, None, 1),
            Err(UpdateError::Config(_))
        ));
    }
}
