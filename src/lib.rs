//! Nudge: GitHub-release update checker for desktop applications.
//!
//! Polls a repository's releases endpoint, decides whether the embedding
//! application should be offered an update, and reports the outcome over
//! an async channel for the host to render:
//!
//! Fetch → Parse → Decide → Notify
//!
//! # Architecture
//!
//! - **Release model** ([`github`]): decodes the releases API payload
//!   into [`Release`]/[`Asset`]/[`Author`].
//! - **Decision policy** ([`policy`]): first eligible release wins; the
//!   skip list always beats the caller-supplied version predicate, and
//!   the crate never parses version numbers itself.
//! - **Orchestrator** ([`updater`]): owns the check cycle, the
//!   single-flight guard, and error containment. Network and parse
//!   failures become [`UpdateEvent::CheckFailed`] notifications, never
//!   panics.
//!
//! Presentation, download, and installation stay with the host; the
//! closest this crate gets is resolving a download URL from release
//! metadata.
//!
//! # Example
//!
//! ```no_run
//! use nudge::{MemoryStore, Updater, UpdaterConfig};
//! use url::Url;
//!
//! # async fn demo() -> nudge::Result<()> {
//! let config = UpdaterConfig::new(
//!     Url::parse("https://github.com/acme/widget").expect("valid URL"),
//!     |release| release.tag_name.as_str() > concat!("v", env!("CARGO_PKG_VERSION")),
//! );
//! let (updater, mut events) = Updater::new(config, Box::new(MemoryStore::new()))?;
//!
//! updater.check_for_updates(true);
//! if let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod policy;
pub mod settings;
pub mod updater;

pub use config::UpdaterConfig;
pub use error::{Result, UpdateError};
pub use fetch::{HttpFetcher, ReleaseFetcher};
pub use github::{Asset, AssetState, Author, Release};
pub use policy::{AssetSelector, UpdatePredicate};
pub use settings::{JsonFileStore, MemoryStore, SettingsStore, UpdaterSettings};
pub use updater::{UpdateEvent, Updater};
