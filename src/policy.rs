//! Update decision policy.
//!
//! Turns a list of releases plus the persisted skip list into an offer
//! decision. Version semantics live entirely in the caller-supplied
//! predicate; this module never parses version numbers. List order is the
//! caller's responsibility (GitHub returns newest first) and is preserved:
//! the first eligible release wins.

use crate::github::{Asset, Release};
use std::sync::Arc;

/// Caller-supplied capability deciding whether a release qualifies as an
/// update (e.g. a semver greater-than check against the running version).
pub type UpdatePredicate = Arc<dyn Fn(&Release) -> bool + Send + Sync>;

/// Caller-supplied capability choosing which asset to offer for download.
///
/// Returning `None` means the release has no usable artifact; the check
/// still reports the update, just without a download.
pub type AssetSelector = Arc<dyn Fn(&[Asset]) -> Option<Asset> + Send + Sync>;

/// Default asset selector: the first asset, or `None` when the release
/// has no assets.
pub fn first_asset(assets: &[Asset]) -> Option<Asset> {
    assets.first().cloned()
}

/// Whether `release` should be offered to the user.
///
/// A skipped tag always wins over the predicate; the tag is matched
/// literally (an empty tag is legal and compared like any other).
pub fn should_offer(release: &Release, skipped: &[String], predicate: &UpdatePredicate) -> bool {
    if skipped.iter().any(|tag| tag == &release.tag_name) {
        return false;
    }
    predicate(release)
}

/// First release in `releases` (in the given order) that should be
/// offered, or `None` when nothing qualifies. An empty list is "no
/// update", not an error.
pub fn select_first_eligible<'a>(
    releases: &'a [Release],
    skipped: &[String],
    predicate: &UpdatePredicate,
) -> Option<&'a Release> {
    releases
        .iter()
        .find(|release| should_offer(release, skipped, predicate))
}
