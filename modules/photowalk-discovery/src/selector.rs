//! Picks the next photo a session has not shown yet.

use std::collections::HashSet;

use photowalk_common::{PhotoCandidate, PhotoReference};

/// Reference of the first candidate in `ranked` that is not in `already_seen`,
/// or `None` when every candidate (possibly zero) has been seen.
pub fn select_next(
    ranked: &[PhotoCandidate],
    already_seen: &HashSet<PhotoReference>,
) -> Option<PhotoReference> {
    ranked
        .iter()
        .map(PhotoCandidate::reference)
        .find(|reference| !already_seen.contains(reference))
}
