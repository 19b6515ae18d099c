//! Candidate ordering by proximity.

use photowalk_common::{planar_degree_distance, PhotoCandidate, Position};

/// Drop candidates without usable geo data and sort the rest nearest-first.
///
/// Proximity is the planar degree-space norm, which is good enough for the
/// relative ordering of photos inside a small search radius. The sort is
/// stable, so equally distant candidates keep the order the search returned.
pub fn rank(candidates: Vec<PhotoCandidate>, reference: &Position) -> Vec<PhotoCandidate> {
    let mut scored: Vec<(f64, PhotoCandidate)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let geo = candidate.geo.filter(|g| g.is_usable())?;
            let score = planar_degree_distance(geo.lat, geo.lon, reference.lat, reference.lon);
            Some((score, candidate))
        })
        .collect();

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}
