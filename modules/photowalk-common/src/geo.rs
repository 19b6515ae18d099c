//! Distance helpers.
//!
//! Two different metrics on purpose: the movement gate needs real ground
//! distance in metres, while candidate ordering only needs a cheap relative
//! measure over a small search radius.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1_r.cos() * lat2_r.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Euclidean norm of the coordinate delta in degree space. Not a distance in
/// any physical unit; only meaningful for comparing points near each other.
pub fn planar_degree_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = lat1 - lat2;
    let d_lon = lon1 - lon2;
    (d_lat * d_lat + d_lon * d_lon).sqrt()
}
