//! Movement gate: decides whether a position report is worth a search.
//!
//! The gate is pure. It never records the position it approved; the pipeline
//! does that, and only when the gate is open.

use photowalk_common::{haversine_m, Position};

/// Minimum movement between two searches in the reference behavior.
pub const DEFAULT_THRESHOLD_M: f64 = 100.0;

/// `true` for the first position of a session, otherwise `true` iff the
/// ground distance to the last accepted trigger is at least `threshold_m`.
pub fn should_query(current: &Position, last: Option<&Position>, threshold_m: f64) -> bool {
    match last {
        None => true,
        Some(last) => haversine_m(last.lat, last.lon, current.lat, current.lon) >= threshold_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_position_always_opens() {
        assert!(should_query(&Position::new(10.0, 10.0), None, DEFAULT_THRESHOLD_M));
    }

    #[test]
    fn same_position_stays_closed() {
        let p = Position::new(10.0, 10.0);
        assert!(!should_query(&p, Some(&p), DEFAULT_THRESHOLD_M));
    }

    #[test]
    fn small_step_stays_closed() {
        // ~55 m north
        let last = Position::new(50.0, 8.0);
        let current = Position::new(50.0005, 8.0);
        assert!(!should_query(&current, Some(&last), DEFAULT_THRESHOLD_M));
    }

    #[test]
    fn large_step_opens() {
        // ~111 m north
        let last = Position::new(50.0, 8.0);
        let current = Position::new(50.001, 8.0);
        assert!(should_query(&current, Some(&last), DEFAULT_THRESHOLD_M));
    }

    #[test]
    fn threshold_is_inclusive() {
        let last = Position::new(0.0, 0.0);
        let current = Position::new(0.001, 0.0);
        let exact = haversine_m(last.lat, last.lon, current.lat, current.lon);
        assert!(should_query(&current, Some(&last), exact));
        assert!(!should_query(&current, Some(&last), exact + 1e-6));
    }

    #[test]
    fn zero_threshold_opens_even_without_movement() {
        let p = Position::new(1.0, 1.0);
        assert!(should_query(&p, Some(&p), 0.0));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let last = Position::new(44.9537, -93.0900);
        let current = Position::new(44.9545, -93.0900);
        let first = should_query(&current, Some(&last), DEFAULT_THRESHOLD_M);
        for _ in 0..100 {
            assert_eq!(should_query(&current, Some(&last), DEFAULT_THRESHOLD_M), first);
        }
    }
}
