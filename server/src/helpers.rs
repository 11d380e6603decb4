//! Small shared utilities: timestamps, distances, heading math.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::repository::Heading;

/// Seconds since the Unix epoch, fractional. Expiry timestamps
/// (poison, morph, summon, paralysis) are stored in this clock.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn manhattan(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    (x1 - x2).abs() + (y1 - y2).abs()
}

/// `max(|dx|, |dy|)`; the visibility metric.
pub fn chebyshev(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    (x1 - x2).abs().max((y1 - y2).abs())
}

/// Unit step for a heading.
pub fn heading_delta(heading: Heading) -> (i32, i32) {
    match heading {
        Heading::North => (0, -1),
        Heading::East => (1, 0),
        Heading::South => (0, 1),
        Heading::West => (-1, 0),
    }
}

/// One greedy step toward a target, preferring the axis with the larger
/// gap. Returns the candidate tile and the heading taken.
pub fn step_towards(from_x: i32, from_y: i32, to_x: i32, to_y: i32) -> (i32, i32, Heading) {
    let dx = to_x - from_x;
    let dy = to_y - from_y;

    if dx.abs() > dy.abs() {
        if dx > 0 {
            (from_x + 1, from_y, Heading::East)
        } else {
            (from_x - 1, from_y, Heading::West)
        }
    } else if dy > 0 {
        (from_x, from_y + 1, Heading::South)
    } else {
        (from_x, from_y - 1, Heading::North)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        assert_eq!(manhattan(0, 0, 3, 4), 7);
        assert_eq!(chebyshev(0, 0, 3, 4), 4);
        assert_eq!(chebyshev(10, 10, -5, 10), 15);
    }

    #[test]
    fn step_prefers_larger_axis() {
        assert_eq!(step_towards(0, 0, 5, 2), (1, 0, Heading::East));
        assert_eq!(step_towards(0, 0, -5, 2), (-1, 0, Heading::West));
        assert_eq!(step_towards(0, 0, 1, 4), (0, 1, Heading::South));
        assert_eq!(step_towards(0, 0, 1, -4), (0, -1, Heading::North));
    }

    #[test]
    fn heading_deltas_are_unit_steps() {
        for h in [Heading::North, Heading::East, Heading::South, Heading::West] {
            let (dx, dy) = heading_delta(h);
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }
}
