//! Saturating limits for drive commands
//!
//! Out-of-range values are clamped, never rejected: the robot firmware
//! saturates the same way.

use crate::oi::{MAX_RADIUS, MAX_SPEED, Radius};

/// Clamp a speed (mm/s) into [-500, 500]
#[inline]
pub fn clamp_speed(speed: i32) -> i16 {
    speed.clamp(-MAX_SPEED, MAX_SPEED) as i16
}

/// Clamp both wheel speeds of a direct drive
pub fn clamp_drive_direct(left: i32, right: i32) -> (i16, i16) {
    (clamp_speed(left), clamp_speed(right))
}

/// Clamp speed and radius of a radius drive
///
/// Radius sentinels (0x7FFF, 0x8000, 0xFFFF) pass through untouched; any
/// other radius is clamped into [-2000, 2000].
pub fn clamp_drive_radius(speed: i32, radius: i32) -> (i16, Radius) {
    let radius = Radius::sentinel(radius)
        .unwrap_or_else(|| Radius::Curve(radius.clamp(-MAX_RADIUS, MAX_RADIUS) as i16));
    (clamp_speed(speed), radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oi::{RADIUS_SPIN, RADIUS_STRAIGHT_LEFT, RADIUS_STRAIGHT_RIGHT};

    #[test]
    fn test_drive_direct_saturates() {
        assert_eq!(clamp_drive_direct(500, 500), (500, 500));
        assert_eq!(clamp_drive_direct(600, -900), (500, -500));
        assert_eq!(clamp_drive_direct(-500, 499), (-500, 499));
        assert_eq!(clamp_drive_direct(i32::MAX, i32::MIN), (500, -500));
    }

    #[test]
    fn test_drive_direct_always_in_range() {
        for left in (-40_000..=40_000).step_by(137) {
            let (l, r) = clamp_drive_direct(left, -left);
            assert!((-500..=500).contains(&l));
            assert!((-500..=500).contains(&r));
        }
    }

    #[test]
    fn test_drive_radius_clamps_ordinary_values() {
        assert_eq!(clamp_drive_radius(200, 3000), (200, Radius::Curve(2000)));
        assert_eq!(clamp_drive_radius(-700, -2500), (-500, Radius::Curve(-2000)));
        assert_eq!(clamp_drive_radius(100, 0), (100, Radius::Curve(0)));
        assert_eq!(clamp_drive_radius(100, -1), (100, Radius::Curve(-1)));
    }

    #[test]
    fn test_drive_radius_sentinels_pass_through() {
        assert_eq!(
            clamp_drive_radius(900, RADIUS_STRAIGHT_RIGHT),
            (500, Radius::StraightRight)
        );
        assert_eq!(
            clamp_drive_radius(200, RADIUS_STRAIGHT_LEFT),
            (200, Radius::StraightLeft)
        );
        assert_eq!(clamp_drive_radius(-150, RADIUS_SPIN), (-150, Radius::Spin));
        assert_eq!(Radius::Spin.value(), RADIUS_SPIN);
    }

    #[test]
    fn test_non_sentinel_large_radius_is_clamped() {
        // One off the sentinels is an ordinary radius
        assert_eq!(clamp_drive_radius(0, 0x7ffe), (0, Radius::Curve(2000)));
        assert_eq!(clamp_drive_radius(0, 0x8001), (0, Radius::Curve(2000)));
        assert_eq!(clamp_drive_radius(0, 0x10000), (0, Radius::Curve(2000)));
    }
}
