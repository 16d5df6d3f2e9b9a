//! Differential drive kinematics for the simulated robot
//!
//! Units: millimetres, seconds, radians (CCW from +X).

use std::f32::consts::{PI, TAU};

/// Pose of the simulated robot
#[derive(Debug, Clone)]
pub struct PhysicsState {
    /// X position in world frame (mm)
    x: f32,
    /// Y position in world frame (mm)
    y: f32,
    /// Orientation angle (radians, CCW from +X)
    theta: f32,
}

/// Motion produced by one update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    /// Signed distance travelled by the robot centre (mm)
    pub distance: f32,
    /// Signed rotation (radians, CCW positive)
    pub rotation: f32,
}

impl PhysicsState {
    /// Create new physics state at given pose
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn theta(&self) -> f32 {
        self.theta
    }

    /// Advance the pose by `dt` seconds at the given wheel speeds (mm/s)
    pub fn update(&mut self, dt: f32, left: f32, right: f32, wheel_base: f32) -> Motion {
        let linear_vel = (left + right) / 2.0;
        let angular_vel = (right - left) / wheel_base;

        let (new_x, new_y, new_theta) = if angular_vel.abs() < 1e-6 {
            // Straight line motion
            let new_x = self.x + linear_vel * self.theta.cos() * dt;
            let new_y = self.y + linear_vel * self.theta.sin() * dt;
            (new_x, new_y, self.theta)
        } else {
            // Arc motion
            let r = linear_vel / angular_vel;
            let new_theta = self.theta + angular_vel * dt;
            let new_x = self.x + r * (new_theta.sin() - self.theta.sin());
            let new_y = self.y + r * (self.theta.cos() - new_theta.cos());
            (new_x, new_y, new_theta)
        };

        self.x = new_x;
        self.y = new_y;
        self.theta = normalize_angle(new_theta);

        Motion {
            distance: linear_vel * dt,
            rotation: angular_vel * dt,
        }
    }
}

/// Wheel speeds (left, right) for a centre speed along a turn radius
///
/// Differential drive kinematics:
/// v_l = v - ω * wheel_base / 2
/// v_r = v + ω * wheel_base / 2
/// with ω = v / radius.
pub fn wheel_velocities(speed: f32, radius: f32, wheel_base: f32) -> (f32, f32) {
    let angular_vel = speed / radius;
    let half_base = wheel_base / 2.0;
    (
        speed - angular_vel * half_base,
        speed + angular_vel * half_base,
    )
}

/// Normalize angle to [-π, π)
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a >= PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}
