//! Orientation helpers shared by the motion engine and the coupling manager.
//!
//! Yaw is measured in degrees; a yaw of 0 faces +z (south) and 90 faces -x
//! (west), so the heading vector of a yaw is `(-sin(yaw), 0, cos(yaw))`.

use bevy::math::DVec3;

/// Wrap an angle into `(-180, 180]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Absolute difference between two angles, in `[0, 180]`.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    wrap_angle(a - b).abs()
}

/// Yaw that faces along the horizontal direction `(dx, dz)`.
pub fn look_at_yaw(dx: f64, dz: f64) -> f64 {
    (-dx).atan2(dz).to_degrees()
}

/// Pitch of a displacement; positive when moving upwards.
pub fn look_at_pitch(dx: f64, dy: f64, dz: f64) -> f64 {
    dy.atan2((dx * dx + dz * dz).sqrt()).to_degrees()
}

/// Unit heading vector of a yaw.
pub fn yaw_heading(yaw: f64) -> DVec3 {
    let r = yaw.to_radians();
    DVec3::new(-r.sin(), 0.0, r.cos())
}

/// Horizontal part of a vector.
pub fn horizontal(v: DVec3) -> DVec3 {
    DVec3::new(v.x, 0.0, v.z)
}

/// Planar (xz) distance between two points.
pub fn distance_xz(a: DVec3, b: DVec3) -> f64 {
    horizontal(a - b).length()
}

/// Replace NaN components with zero.
pub fn sanitize(v: DVec3) -> DVec3 {
    DVec3::new(
        if v.x.is_nan() { 0.0 } else { v.x },
        if v.y.is_nan() { 0.0 } else { v.y },
        if v.z.is_nan() { 0.0 } else { v.z },
    )
}
