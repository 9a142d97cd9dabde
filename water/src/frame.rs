//! Conversion between world space and surface-local space.
//!
//! Surface-local space has its origin at the surface's minimum corner at
//! water level: X runs along the width, Z along the length, Y is up.

use bevy::math::{Quat, Vec2, Vec3};
use bevy::prelude::Transform;

use crate::config::WaterSurfaceConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceFrame {
    /// World transform of the surface center
    origin: Transform,
    /// Offset from the center to the minimum corner (local)
    half_extent: Vec3,
}

impl SurfaceFrame {
    pub fn new(position: Vec3, yaw: f32, size: Vec2) -> Self {
        Self {
            origin: Transform::from_translation(position).with_rotation(Quat::from_rotation_y(yaw)),
            half_extent: Vec3::new(size.x * 0.5, 0.0, size.y * 0.5),
        }
    }

    pub fn from_config(config: &WaterSurfaceConfig) -> Self {
        Self::new(config.position, config.yaw, config.size)
    }

    /// World Y of the water surface.
    #[inline]
    pub fn water_level(&self) -> f32 {
        self.origin.translation.y
    }

    #[inline]
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.origin.transform_point(local - self.half_extent)
    }

    #[inline]
    pub fn world_to_local(&self, world: Vec3) -> Vec3 {
        self.origin.rotation.inverse() * (world - self.origin.translation) + self.half_extent
    }

    /// World XZ of a point on the surface given in local XZ.
    #[inline]
    pub fn surface_point_xz(&self, local_xz: Vec2) -> Vec2 {
        let world = self.local_to_world(Vec3::new(local_xz.x, 0.0, local_xz.y));
        Vec2::new(world.x, world.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_corner_maps_to_local_origin() {
        let frame = SurfaceFrame::new(Vec3::new(10.0, 2.0, -4.0), 0.0, Vec2::new(8.0, 6.0));
        let local = frame.world_to_local(Vec3::new(6.0, 2.0, -7.0));
        assert!(local.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_round_trip_with_yaw() {
        let frame = SurfaceFrame::new(Vec3::new(1.0, 0.5, 3.0), FRAC_PI_2, Vec2::new(20.0, 10.0));
        let world = Vec3::new(-2.0, 1.5, 7.0);
        let back = frame.local_to_world(frame.world_to_local(world));
        assert!(back.abs_diff_eq(world, 1e-4));
    }
}
