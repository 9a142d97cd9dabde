//! Terrain/collision queries used while building the shoreline tables.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{WaterError, WaterResult};

/// Source of ground height under the water surface.
///
/// Queried from background loading tasks, hence `Send + Sync`.
pub trait TerrainSampler: Send + Sync {
    /// Ground height and normal at a world XZ position, or `None` when no
    /// terrain/collision data covers that point.
    fn height_and_normal_at(&self, world_xz: Vec2) -> Option<(f32, Vec3)>;
}

impl<F> TerrainSampler for F
where
    F: Fn(Vec2) -> Option<(f32, Vec3)> + Send + Sync,
{
    fn height_and_normal_at(&self, world_xz: Vec2) -> Option<(f32, Vec3)> {
        self(world_xz)
    }
}

/// Infinite flat ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatTerrain {
    pub height: f32,
}

impl TerrainSampler for FlatTerrain {
    fn height_and_normal_at(&self, _world_xz: Vec2) -> Option<(f32, Vec3)> {
        Some((self.height, Vec3::Y))
    }
}

/// Regular grid of ground heights, bilinearly interpolated.
///
/// Points outside the grid have no terrain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightmapTerrain {
    /// World XZ of the sample at (0, 0)
    pub origin: Vec2,
    pub spacing: f32,
    pub columns: u32,
    pub rows: u32,
    /// Row-major heights, `columns * rows` entries
    pub heights: Vec<f32>,
}

impl HeightmapTerrain {
    pub fn new(
        origin: Vec2,
        spacing: f32,
        columns: u32,
        rows: u32,
        heights: Vec<f32>,
    ) -> WaterResult<Self> {
        let terrain = Self {
            origin,
            spacing,
            columns,
            rows,
            heights,
        };
        terrain.validate()?;
        Ok(terrain)
    }

    /// Checks dimensions; needed after deserializing.
    pub fn validate(&self) -> WaterResult<()> {
        if !self.spacing.is_finite() || self.spacing <= 0.0 || self.columns < 2 || self.rows < 2 {
            return Err(WaterError::invalid_config(
                "heightmap needs a positive spacing and at least 2x2 samples",
            ));
        }
        let expected = self.columns as usize * self.rows as usize;
        if self.heights.len() != expected {
            return Err(WaterError::invalid_config(format!(
                "heightmap has {} samples, expected {expected}",
                self.heights.len()
            )));
        }
        Ok(())
    }

    #[inline]
    fn height(&self, column: u32, row: u32) -> f32 {
        self.heights[(row * self.columns + column) as usize]
    }
}

impl TerrainSampler for HeightmapTerrain {
    fn height_and_normal_at(&self, world_xz: Vec2) -> Option<(f32, Vec3)> {
        let grid = (world_xz - self.origin) / self.spacing;
        let max = Vec2::new((self.columns - 1) as f32, (self.rows - 1) as f32);
        if grid.x < 0.0 || grid.y < 0.0 || grid.x > max.x || grid.y > max.y {
            return None;
        }

        let c0 = (grid.x.floor() as u32).min(self.columns - 2);
        let r0 = (grid.y.floor() as u32).min(self.rows - 2);
        let fx = grid.x - c0 as f32;
        let fz = grid.y - r0 as f32;

        let h00 = self.height(c0, r0);
        let h10 = self.height(c0 + 1, r0);
        let h01 = self.height(c0, r0 + 1);
        let h11 = self.height(c0 + 1, r0 + 1);

        let top = h00 + (h10 - h00) * fx;
        let bottom = h01 + (h11 - h01) * fx;
        let height = top + (bottom - top) * fz;

        // Gradient of the bilinear patch
        let dhdx = ((h10 - h00) * (1.0 - fz) + (h11 - h01) * fz) / self.spacing;
        let dhdz = ((h01 - h00) * (1.0 - fx) + (h11 - h10) * fx) / self.spacing;
        let normal = Vec3::new(-dhdx, 1.0, -dhdz).normalize_or(Vec3::Y);

        Some((height, normal))
    }
}
