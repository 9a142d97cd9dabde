//! Per-vertex rigidity and depth-alpha tables.
//!
//! A vertex is rigid ("dry") when the ground under it reaches the water
//! level. Alpha encodes how deep the water is relative to the fade depth,
//! quantized to `0..=255` so long runs compress well.

use bevy::math::Vec3;
use log::warn;

use crate::constants::ALPHA_OPEN_WATER;
use crate::frame::SurfaceFrame;
use crate::mesh::SurfaceLayout;
use crate::terrain::TerrainSampler;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceTables {
    /// One entry per grid vertex, row-major
    pub rigid: Vec<bool>,
    /// Quantized alpha, one entry per grid vertex, row-major
    pub alpha: Vec<u32>,
}

/// Quantizes a 0.0 - 1.0 alpha.
#[inline]
pub fn quantize_alpha(alpha: f32) -> u32 {
    (alpha.clamp(0.0, 1.0) * ALPHA_OPEN_WATER as f32).round() as u32
}

impl SurfaceTables {
    /// Fully open water with no depth information.
    pub fn open_water(vertex_count: usize) -> Self {
        Self {
            rigid: vec![false; vertex_count],
            alpha: vec![ALPHA_OPEN_WATER; vertex_count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rigid.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rigid.is_empty()
    }

    pub fn dry_count(&self) -> usize {
        self.rigid.iter().filter(|dry| **dry).count()
    }

    /// Alpha of a vertex back in 0.0 - 1.0.
    #[inline]
    pub fn alpha_at(&self, index: usize) -> f32 {
        self.alpha[index].min(ALPHA_OPEN_WATER) as f32 / ALPHA_OPEN_WATER as f32
    }

    /// Whether any corner of the surface footprint has terrain data.
    pub fn covers_footprint(
        layout: &SurfaceLayout,
        frame: &SurfaceFrame,
        terrain: &dyn TerrainSampler,
    ) -> bool {
        layout.corners().iter().any(|corner| {
            let xz = frame.surface_point_xz(layout.local_position(*corner));
            terrain.height_and_normal_at(xz).is_some()
        })
    }

    /// Samples the terrain under every vertex.
    ///
    /// Vertices without terrain data fall back to open water. When none of
    /// the footprint corners has data the terrain is assumed missing
    /// altogether and the whole table is open water.
    pub fn compute(
        layout: &SurfaceLayout,
        frame: &SurfaceFrame,
        fade_depth: f32,
        terrain: &dyn TerrainSampler,
    ) -> Self {
        let world_xz = |index: usize| frame.surface_point_xz(layout.local_position(index));

        if !Self::covers_footprint(layout, frame, terrain) {
            warn!(
                "No terrain data under any corner of the water surface at {:?}; assuming open water",
                frame.local_to_world(Vec3::ZERO)
            );
            return Self::open_water(layout.vertex_count());
        }

        let water_level = frame.water_level();
        let mut tables = Self::open_water(layout.vertex_count());
        let mut missing = 0usize;

        for index in 0..layout.vertex_count() {
            match terrain.height_and_normal_at(world_xz(index)) {
                Some((height, _normal)) => {
                    let depth = water_level - height;
                    tables.rigid[index] = depth <= 0.0;
                    tables.alpha[index] = quantize_alpha(depth / fade_depth);
                }
                None => missing += 1,
            }
        }

        if missing > 0 {
            warn!(
                "{} of {} water vertices have no terrain data; treating them as open water",
                missing,
                layout.vertex_count()
            );
        }

        tables
    }
}
