//! Shoreline-relative direction/distance field.
//!
//! Foam and ripple damping near a bank need to know how far a vertex is from
//! the shore and which way the shore lies. Instead of a real distance
//! transform, every vertex blends the directions to the bank-line samples
//! within an interpolation radius, weighted by inverse squared distance.
//!
//! ## Sign convention
//! The direction always points towards deeper water: dry vertices point at
//! the shore, wet vertices point away from it.

use bevy::math::Vec2;

use crate::config::ShoreTuning;
use crate::constants::BANK_DISTANCE_SENTINEL;
use crate::mesh::SurfaceLayout;

/// Field value at one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BankSample {
    pub direction: Vec2,
    pub distance: f32,
}

impl BankSample {
    /// No bank sample within range.
    pub const SENTINEL: BankSample = BankSample {
        direction: Vec2::ZERO,
        distance: BANK_DISTANCE_SENTINEL,
    };

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.distance == BANK_DISTANCE_SENTINEL
    }

    /// Foam intensity in `[0, 1]`: `bias + scale * proximity`, where
    /// proximity falls linearly from 1 on the bank line to 0 at the
    /// interpolation radius. Vertices out of range get the bias alone.
    pub fn foam(&self, shore: &ShoreTuning) -> f32 {
        let proximity = if self.is_sentinel() || shore.interpolation_radius <= 0.0 {
            0.0
        } else {
            1.0 - (self.distance / shore.interpolation_radius).clamp(0.0, 1.0)
        };
        (shore.foam_bias + shore.foam_scale * proximity).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankField {
    samples: Vec<BankSample>,
    bank_points: usize,
}

impl BankField {
    /// A field with no shoreline at all.
    pub fn empty(vertex_count: usize) -> Self {
        Self {
            samples: vec![BankSample::SENTINEL; vertex_count],
            bank_points: 0,
        }
    }

    #[inline]
    pub fn sample(&self, index: usize) -> BankSample {
        self.samples[index]
    }

    #[inline]
    pub fn samples(&self) -> &[BankSample] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of bank-line vertices the field was built from.
    #[inline]
    pub fn bank_point_count(&self) -> usize {
        self.bank_points
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BankFieldBuilder {
    radius_sq: f32,
}

impl BankFieldBuilder {
    pub fn new(interpolation_radius: f32) -> Self {
        Self {
            radius_sq: interpolation_radius * interpolation_radius,
        }
    }

    /// Flips vertices whose every neighbor has the opposite wetness, so a
    /// single stray sample does not produce a speckle of bank points.
    fn prune_isolated(layout: &SurfaceLayout, rigid: &[bool]) -> Vec<bool> {
        (0..layout.vertex_count())
            .map(|index| {
                let mut neighbors = layout.neighbors4(index).peekable();
                if neighbors.peek().is_none() {
                    return rigid[index];
                }
                let isolated = neighbors.all(|n| rigid[n] != rigid[index]);
                if isolated {
                    !rigid[index]
                } else {
                    rigid[index]
                }
            })
            .collect()
    }

    /// Vertices with at least one neighbor of the opposite wetness.
    fn bank_line(layout: &SurfaceLayout, rigid: &[bool]) -> Vec<usize> {
        (0..layout.vertex_count())
            .filter(|index| layout.neighbors4(*index).any(|n| rigid[n] != rigid[*index]))
            .collect()
    }

    pub fn build(&self, layout: &SurfaceLayout, rigid: &[bool]) -> BankField {
        debug_assert_eq!(rigid.len(), layout.vertex_count());

        let pruned = Self::prune_isolated(layout, rigid);
        let points: Vec<Vec2> = Self::bank_line(layout, &pruned)
            .into_iter()
            .map(|index| layout.local_position(index))
            .collect();

        if points.is_empty() {
            return BankField::empty(layout.vertex_count());
        }

        let samples = (0..layout.vertex_count())
            .map(|index| {
                let position = layout.local_position(index);
                let mut accumulated = Vec2::ZERO;
                let mut min_dist_sq = f32::INFINITY;

                for point in &points {
                    let delta = *point - position;
                    let dist_sq = delta.length_squared();
                    if dist_sq > self.radius_sq {
                        continue;
                    }
                    min_dist_sq = min_dist_sq.min(dist_sq);
                    if dist_sq > f32::EPSILON {
                        // Unit direction weighted by 1/d²
                        accumulated += delta / (dist_sq * dist_sq.sqrt());
                    }
                }

                if min_dist_sq.is_infinite() {
                    return BankSample::SENTINEL;
                }

                let towards_shore = accumulated.normalize_or_zero();
                let direction = if pruned[index] {
                    towards_shore
                } else {
                    -towards_shore
                };
                BankSample {
                    direction,
                    distance: min_dist_sq.sqrt(),
                }
            })
            .collect();

        log::debug!(
            "Built bank field: {} bank points over {} vertices",
            points.len(),
            layout.vertex_count()
        );

        BankField {
            samples,
            bank_points: points.len(),
        }
    }
}
