use bevy::math::{Vec2, Vec3};

use super::backend::SlotHandle;
use super::movement::{Edge, EdgeMask, Movement};

/// Index of a cell inside its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

/// Activation state of a simulation cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    /// Not simulated, holds no slot.
    #[default]
    Inactive,
    /// Woken by a neighbor; waiting for a slot.
    EdgeActivated,
    /// Simulated, holds a slot.
    Active,
}

/// Unit of activation: a rectangle of the surface that owns at most one
/// simulation slot.
#[derive(Debug, Clone)]
pub struct SimulationCell {
    /// Bounds in surface-local XZ
    pub(crate) min: Vec2,
    pub(crate) max: Vec2,
    pub(crate) state: CellState,
    /// Set while a neighbor's ripples reach into this cell
    pub(crate) edge_activated: bool,
    /// Edges exchanging boundary data this tick
    pub(crate) edge_mask: EdgeMask,
    pub(crate) idle_timer: f32,
    pub(crate) perturbed: bool,
    pub(crate) movements: Vec<Movement>,
    pub(crate) distance_to_viewer: f32,
    /// Indexed by `Edge::slot`
    pub(crate) neighbors: [Option<CellId>; 4],
    pub(crate) slot: Option<SlotHandle>,
}

impl SimulationCell {
    pub(crate) fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min,
            max,
            state: CellState::Inactive,
            edge_activated: false,
            edge_mask: EdgeMask::NONE,
            idle_timer: 0.0,
            perturbed: false,
            movements: Vec::new(),
            distance_to_viewer: f32::MAX,
            neighbors: [None; 4],
            slot: None,
        }
    }

    #[inline]
    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.min, self.max)
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn state(&self) -> CellState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == CellState::Active
    }

    #[inline]
    pub fn is_edge_activated(&self) -> bool {
        self.edge_activated
    }

    #[inline]
    pub fn edge_mask(&self) -> EdgeMask {
        self.edge_mask
    }

    #[inline]
    pub fn idle_timer(&self) -> f32 {
        self.idle_timer
    }

    #[inline]
    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    #[inline]
    pub fn distance_to_viewer(&self) -> f32 {
        self.distance_to_viewer
    }

    #[inline]
    pub fn neighbor(&self, edge: Edge) -> Option<CellId> {
        self.neighbors[edge.slot()]
    }

    #[inline]
    pub fn slot(&self) -> Option<SlotHandle> {
        self.slot
    }

    /// Maps a surface-local XZ point into this cell's 0..1 span, clamped.
    pub fn normalize(&self, local_xz: Vec2) -> Vec2 {
        ((local_xz - self.min) / self.size()).clamp(Vec2::ZERO, Vec2::ONE)
    }

    /// Distance from a surface-local point to the cell rectangle at water
    /// level.
    pub(crate) fn distance_to(&self, viewer_local: Vec3) -> f32 {
        let xz = Vec2::new(viewer_local.x, viewer_local.z);
        let outside = (self.min - xz).max(xz - self.max).max(Vec2::ZERO);
        Vec3::new(outside.x, viewer_local.y, outside.y).length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_clamps() {
        let cell = SimulationCell::new(Vec2::new(16.0, 0.0), Vec2::new(32.0, 16.0));
        assert_eq!(cell.normalize(Vec2::new(24.0, 4.0)), Vec2::new(0.5, 0.25));
        assert_eq!(cell.normalize(Vec2::new(40.0, -1.0)), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_distance_to_viewer() {
        let cell = SimulationCell::new(Vec2::ZERO, Vec2::splat(10.0));
        assert_eq!(cell.distance_to(Vec3::new(5.0, 0.0, 5.0)), 0.0);
        assert_eq!(cell.distance_to(Vec3::new(5.0, 3.0, 5.0)), 3.0);
        assert_eq!(cell.distance_to(Vec3::new(13.0, 0.0, 14.0)), 5.0);
    }
}
