//! Cell grid and the per-tick activation protocol.
//!
//! ## Tick order
//! 1. Refresh distance to the viewer
//! 2. Advance idle timers
//! 3. Perturbation from queued movements
//! 4. Slot acquisition for perturbed cells
//! 5. Edge propagation (buffered, one hop per tick)
//! 6. Release of edge dependencies that went quiet
//! 7. Horizon and idle deactivation
//! 8. Backend advance for active cells
//! 9. Movement queues consumed
//!
//! Cells beyond the horizon are cut off in step 3: their movements are
//! dropped, they are never woken by a neighbor and never ask for a slot.
//! One that still holds a slot gives it back in step 7.
//!
//! A refused slot is back-pressure: the cell simply tries again next tick
//! when it is still perturbed.

use bevy::math::{Vec2, Vec3};

use super::backend::{SimulationBackend, SlotRequest};
use super::cell::{CellId, CellState, SimulationCell};
use super::movement::{Edge, EdgeMask, Movement};
use crate::config::{SimulationTuning, WaterSurfaceConfig};

/// Counts gathered at the end of every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub active: usize,
    pub edge_activated: usize,
    pub inactive: usize,
    /// Slot requests refused during the last tick
    pub refused: usize,
    /// Cells deactivated during the last tick
    pub deactivated: usize,
}

/// Buffered edge activation produced by the propagation pass.
#[derive(Debug, Clone, Copy)]
struct EdgeWrite {
    cell: CellId,
    edges: EdgeMask,
}

#[derive(Debug, Clone)]
pub struct SimulationGrid {
    cells: Vec<SimulationCell>,
    size: Vec2,
    span: Vec2,
    columns: usize,
    rows: usize,
    tuning: SimulationTuning,
    resolution: u32,
    consistency: f32,
    smoothness: f32,
    stats: GridStats,
}

impl SimulationGrid {
    /// Covers the surface footprint with `⌈w / cell⌉ × ⌈l / cell⌉` cells, or a
    /// single cell when simulation is disabled.
    pub fn new(config: &WaterSurfaceConfig) -> Self {
        let size = config.size;
        let (columns, rows) = if config.simulation_enabled {
            (
                (size.x / config.cell_size).ceil().max(1.0) as usize,
                (size.y / config.cell_size).ceil().max(1.0) as usize,
            )
        } else {
            (1, 1)
        };
        let span = if config.simulation_enabled {
            Vec2::splat(config.cell_size)
        } else {
            size
        };

        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                let min = Vec2::new(column as f32, row as f32) * span;
                let max = (min + span).min(size);
                let mut cell = SimulationCell::new(min, max);
                let index = row * columns + column;
                cell.neighbors = [
                    (column > 0).then(|| CellId(index - 1)),
                    (column + 1 < columns).then(|| CellId(index + 1)),
                    (row > 0).then(|| CellId(index - columns)),
                    (row + 1 < rows).then(|| CellId(index + columns)),
                ];
                cells.push(cell);
            }
        }

        Self {
            cells,
            size,
            span,
            columns,
            rows,
            tuning: config.tuning,
            resolution: config.texture_resolution(),
            consistency: config.consistency,
            smoothness: config.smoothness,
            stats: GridStats {
                inactive: columns * rows,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell(&self, id: CellId) -> &SimulationCell {
        &self.cells[id.0]
    }

    #[inline]
    pub fn cells(&self) -> &[SimulationCell] {
        &self.cells
    }

    #[inline]
    pub fn stats(&self) -> GridStats {
        self.stats
    }

    #[inline]
    pub fn tuning(&self) -> &SimulationTuning {
        &self.tuning
    }

    pub fn cell_id(&self, column: usize, row: usize) -> CellId {
        CellId(row * self.columns + column)
    }

    /// Cell containing a surface-local XZ point, if inside the footprint.
    /// Points on a shared border belong to the cell above/right of it.
    pub fn cell_at(&self, local_xz: Vec2) -> Option<CellId> {
        if local_xz.cmplt(Vec2::ZERO).any() || local_xz.cmpgt(self.size).any() {
            return None;
        }
        let column = ((local_xz.x / self.span.x) as usize).min(self.columns - 1);
        let row = ((local_xz.y / self.span.y) as usize).min(self.rows - 1);
        Some(self.cell_id(column, row))
    }

    /// Diagonal neighbor across the corner shared by `horizontal` and
    /// `vertical`.
    pub fn diagonal(&self, id: CellId, horizontal: Edge, vertical: Edge) -> Option<CellId> {
        let side = self.cells[id.0].neighbor(horizontal)?;
        self.cells[side.0].neighbor(vertical)
    }

    /// Queues a movement for the next tick.
    pub fn enqueue(&mut self, id: CellId, movement: Movement) {
        self.cells[id.0].movements.push(movement);
    }

    /// Routes a surface-local XZ segment to the cell owning its midpoint.
    pub fn enqueue_segment(
        &mut self,
        entry: Vec2,
        exit: Vec2,
        diameter: f32,
        magnitude: f32,
    ) -> Option<CellId> {
        let id = self.cell_at((entry + exit) * 0.5)?;
        let cell = &self.cells[id.0];
        let movement = Movement {
            entry: cell.normalize(entry),
            exit: cell.normalize(exit),
            diameter,
            magnitude,
        };
        self.enqueue(id, movement);
        Some(id)
    }

    fn slot_request(&self, cell: &SimulationCell) -> SlotRequest {
        SlotRequest {
            resolution: self.resolution,
            min: cell.min,
            max: cell.max,
            consistency: self.consistency,
            smoothness: self.smoothness,
        }
    }

    /// Runs one simulation tick. `viewer_local` is in surface-local space.
    pub fn tick(&mut self, dt: f32, viewer_local: Vec3, backend: &mut dyn SimulationBackend) {
        let mut refused = 0;

        // 1-3: distances, idle timers, perturbation
        let horizon = self.tuning.horizon;
        for cell in &mut self.cells {
            cell.distance_to_viewer = cell.distance_to(viewer_local);
            cell.idle_timer += dt;
            if cell.distance_to_viewer > horizon {
                cell.movements.clear();
                cell.perturbed = false;
                if !cell.is_active() {
                    cell.edge_activated = false;
                    cell.edge_mask = EdgeMask::NONE;
                    cell.state = CellState::Inactive;
                }
            } else if !cell.movements.is_empty() {
                cell.perturbed = true;
                cell.idle_timer = 0.0;
            } else if !cell.edge_activated {
                cell.perturbed = false;
            }
        }

        // 4: activation
        for index in 0..self.cells.len() {
            let cell = &self.cells[index];
            if !cell.perturbed || cell.slot.is_some() {
                continue;
            }
            let request = self.slot_request(cell);
            let cell = &mut self.cells[index];
            match backend.acquire_slot(CellId(index), &request) {
                Some(slot) => {
                    cell.slot = Some(slot);
                    cell.state = CellState::Active;
                }
                None => {
                    refused += 1;
                    if cell.state == CellState::Inactive {
                        cell.movements.clear();
                        cell.perturbed = false;
                    }
                }
            }
        }

        // 5: propagation from a snapshot, writes applied afterwards
        let writes: Vec<EdgeWrite> = self
            .propagation_writes()
            .into_iter()
            .filter(|write| !self.is_beyond_horizon(write.cell))
            .collect();
        let mut reactivated = vec![false; self.cells.len()];
        for cell in &mut self.cells {
            cell.edge_mask = EdgeMask::NONE;
        }
        for write in &writes {
            let cell = &mut self.cells[write.cell.0];
            cell.edge_mask = cell.edge_mask.union(write.edges);
        }
        for write in writes.iter().filter(|write| !write.edges.is_empty()) {
            // Origins carry their own edges but are not edge-activated
            if self.is_source(write.cell) {
                continue;
            }
            reactivated[write.cell.0] = true;
            let cell = &mut self.cells[write.cell.0];
            cell.edge_activated = true;
            cell.perturbed = true;
            cell.idle_timer = 0.0;
            if cell.state == CellState::Inactive {
                cell.state = CellState::EdgeActivated;
            }
        }

        // 6: dependency release
        for index in 0..self.cells.len() {
            if !self.cells[index].edge_activated || reactivated[index] {
                continue;
            }
            if self.has_moving_neighbor(CellId(index)) {
                continue;
            }
            let cell = &mut self.cells[index];
            cell.edge_activated = false;
            cell.edge_mask = EdgeMask::NONE;
            if cell.state == CellState::EdgeActivated {
                cell.state = CellState::Inactive;
                cell.perturbed = false;
            }
        }

        // 7: deactivation
        let mut deactivated = 0;
        for cell in &mut self.cells {
            if !cell.is_active() {
                continue;
            }
            let beyond_horizon = cell.distance_to_viewer > horizon;
            let idle = cell.movements.is_empty()
                && !cell.edge_activated
                && cell.idle_timer > self.tuning.idle_timeout;
            if beyond_horizon || idle {
                Self::deactivate(cell, backend);
                deactivated += 1;
            }
        }

        // 8-9: advance and consume
        for cell in &mut self.cells {
            if let Some(slot) = cell.slot {
                backend.advance(slot, &cell.movements, dt);
            }
            cell.movements.clear();
        }

        self.update_stats(refused, deactivated);
    }

    #[inline]
    fn is_beyond_horizon(&self, id: CellId) -> bool {
        self.cells[id.0].distance_to_viewer > self.tuning.horizon
    }

    /// Active with queued movements: this tick's propagation sources.
    #[inline]
    fn is_source(&self, id: CellId) -> bool {
        let cell = &self.cells[id.0];
        cell.is_active() && !cell.movements.is_empty()
    }

    /// Near-edge writes for every active cell with queued movements,
    /// computed against the current state without mutating it.
    fn propagation_writes(&self) -> Vec<EdgeWrite> {
        let threshold = self.tuning.edge_threshold;
        let mut writes = Vec::new();

        for (index, cell) in self.cells.iter().enumerate() {
            if !cell.is_active() || cell.movements.is_empty() {
                continue;
            }
            let origin = CellId(index);
            let near = cell
                .movements
                .iter()
                .fold(EdgeMask::NONE, |mask, m| mask.union(m.near_edges(threshold)));

            let mut origin_edges = EdgeMask::NONE;
            for edge in near.iter() {
                if let Some(neighbor) = cell.neighbor(edge) {
                    origin_edges.insert(edge);
                    writes.push(EdgeWrite {
                        cell: neighbor,
                        edges: [edge.opposite()].into_iter().collect(),
                    });
                }
            }

            for horizontal in near.iter().filter(|edge| edge.is_horizontal()) {
                for vertical in near.iter().filter(|edge| !edge.is_horizontal()) {
                    let Some(diagonal) = self.diagonal(origin, horizontal, vertical) else {
                        continue;
                    };
                    // The diagonal shares `vertical` with the horizontal
                    // neighbor and `horizontal` with the vertical one.
                    writes.push(EdgeWrite {
                        cell: diagonal,
                        edges: [vertical.opposite(), horizontal.opposite()]
                            .into_iter()
                            .collect(),
                    });
                    if let Some(side) = cell.neighbor(horizontal) {
                        writes.push(EdgeWrite {
                            cell: side,
                            edges: [vertical].into_iter().collect(),
                        });
                    }
                    if let Some(side) = cell.neighbor(vertical) {
                        writes.push(EdgeWrite {
                            cell: side,
                            edges: [horizontal].into_iter().collect(),
                        });
                    }
                }
            }

            writes.push(EdgeWrite {
                cell: origin,
                edges: origin_edges,
            });
        }

        writes
    }

    /// Whether any edge or diagonal neighbor is active and moving.
    fn has_moving_neighbor(&self, id: CellId) -> bool {
        let cell = &self.cells[id.0];
        let moving = |other: Option<CellId>| other.is_some_and(|other| self.is_source(other));

        Edge::ALL.into_iter().any(|edge| moving(cell.neighbor(edge)))
            || Edge::ALL
                .into_iter()
                .filter(|edge| edge.is_horizontal())
                .any(|horizontal| {
                    Edge::ALL
                        .into_iter()
                        .filter(|edge| !edge.is_horizontal())
                        .any(|vertical| moving(self.diagonal(id, horizontal, vertical)))
                })
    }

    fn deactivate(cell: &mut SimulationCell, backend: &mut dyn SimulationBackend) {
        if let Some(slot) = cell.slot.take() {
            backend.release_slot(slot);
        }
        cell.state = CellState::Inactive;
        cell.edge_activated = false;
        cell.edge_mask = EdgeMask::NONE;
        cell.perturbed = false;
        cell.movements.clear();
        cell.idle_timer = 0.0;
    }

    /// Releases every held slot and resets all cells.
    pub fn release_all(&mut self, backend: &mut dyn SimulationBackend) {
        let mut released = 0;
        for cell in &mut self.cells {
            if cell.slot.is_some() {
                released += 1;
            }
            Self::deactivate(cell, backend);
        }
        if released > 0 {
            log::debug!("Released {} simulation slots", released);
        }
        self.update_stats(0, released);
    }

    /// Number of slots currently held.
    pub fn held_slots(&self) -> usize {
        self.cells.iter().filter(|cell| cell.slot.is_some()).count()
    }

    fn update_stats(&mut self, refused: usize, deactivated: usize) {
        let mut stats = GridStats {
            refused,
            deactivated,
            ..Default::default()
        };
        for cell in &self.cells {
            match cell.state {
                CellState::Active => stats.active += 1,
                CellState::EdgeActivated => stats.edge_activated += 1,
                CellState::Inactive => stats.inactive += 1,
            }
        }

        if stats.active != self.stats.active || stats.edge_activated != self.stats.edge_activated {
            log::debug!(
                "Simulation cells: {} active, {} edge-activated, {} inactive ({} refused, {} deactivated)",
                stats.active,
                stats.edge_activated,
                stats.inactive,
                stats.refused,
                stats.deactivated
            );
        }
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::backend::FixedSlotPool;

    const CELL: f32 = 10.0;

    fn grid(columns: usize, rows: usize) -> SimulationGrid {
        let config = WaterSurfaceConfig {
            size: Vec2::new(columns as f32 * CELL, rows as f32 * CELL),
            cell_size: CELL,
            ..Default::default()
        };
        SimulationGrid::new(&config)
    }

    fn viewer() -> Vec3 {
        Vec3::new(0.0, 2.0, 0.0)
    }

    fn poke(grid: &mut SimulationGrid, id: CellId, at: Vec2) {
        grid.enqueue(
            id,
            Movement {
                entry: at,
                exit: at + Vec2::splat(0.01),
                diameter: 1.0,
                magnitude: 0.5,
            },
        );
    }

    fn center(grid: &SimulationGrid) -> CellId {
        grid.cell_id(grid.columns() / 2, grid.rows() / 2)
    }

    #[test]
    fn test_grid_dimensions() {
        let config = WaterSurfaceConfig {
            size: Vec2::new(35.0, 20.0),
            cell_size: 10.0,
            ..Default::default()
        };
        let grid = SimulationGrid::new(&config);
        assert_eq!((grid.columns(), grid.rows()), (4, 2));
        assert_eq!(grid.cell_count(), 8);
        let last = grid.cell(grid.cell_id(3, 1));
        assert_eq!(last.bounds().1, Vec2::new(35.0, 20.0));

        let disabled = SimulationGrid::new(&WaterSurfaceConfig {
            simulation_enabled: false,
            ..config
        });
        assert_eq!(disabled.cell_count(), 1);
        assert_eq!(disabled.cell(CellId(0)).bounds(), (Vec2::ZERO, Vec2::new(35.0, 20.0)));
    }

    #[test]
    fn test_cell_at() {
        let grid = grid(3, 2);
        assert_eq!(grid.cell_at(Vec2::new(5.0, 5.0)), Some(grid.cell_id(0, 0)));
        assert_eq!(grid.cell_at(Vec2::new(25.0, 15.0)), Some(grid.cell_id(2, 1)));
        assert_eq!(grid.cell_at(Vec2::new(30.0, 20.0)), Some(grid.cell_id(2, 1)));
        assert_eq!(grid.cell_at(Vec2::new(31.0, 5.0)), None);
        assert_eq!(grid.cell_at(Vec2::new(-1.0, 5.0)), None);
    }

    #[test]
    fn test_perturbed_cell_becomes_active() {
        let mut grid = grid(3, 3);
        let mut pool = FixedSlotPool::new(4);
        let id = center(&grid);

        poke(&mut grid, id, Vec2::splat(0.5));
        grid.tick(0.1, viewer(), &mut pool);

        let cell = grid.cell(id);
        assert_eq!(cell.state(), CellState::Active);
        assert!(cell.slot().is_some());
        assert!(cell.movements().is_empty());
        assert_eq!(pool.movements_advanced, 1);
        assert_eq!(grid.stats().active, 1);
        // Centered movement touches no edge
        assert_eq!(grid.stats().edge_activated, 0);
    }

    #[test]
    fn test_refused_inactive_cell_drops_movements() {
        let mut grid = grid(2, 1);
        let mut pool = FixedSlotPool::new(1);

        poke(&mut grid, CellId(0), Vec2::splat(0.5));
        poke(&mut grid, CellId(1), Vec2::splat(0.5));
        grid.tick(0.1, viewer(), &mut pool);

        assert!(grid.cell(CellId(0)).is_active());
        assert_eq!(grid.cell(CellId(1)).state(), CellState::Inactive);
        assert_eq!(grid.stats().refused, 1);
        // Only the granted cell was advanced
        assert_eq!(pool.advance_calls, 1);
        assert_eq!(pool.movements_advanced, 1);

        // Nothing queued any more, so no retry
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.stats().refused, 0);
    }

    #[test]
    fn test_edge_activated_cell_retries_after_refusal() {
        let mut grid = grid(4, 1);
        let mut pool = FixedSlotPool::new(2);
        let busy = grid.cell_id(0, 0);
        let origin = grid.cell_id(1, 0);
        let right = grid.cell_id(2, 0);

        poke(&mut grid, busy, Vec2::splat(0.5));
        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.cell(right).state(), CellState::EdgeActivated);

        poke(&mut grid, busy, Vec2::splat(0.5));
        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.cell(right).state(), CellState::EdgeActivated);
        assert_eq!(grid.stats().refused, 1);

        // The busy cell idles out at the end of this tick
        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(5.0, viewer(), &mut pool);
        assert_eq!(grid.cell(busy).state(), CellState::Inactive);
        assert_eq!(grid.cell(right).state(), CellState::EdgeActivated);

        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert!(grid.cell(right).is_active());
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_edge_activated_cell_promoted_when_slot_available() {
        let mut grid = grid(3, 1);
        let mut pool = FixedSlotPool::new(4);
        let origin = grid.cell_id(1, 0);
        let right = grid.cell_id(2, 0);

        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.cell(right).state(), CellState::EdgeActivated);
        assert!(grid.cell(right).slot().is_none());

        poke(&mut grid, origin, Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        let cell = grid.cell(right);
        assert_eq!(cell.state(), CellState::Active);
        assert!(cell.is_edge_activated());
        assert!(cell.edge_mask().contains(Edge::Left));
        assert!(grid.cell(origin).edge_mask().contains(Edge::Right));
    }

    #[test]
    fn test_propagation_is_one_hop_per_tick() {
        let mut grid = grid(5, 5);
        let mut pool = FixedSlotPool::new(25);
        let origin = center(&grid);

        for _ in 0..6 {
            poke(&mut grid, origin, Vec2::new(0.95, 0.5));
            grid.tick(0.1, viewer(), &mut pool);

            for row in 0..5 {
                for column in 0..5 {
                    let id = grid.cell_id(column, row);
                    if id == origin || id == grid.cell_id(3, 2) {
                        continue;
                    }
                    assert_eq!(
                        grid.cell(id).state(),
                        CellState::Inactive,
                        "cell ({column}, {row}) should stay inactive"
                    );
                }
            }
        }
        assert!(grid.cell(grid.cell_id(3, 2)).is_active());
    }

    #[test]
    fn test_corner_movement_wakes_three_neighbors() {
        let mut grid = grid(3, 3);
        let mut pool = FixedSlotPool::new(9);
        let origin = grid.cell_id(1, 1);

        poke(&mut grid, origin, Vec2::new(0.9, 0.9));
        grid.tick(0.1, viewer(), &mut pool);

        assert!(grid.cell(origin).is_active());
        let right = grid.cell_id(2, 1);
        let top = grid.cell_id(1, 2);
        let top_right = grid.cell_id(2, 2);
        for id in [right, top, top_right] {
            assert_eq!(grid.cell(id).state(), CellState::EdgeActivated, "{id:?}");
        }
        assert_eq!(grid.stats().edge_activated, 3);

        // Diagonal links on both sides of each shared edge
        assert!(grid.cell(right).edge_mask().contains(Edge::Top));
        assert!(grid.cell(top).edge_mask().contains(Edge::Right));
        let diagonal = grid.cell(top_right).edge_mask();
        assert!(diagonal.contains(Edge::Left) && diagonal.contains(Edge::Bottom));

        for id in [grid.cell_id(0, 0), grid.cell_id(1, 0), grid.cell_id(0, 1)] {
            assert_eq!(grid.cell(id).state(), CellState::Inactive);
        }
    }

    #[test]
    fn test_quiet_neighbor_dependency_released() {
        let mut grid = grid(3, 1);
        let mut pool = FixedSlotPool::new(0);
        // No slots at all: the origin can never activate, so nothing spreads
        poke(&mut grid, CellId(1), Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.stats().edge_activated, 0);

        let mut pool = FixedSlotPool::new(1);
        poke(&mut grid, CellId(1), Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.cell(CellId(2)).state(), CellState::EdgeActivated);

        // Origin goes quiet: the pending neighbor falls back to inactive
        grid.tick(0.1, viewer(), &mut pool);
        let cell = grid.cell(CellId(2));
        assert_eq!(cell.state(), CellState::Inactive);
        assert!(!cell.is_edge_activated());
        assert!(cell.edge_mask().is_empty());
    }

    #[test]
    fn test_idle_timeout_deactivates() {
        let mut grid = grid(1, 1);
        let mut pool = FixedSlotPool::new(1);
        let timeout = grid.tuning().idle_timeout;
        let dt = 0.5;

        poke(&mut grid, CellId(0), Vec2::splat(0.5));
        grid.tick(dt, viewer(), &mut pool);
        assert!(grid.cell(CellId(0)).is_active());

        let quiet_ticks = (timeout / dt) as usize;
        for _ in 0..quiet_ticks {
            grid.tick(dt, viewer(), &mut pool);
            assert!(grid.cell(CellId(0)).is_active());
        }

        grid.tick(dt, viewer(), &mut pool);
        assert_eq!(grid.cell(CellId(0)).state(), CellState::Inactive);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(grid.stats().deactivated, 1);
    }

    #[test]
    fn test_movement_resets_idle_timer() {
        let mut grid = grid(1, 1);
        let mut pool = FixedSlotPool::new(1);
        let dt = 0.5;

        for _ in 0..20 {
            poke(&mut grid, CellId(0), Vec2::splat(0.5));
            grid.tick(dt, viewer(), &mut pool);
            assert!(grid.cell(CellId(0)).is_active());
            assert_eq!(grid.cell(CellId(0)).idle_timer(), 0.0);
        }
    }

    #[test]
    fn test_beyond_horizon_deactivates_immediately() {
        let mut grid = grid(2, 1);
        let mut pool = FixedSlotPool::new(2);

        poke(&mut grid, CellId(0), Vec2::splat(0.5));
        grid.tick(0.1, viewer(), &mut pool);
        assert!(grid.cell(CellId(0)).is_active());

        let far = Vec3::new(grid.tuning().horizon * 2.0, 0.0, 0.0);
        poke(&mut grid, CellId(0), Vec2::splat(0.5));
        grid.tick(0.1, far, &mut pool);
        assert_eq!(grid.cell(CellId(0)).state(), CellState::Inactive);
        assert!(grid.cell(CellId(0)).movements().is_empty());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_cells_beyond_horizon_are_never_woken() {
        let mut grid = grid(3, 1);
        let mut pool = FixedSlotPool::new(3);
        let far = Vec3::new(0.0, 0.0, grid.tuning().horizon + 10_000.0);

        for _ in 0..3 {
            // Close to the right edge, so a near cell would wake its neighbor
            poke(&mut grid, CellId(1), Vec2::new(0.95, 0.5));
            grid.tick(0.1, far, &mut pool);
        }

        assert_eq!(pool.acquisitions, 0);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.advance_calls, 0);
        for cell in grid.cells() {
            assert_eq!(cell.state(), CellState::Inactive);
            assert!(cell.edge_mask().is_empty());
        }
        assert_eq!(
            grid.stats(),
            GridStats {
                inactive: 3,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_near_source_does_not_wake_far_neighbor() {
        let mut grid = grid(2, 1);
        let mut pool = FixedSlotPool::new(2);
        let horizon = grid.tuning().horizon;
        // Cell 0 sits inside the horizon, cell 1 just past it
        let viewer = Vec3::new(CELL - horizon - 1.0, 0.0, CELL * 0.5);

        poke(&mut grid, CellId(0), Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer, &mut pool);
        poke(&mut grid, CellId(0), Vec2::new(0.95, 0.5));
        grid.tick(0.1, viewer, &mut pool);

        assert!(grid.cell(CellId(0)).is_active());
        assert_eq!(grid.cell(CellId(1)).state(), CellState::Inactive);
        assert_eq!(pool.acquisitions, 1);
        assert_eq!(grid.stats().edge_activated, 0);
        grid.release_all(&mut pool);
    }

    #[test]
    fn test_release_all_releases_each_slot_once() {
        let mut grid = grid(3, 3);
        let mut pool = FixedSlotPool::new(9);
        for index in 0..9 {
            poke(&mut grid, CellId(index), Vec2::splat(0.5));
        }
        grid.tick(0.1, viewer(), &mut pool);
        assert_eq!(grid.held_slots(), 9);
        assert_eq!(pool.in_use(), 9);

        grid.release_all(&mut pool);
        assert_eq!(grid.held_slots(), 0);
        assert_eq!(pool.in_use(), 0);

        // Second release is a no-op
        grid.release_all(&mut pool);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_enqueue_segment_routes_to_midpoint_cell() {
        let mut grid = grid(3, 1);
        let id = grid
            .enqueue_segment(Vec2::new(8.0, 5.0), Vec2::new(14.0, 5.0), 1.0, 6.0)
            .unwrap();
        assert_eq!(id, grid.cell_id(1, 0));
        let movement = grid.cell(id).movements()[0];
        assert_eq!(movement.entry, Vec2::new(0.0, 0.5));
        assert!((movement.exit - Vec2::new(0.4, 0.5)).length() < 1e-5);
    }
}
