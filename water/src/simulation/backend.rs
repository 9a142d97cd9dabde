//! Boundary to the renderer that owns the simulation textures.

use bevy::math::Vec2;

use super::cell::CellId;
use super::movement::Movement;

/// Handle to a simulation texture slot owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle(pub u32);

/// What a cell asks for when it wants a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotRequest {
    /// Texels along one side of the simulation texture
    pub resolution: u32,
    /// Cell bounds in surface-local XZ
    pub min: Vec2,
    pub max: Vec2,
    pub consistency: f32,
    pub smoothness: f32,
}

/// The GPU side of the simulation.
///
/// Slots are a scarce shared resource. The grid only ever holds handles and
/// releases each one exactly once.
pub trait SimulationBackend {
    /// Grants a slot, or `None` when every slot is busy.
    fn acquire_slot(&mut self, cell: CellId, request: &SlotRequest) -> Option<SlotHandle>;

    fn release_slot(&mut self, slot: SlotHandle);

    /// Advances the simulation in `slot` with this frame's movements.
    fn advance(&mut self, slot: SlotHandle, movements: &[Movement], dt: f32);
}

/// Fixed-capacity slot allocator that records what it was asked to do.
///
/// Useful for headless runs and tests; a renderer implements
/// [`SimulationBackend`] over its own texture pool.
#[derive(Debug, Clone, Default)]
pub struct FixedSlotPool {
    free: Vec<SlotHandle>,
    owners: Vec<Option<CellId>>,
    /// Total movements handed to `advance`
    pub movements_advanced: usize,
    /// Number of `advance` calls
    pub advance_calls: usize,
    /// Number of `acquire_slot` calls, refused or not
    pub acquisitions: usize,
    /// Number of refused acquisitions
    pub refusals: usize,
}

impl FixedSlotPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            free: (0..capacity).rev().map(SlotHandle).collect(),
            owners: vec![None; capacity as usize],
            ..Default::default()
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.owners.len() - self.free.len()
    }

    #[inline]
    pub fn owner(&self, slot: SlotHandle) -> Option<CellId> {
        self.owners.get(slot.0 as usize).copied().flatten()
    }
}

impl SimulationBackend for FixedSlotPool {
    fn acquire_slot(&mut self, cell: CellId, _request: &SlotRequest) -> Option<SlotHandle> {
        self.acquisitions += 1;
        match self.free.pop() {
            Some(slot) => {
                self.owners[slot.0 as usize] = Some(cell);
                Some(slot)
            }
            None => {
                self.refusals += 1;
                None
            }
        }
    }

    fn release_slot(&mut self, slot: SlotHandle) {
        let owner = &mut self.owners[slot.0 as usize];
        debug_assert!(owner.is_some(), "slot {slot:?} released twice");
        if owner.take().is_some() {
            self.free.push(slot);
        }
    }

    fn advance(&mut self, _slot: SlotHandle, movements: &[Movement], _dt: f32) {
        self.advance_calls += 1;
        self.movements_advanced += movements.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SlotRequest {
        SlotRequest {
            resolution: 16,
            min: Vec2::ZERO,
            max: Vec2::ONE,
            consistency: 0.5,
            smoothness: 0.5,
        }
    }

    #[test]
    fn test_pool_exhaustion_and_release() {
        let mut pool = FixedSlotPool::new(2);
        let a = pool.acquire_slot(CellId(0), &request()).unwrap();
        let b = pool.acquire_slot(CellId(1), &request()).unwrap();
        assert_ne!(a, b);
        assert!(pool.acquire_slot(CellId(2), &request()).is_none());
        assert_eq!(pool.refusals, 1);
        assert_eq!(pool.acquisitions, 3);
        assert_eq!(pool.in_use(), 2);

        pool.release_slot(a);
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.owner(b), Some(CellId(1)));
        assert!(pool.acquire_slot(CellId(2), &request()).is_some());
    }
}
