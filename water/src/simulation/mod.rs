//! Localized ripple simulation bookkeeping.
//!
//! The surface is split into cells. Only cells disturbed by a movement (or
//! reached by a neighbor's ripples) hold one of the backend's simulation
//! slots; everything else is left untouched.

pub mod backend;
pub mod cell;
pub mod grid;
pub mod movement;

pub use backend::{FixedSlotPool, SimulationBackend, SlotHandle, SlotRequest};
pub use cell::{CellId, CellState, SimulationCell};
pub use grid::{GridStats, SimulationGrid};
pub use movement::{Edge, EdgeMask, Movement};
