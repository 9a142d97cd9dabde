//! Localized ripple simulation and surface-mesh management for water
//! surfaces.
//!
//! A [`WaterSurface`] owns the static geometry of one rectangular body of
//! water (vertex grid, shoreline tables, bank field, index pages) and a
//! [`SimulationGrid`] that decides which parts of it are simulated each
//! frame. The renderer side plugs in through [`SimulationBackend`], the
//! world through [`TerrainSampler`].

pub mod bank;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod loading;
pub mod mesh;
pub mod registry;
pub mod simulation;
pub mod surface;
pub mod tables;
pub mod terrain;
pub mod utils;

pub use bank::{BankField, BankFieldBuilder, BankSample};
pub use config::{ShoreTuning, SimulationTuning, VisibilityMode, WaterSurfaceConfig};
pub use error::{WaterError, WaterResult};
pub use loading::{LoadOutcome, LoadedTables, TableJob, TableLoadTasks, TableSource};
pub use registry::{SurfaceHandle, SurfaceId, WaterSurfaceRegistry};
pub use simulation::{
    CellId, CellState, FixedSlotPool, Movement, SimulationBackend, SimulationGrid, SlotHandle,
    SlotRequest,
};
pub use surface::{SurfaceStatus, WaterSurface};
pub use tables::SurfaceTables;
pub use terrain::{FlatTerrain, HeightmapTerrain, TerrainSampler};
