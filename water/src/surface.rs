//! The water surface aggregate.
//!
//! A surface goes through `Pending` (layout and grid built, no tables yet)
//! to `Ready` once its tables are installed. A configuration that cannot be
//! meshed leaves it `Failed`: it stays registered but ignores movements and
//! ticks.

use bevy::math::{Vec2, Vec3};
use log::{info, warn};

use crate::bank::{BankField, BankFieldBuilder};
use crate::config::{VisibilityMode, WaterSurfaceConfig};
use crate::constants::INVALID_CONFIG_ERROR;
use crate::error::{WaterError, WaterResult};
use crate::frame::SurfaceFrame;
use crate::loading::{LoadedTables, TableJob, TableSource};
use crate::mesh::{MeshPartitioner, SurfaceLayout, SurfaceMesh};
use crate::simulation::{SimulationBackend, SimulationGrid};
use crate::tables::SurfaceTables;
use crate::terrain::TerrainSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceStatus {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// Clips the segment `a -> b` against an axis-aligned box.
/// Returns the parametric range inside the box.
fn clip_segment(a: Vec3, b: Vec3, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let delta = b - a;
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);

    for axis in 0..3 {
        let (start, d) = (a[axis], delta[axis]);
        if d.abs() <= f32::EPSILON {
            if start < min[axis] || start > max[axis] {
                return None;
            }
            continue;
        }
        let near = (min[axis] - start) / d;
        let far = (max[axis] - start) / d;
        let (near, far) = if near <= far { (near, far) } else { (far, near) };
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

#[derive(Debug)]
pub struct WaterSurface {
    config: WaterSurfaceConfig,
    frame: SurfaceFrame,
    layout: SurfaceLayout,
    grid: SimulationGrid,
    tables: Option<SurfaceTables>,
    table_source: Option<TableSource>,
    bank: BankField,
    mesh: SurfaceMesh,
    status: SurfaceStatus,
    /// Bumped on every rebuild; loads started for an older revision are stale
    revision: u64,
}

impl WaterSurface {
    pub fn new(config: WaterSurfaceConfig) -> WaterResult<Self> {
        config.validate()?;
        let layout = SurfaceLayout::new(config.size, config.tessellation)?;

        Ok(Self {
            frame: SurfaceFrame::from_config(&config),
            grid: SimulationGrid::new(&config),
            bank: BankField::empty(layout.vertex_count()),
            layout,
            tables: None,
            table_source: None,
            mesh: SurfaceMesh::default(),
            status: SurfaceStatus::Pending,
            revision: 0,
            config,
        })
    }

    /// Detached description of the table load for this surface.
    pub fn table_job(&self) -> TableJob {
        TableJob {
            layout: self.layout.clone(),
            frame: self.frame,
            fade_depth: self.config.fade_depth,
            table_path: self.config.table_path.clone(),
            force_recompute: false,
            revision: self.revision,
        }
    }

    /// Loads or computes the tables on the calling thread and installs them.
    pub fn build(&mut self, terrain: &dyn TerrainSampler) -> WaterResult<TableSource> {
        let loaded = self.table_job().run(terrain);
        let source = loaded.source;
        self.install_tables(loaded)?;
        Ok(source)
    }

    /// Drops everything derived from tables and marks the surface `Failed`.
    fn fail(&mut self, error: WaterError) -> WaterError {
        warn!("{}: {}", INVALID_CONFIG_ERROR, error);
        self.tables = None;
        self.table_source = None;
        self.bank = BankField::empty(self.layout.vertex_count());
        self.mesh = SurfaceMesh::default();
        self.status = SurfaceStatus::Failed;
        error
    }

    /// Derives the bank field and the paged mesh from loaded tables.
    ///
    /// A configuration error leaves the surface `Failed` with nothing
    /// installed, even if it was `Ready` before.
    pub fn install_tables(&mut self, loaded: LoadedTables) -> WaterResult<()> {
        let expected = self.layout.vertex_count();
        let LoadedTables { tables, source } = loaded;
        if tables.rigid.len() != expected || tables.alpha.len() != expected {
            return Err(self.fail(WaterError::invalid_config(format!(
                "tables hold {} entries but the surface has {} vertices",
                tables.rigid.len(),
                expected
            ))));
        }

        let bank = BankFieldBuilder::new(self.config.shore.interpolation_radius)
            .build(&self.layout, &tables.rigid);
        let partition = MeshPartitioner::new(self.config.max_page_index).and_then(|partitioner| {
            partitioner.rebuild(
                &self.layout.valid_vertices(&tables.rigid),
                &self.layout.triangle_strips(&tables.rigid),
            )
        });
        let partition = match partition {
            Ok(partition) => partition,
            Err(e) => return Err(self.fail(e)),
        };

        self.mesh = SurfaceMesh::build(
            &self.layout,
            &tables,
            &bank,
            &self.config.shore,
            partition,
        );
        self.bank = bank;
        self.tables = Some(tables);
        self.table_source = Some(source);
        self.status = SurfaceStatus::Ready;

        info!(
            "Water surface ready: {} vertices, {} pages, {} strips, {} cells ({:?} tables)",
            expected,
            self.mesh.page_count(),
            self.mesh.strip_count(),
            self.grid.cell_count(),
            source
        );
        Ok(())
    }

    /// Rebuilds the surface from scratch for a new configuration.
    ///
    /// The surface comes back `Pending`; its tables have to be loaded again.
    /// Loads still running for the previous configuration are discarded.
    pub fn reconfigure(
        &mut self,
        config: WaterSurfaceConfig,
        backend: &mut dyn SimulationBackend,
    ) -> WaterResult<()> {
        self.release(backend);
        let revision = self.revision + 1;
        match WaterSurface::new(config.clone()) {
            Ok(surface) => {
                *self = surface;
                self.revision = revision;
                Ok(())
            }
            Err(e) => {
                self.config = config;
                self.revision = revision;
                Err(self.fail(e))
            }
        }
    }

    /// Volume box in surface-local space.
    fn volume(&self) -> (Vec3, Vec3) {
        (
            Vec3::new(0.0, -self.config.depth, 0.0),
            Vec3::new(
                self.config.size.x,
                self.config.surface_clearance,
                self.config.size.y,
            ),
        )
    }

    /// Feeds an object moving from `from` to `to` (world space) into the
    /// simulation. Returns whether the segment touched the water volume.
    pub fn inject_movement(&mut self, from: Vec3, to: Vec3, diameter: f32) -> bool {
        let a = self.frame.world_to_local(from);
        let b = self.frame.world_to_local(to);
        let (min, max) = self.volume();
        let Some((t0, t1)) = clip_segment(a, b, min, max) else {
            return false;
        };

        if self.status != SurfaceStatus::Ready || !self.config.simulation_enabled {
            return true;
        }

        let entry = a + (b - a) * t0;
        let exit = a + (b - a) * t1;
        let length = entry.distance(exit);
        if length <= self.config.tuning.min_movement_length {
            return true;
        }

        self.grid.enqueue_segment(
            Vec2::new(entry.x, entry.z),
            Vec2::new(exit.x, exit.z),
            diameter,
            length,
        );
        true
    }

    pub fn tick(&mut self, dt: f32, viewer_world: Vec3, backend: &mut dyn SimulationBackend) {
        if self.status != SurfaceStatus::Ready {
            return;
        }
        let viewer_local = self.frame.world_to_local(viewer_world);
        self.grid.tick(dt, viewer_local, backend);
    }

    /// Whether the viewer position is inside the water volume.
    pub fn contains(&self, world: Vec3) -> bool {
        let local = self.frame.world_to_local(world);
        let (min, max) = self.volume();
        local.cmpge(min).all() && local.cmple(max).all()
    }

    pub fn is_visible_from(&self, viewer_world: Vec3) -> bool {
        match self.config.visibility {
            VisibilityMode::Always => true,
            VisibilityMode::InsideOnly => self.contains(viewer_world),
            VisibilityMode::OutsideOnly => !self.contains(viewer_world),
        }
    }

    /// Gives every held simulation slot back to the backend.
    pub fn release(&mut self, backend: &mut dyn SimulationBackend) {
        self.grid.release_all(backend);
    }

    #[inline]
    pub fn status(&self) -> SurfaceStatus {
        self.status
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == SurfaceStatus::Ready
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn config(&self) -> &WaterSurfaceConfig {
        &self.config
    }

    #[inline]
    pub fn frame(&self) -> &SurfaceFrame {
        &self.frame
    }

    #[inline]
    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    #[inline]
    pub fn grid(&self) -> &SimulationGrid {
        &self.grid
    }

    #[inline]
    pub fn tables(&self) -> Option<&SurfaceTables> {
        self.tables.as_ref()
    }

    #[inline]
    pub fn table_source(&self) -> Option<TableSource> {
        self.table_source
    }

    #[inline]
    pub fn bank(&self) -> &BankField {
        &self.bank
    }

    #[inline]
    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }
}

impl Drop for WaterSurface {
    fn drop(&mut self) {
        let held = self.grid.held_slots();
        if held > 0 {
            warn!(
                "Water surface at {:?} dropped while holding {} simulation slots",
                self.config.position, held
            );
        }
    }
}
