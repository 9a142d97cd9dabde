//! Table loading, synchronously or on the async compute pool.
//!
//! The worker stage reads persisted tables (or samples the terrain and
//! writes them back) and produces an immutable [`LoadedTables`]. The main
//! thread then installs the result with [`WaterSurface::install_tables`].
//!
//! [`WaterSurface::install_tables`]: crate::surface::WaterSurface::install_tables

use bevy::prelude::Resource;
use bevy::tasks::{AsyncComputeTaskPool, Task, TaskPool};
use futures_lite::future;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::codec::{decode_tables, encode_tables};
use crate::constants::TABLE_WRITE_ERROR;
use crate::error::WaterResult;
use crate::frame::SurfaceFrame;
use crate::mesh::SurfaceLayout;
use crate::registry::{SurfaceId, WaterSurfaceRegistry};
use crate::tables::SurfaceTables;
use crate::terrain::TerrainSampler;

/// Where a set of tables came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSource {
    /// Decoded from the persisted table file
    Persisted,
    /// Sampled from the terrain
    Recomputed,
    /// No terrain under the surface; open water everywhere
    DefaultGuess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTables {
    pub tables: SurfaceTables,
    pub source: TableSource,
}

/// Everything the worker stage needs, detached from the surface.
#[derive(Debug, Clone)]
pub struct TableJob {
    pub layout: SurfaceLayout,
    pub frame: SurfaceFrame,
    pub fade_depth: f32,
    pub table_path: Option<PathBuf>,
    /// Ignore any persisted file and recompute
    pub force_recompute: bool,
    /// Surface revision the job was taken from
    pub revision: u64,
}

impl TableJob {
    fn read_persisted(&self) -> Option<SurfaceTables> {
        let path = self.table_path.as_ref()?;
        let payload = match std::fs::read(path) {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read water tables {}: {}", path.display(), e);
                return None;
            }
        };

        match decode_tables(&payload, self.layout.vertex_count()) {
            Ok(tables) => Some(tables),
            Err(e) => {
                debug!("Discarding stale water tables {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_persisted(&self, tables: &SurfaceTables) -> WaterResult<()> {
        let Some(path) = self.table_path.as_ref() else {
            return Ok(());
        };
        let payload = encode_tables(tables)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Loads the persisted tables, or recomputes (and persists) them.
    ///
    /// Never fails: unreadable files are recomputed and write errors only
    /// cost the next load a recomputation.
    pub fn run(&self, terrain: &dyn TerrainSampler) -> LoadedTables {
        if !self.force_recompute {
            if let Some(tables) = self.read_persisted() {
                return LoadedTables {
                    tables,
                    source: TableSource::Persisted,
                };
            }
        }

        let tables = SurfaceTables::compute(&self.layout, &self.frame, self.fade_depth, terrain);
        // A guess is not worth persisting; the terrain may show up later
        if !SurfaceTables::covers_footprint(&self.layout, &self.frame, terrain) {
            return LoadedTables {
                tables,
                source: TableSource::DefaultGuess,
            };
        }

        if let Err(e) = self.write_persisted(&tables) {
            warn!("{}: {}", TABLE_WRITE_ERROR, e);
        }
        LoadedTables {
            tables,
            source: TableSource::Recomputed,
        }
    }
}

/// Outcome of one completed background load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub id: SurfaceId,
    pub result: WaterResult<TableSource>,
}

/// In-flight table loads.
#[derive(Resource, Default)]
pub struct TableLoadTasks {
    tasks: Vec<(SurfaceId, u64, Task<Option<LoadedTables>>)>,
}

impl TableLoadTasks {
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_loading(&self, id: SurfaceId) -> bool {
        self.tasks.iter().any(|(task_id, _, _)| *task_id == id)
    }

    /// Starts loading the tables of a registered surface in the background.
    /// Returns false when the surface is unknown.
    pub fn spawn(
        &mut self,
        registry: &WaterSurfaceRegistry,
        id: SurfaceId,
        terrain: Arc<dyn TerrainSampler>,
    ) -> bool {
        self.spawn_with(registry, id, terrain, false)
    }

    /// Like [`Self::spawn`], optionally ignoring any persisted tables.
    pub fn spawn_with(
        &mut self,
        registry: &WaterSurfaceRegistry,
        id: SurfaceId,
        terrain: Arc<dyn TerrainSampler>,
        force_recompute: bool,
    ) -> bool {
        let (Some(surface), Some(handle)) = (registry.get(id), registry.handle(id)) else {
            return false;
        };
        let job = TableJob {
            force_recompute,
            ..surface.table_job()
        };
        let revision = job.revision;

        let task_pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        let task = task_pool.spawn(async move {
            if !handle.is_live() {
                return None;
            }
            let loaded = job.run(terrain.as_ref());
            // The surface may have been removed while we were sampling
            handle.is_live().then_some(loaded)
        });

        debug!("Spawned table load for water surface {:?}", id);
        self.tasks.push((id, revision, task));
        true
    }

    /// Installs every finished load into its surface. Loads whose surface
    /// has been removed or rebuilt in the meantime are dropped.
    pub fn poll(&mut self, registry: &mut WaterSurfaceRegistry) -> Vec<LoadOutcome> {
        let mut completed: Vec<(usize, SurfaceId, u64, Option<LoadedTables>)> = Vec::new();

        for (index, (id, revision, task)) in self.tasks.iter_mut().enumerate() {
            if let Some(result) = future::block_on(future::poll_once(task)) {
                completed.push((index, *id, *revision, result));
            }
        }

        let mut outcomes = Vec::new();
        for (index, id, revision, loaded) in completed.into_iter().rev() {
            let _ = self.tasks.swap_remove(index);

            let (Some(loaded), Some(surface)) = (loaded, registry.get_mut(id)) else {
                debug!("Discarding table load for removed water surface {:?}", id);
                continue;
            };
            if surface.revision() != revision {
                debug!(
                    "Discarding stale table load for water surface {:?} (revision {}, now {})",
                    id,
                    revision,
                    surface.revision()
                );
                continue;
            }

            let source = loaded.source;
            let result = surface.install_tables(loaded).map(|_| source);
            match &result {
                Ok(source) => info!("Loaded tables for water surface {:?} ({:?})", id, source),
                Err(e) => warn!("Water surface {:?} failed to install tables: {}", id, e),
            }
            outcomes.push(LoadOutcome { id, result });
        }
        outcomes
    }
}

impl std::fmt::Debug for TableLoadTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableLoadTasks")
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaterSurfaceConfig;
    use crate::simulation::FixedSlotPool;
    use crate::surface::{SurfaceStatus, WaterSurface};
    use crate::terrain::FlatTerrain;
    use bevy::math::Vec2;

    fn small_config() -> WaterSurfaceConfig {
        WaterSurfaceConfig {
            size: Vec2::new(8.0, 8.0),
            cell_size: 4.0,
            ..Default::default()
        }
    }

    fn poll_until_idle(
        tasks: &mut TableLoadTasks,
        registry: &mut WaterSurfaceRegistry,
    ) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..1000 {
            outcomes.extend(tasks.poll(registry));
            if tasks.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        outcomes
    }

    #[test]
    fn test_background_load_installs_tables() {
        let mut registry = WaterSurfaceRegistry::default();
        let mut tasks = TableLoadTasks::default();
        let id = registry.insert(WaterSurface::new(small_config()).unwrap());

        assert!(tasks.spawn(&registry, id, Arc::new(FlatTerrain { height: -10.0 })));
        assert!(tasks.is_loading(id));

        let outcomes = poll_until_idle(&mut tasks, &mut registry);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Ok(TableSource::Recomputed)));
        assert_eq!(registry.get(id).unwrap().status(), SurfaceStatus::Ready);
    }

    #[test]
    fn test_load_for_removed_surface_is_discarded() {
        let mut registry = WaterSurfaceRegistry::default();
        let mut tasks = TableLoadTasks::default();
        let mut pool = FixedSlotPool::new(1);
        let id = registry.insert(WaterSurface::new(small_config()).unwrap());

        assert!(tasks.spawn(&registry, id, Arc::new(FlatTerrain { height: -10.0 })));
        assert!(registry.remove(id, &mut pool).is_some());

        let outcomes = poll_until_idle(&mut tasks, &mut registry);
        assert!(outcomes.is_empty());
        assert!(tasks.is_empty());
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_load_for_rebuilt_surface_is_discarded() {
        let mut registry = WaterSurfaceRegistry::default();
        let mut tasks = TableLoadTasks::default();
        let mut pool = FixedSlotPool::new(1);
        let id = registry.insert(WaterSurface::new(small_config()).unwrap());

        assert!(tasks.spawn(&registry, id, Arc::new(FlatTerrain { height: -10.0 })));
        let wider = WaterSurfaceConfig {
            size: Vec2::new(16.0, 8.0),
            ..small_config()
        };
        registry
            .get_mut(id)
            .unwrap()
            .reconfigure(wider, &mut pool)
            .unwrap();

        let outcomes = poll_until_idle(&mut tasks, &mut registry);
        assert!(outcomes.is_empty());
        assert!(tasks.is_empty());
        let surface = registry.get(id).unwrap();
        assert_eq!(surface.status(), SurfaceStatus::Pending);
        assert!(surface.tables().is_none());

        // A load for the current revision goes through
        assert!(tasks.spawn(&registry, id, Arc::new(FlatTerrain { height: -10.0 })));
        let outcomes = poll_until_idle(&mut tasks, &mut registry);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
        let surface = registry.get(id).unwrap();
        assert_eq!(surface.status(), SurfaceStatus::Ready);
        assert_eq!(
            surface.tables().unwrap().rigid.len(),
            surface.layout().vertex_count()
        );
    }

    #[test]
    fn test_load_for_moved_surface_is_discarded() {
        let mut registry = WaterSurfaceRegistry::default();
        let mut tasks = TableLoadTasks::default();
        let mut pool = FixedSlotPool::new(1);
        let id = registry.insert(WaterSurface::new(small_config()).unwrap());

        // Same vertex count, different footprint
        assert!(tasks.spawn(&registry, id, Arc::new(FlatTerrain { height: -10.0 })));
        let moved = WaterSurfaceConfig {
            position: bevy::math::Vec3::new(500.0, 0.0, 0.0),
            ..small_config()
        };
        registry
            .get_mut(id)
            .unwrap()
            .reconfigure(moved, &mut pool)
            .unwrap();

        assert!(poll_until_idle(&mut tasks, &mut registry).is_empty());
        assert_eq!(registry.get(id).unwrap().status(), SurfaceStatus::Pending);
    }

    #[test]
    fn test_spawn_for_unknown_surface() {
        let registry = WaterSurfaceRegistry::default();
        let mut tasks = TableLoadTasks::default();
        assert!(!tasks.spawn(&registry, SurfaceId(7), Arc::new(FlatTerrain { height: 0.0 })));
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_missing_terrain_is_default_guess() {
        let config = small_config();
        let job = WaterSurface::new(config).unwrap().table_job();
        let nothing = |_: Vec2| -> Option<(f32, bevy::math::Vec3)> { None };
        let loaded = job.run(&nothing);
        assert_eq!(loaded.source, TableSource::DefaultGuess);
        assert_eq!(loaded.tables.dry_count(), 0);
    }
}
