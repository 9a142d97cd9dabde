//! Set of live water surfaces.
//!
//! Surfaces are removed from the registry before they are destroyed, so
//! background work holding a [`SurfaceHandle`] can tell that its target is
//! gone.

use bevy::math::Vec3;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::simulation::SimulationBackend;
use crate::surface::WaterSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

type LiveSet = Arc<Mutex<HashSet<SurfaceId>>>;

/// Liveness check for one surface, safe to move into background tasks.
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    id: SurfaceId,
    live: LiveSet,
}

impl SurfaceHandle {
    #[inline]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&self.id)
    }
}

#[derive(Resource, Default, Debug)]
pub struct WaterSurfaceRegistry {
    surfaces: HashMap<SurfaceId, WaterSurface>,
    live: LiveSet,
    next_id: u64,
}

impl WaterSurfaceRegistry {
    pub fn insert(&mut self, surface: WaterSurface) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.surfaces.insert(id, surface);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        id
    }

    /// Unregisters a surface and gives its slots back. In-flight loads for
    /// it are discarded.
    pub fn remove(
        &mut self,
        id: SurfaceId,
        backend: &mut dyn SimulationBackend,
    ) -> Option<WaterSurface> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let mut surface = self.surfaces.remove(&id)?;
        surface.release(backend);
        Some(surface)
    }

    #[inline]
    pub fn get(&self, id: SurfaceId) -> Option<&WaterSurface> {
        self.surfaces.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut WaterSurface> {
        self.surfaces.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SurfaceId, &WaterSurface)> {
        self.surfaces.iter().map(|(id, surface)| (*id, surface))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn handle(&self, id: SurfaceId) -> Option<SurfaceHandle> {
        self.surfaces.contains_key(&id).then(|| SurfaceHandle {
            id,
            live: Arc::clone(&self.live),
        })
    }

    pub fn is_live(&self, id: SurfaceId) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Offers a movement to every surface. Returns how many surfaces the
    /// segment touched.
    pub fn inject_movement_all(&mut self, from: Vec3, to: Vec3, diameter: f32) -> usize {
        self.surfaces
            .values_mut()
            .map(|surface| surface.inject_movement(from, to, diameter))
            .filter(|touched| *touched)
            .count()
    }

    pub fn tick_all(&mut self, dt: f32, viewer_world: Vec3, backend: &mut dyn SimulationBackend) {
        for surface in self.surfaces.values_mut() {
            surface.tick(dt, viewer_world, backend);
        }
    }

    /// Releases every slot held by any surface.
    pub fn release_all(&mut self, backend: &mut dyn SimulationBackend) {
        for surface in self.surfaces.values_mut() {
            surface.release(backend);
        }
    }
}
