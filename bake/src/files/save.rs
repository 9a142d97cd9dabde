use bevy::log::info;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use water::{SurfaceId, TableSource, WaterSurface};

/// Summary of one baked surface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SurfaceReport {
    /// Position in the manifest
    pub index: usize,
    pub id: Option<SurfaceId>,
    pub vertices: usize,
    pub dry_vertices: usize,
    pub pages: usize,
    pub strips: usize,
    pub cells: usize,
    pub bank_points: usize,
    pub source: Option<TableSource>,
    pub error: Option<String>,
}

impl SurfaceReport {
    pub fn failed(index: usize, id: Option<SurfaceId>, error: String) -> Self {
        Self {
            index,
            id,
            vertices: 0,
            dry_vertices: 0,
            pages: 0,
            strips: 0,
            cells: 0,
            bank_points: 0,
            source: None,
            error: Some(error),
        }
    }

    pub fn from_surface(index: usize, id: SurfaceId, surface: &WaterSurface) -> Self {
        Self {
            index,
            id: Some(id),
            vertices: surface.layout().vertex_count(),
            dry_vertices: surface.tables().map_or(0, |tables| tables.dry_count()),
            pages: surface.mesh().page_count(),
            strips: surface.mesh().strip_count(),
            cells: surface.grid().cell_count(),
            bank_points: surface.bank().bank_point_count(),
            source: surface.table_source(),
            error: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BakeReportData {
    pub surfaces: Vec<SurfaceReport>,
}

impl BakeReportData {
    pub fn failures(&self) -> usize {
        self.surfaces
            .iter()
            .filter(|surface| surface.error.is_some())
            .count()
    }
}

pub fn save_report(
    report: &BakeReportData,
    file_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    // configure RON serialization
    let pretty_config = PrettyConfig::new()
        .with_depth_limit(3)
        .with_separate_tuple_members(true)
        .with_enumerate_arrays(true);

    let serialized = ron::ser::to_string_pretty(report, pretty_config)?;
    let mut file = File::create(file_path)?;
    file.write_all(serialized.as_bytes())?;
    info!("Bake report saved to {}", file_path.display());
    Ok(())
}
