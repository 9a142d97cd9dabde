use bevy::log::info;
use ron::de::from_str;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use water::{HeightmapTerrain, WaterSurfaceConfig};

/// The surfaces a bake run processes, read from a RON file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BakeManifest {
    pub surfaces: Vec<WaterSurfaceConfig>,
}

pub fn load_manifest(file_path: &Path) -> Result<BakeManifest, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(file_path)?;
    let manifest: BakeManifest = from_str(&contents)?;
    info!(
        "Loaded {} water surface(s) from {}",
        manifest.surfaces.len(),
        file_path.display()
    );
    Ok(manifest)
}

pub fn load_heightmap(file_path: &Path) -> Result<HeightmapTerrain, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(file_path)?;
    let terrain: HeightmapTerrain = from_str(&contents)?;
    terrain.validate()?;
    info!("Loaded heightmap from {}", file_path.display());
    Ok(terrain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_uses_defaults_for_missing_fields() {
        let manifest: BakeManifest = from_str(
            "(surfaces: [(size: (32.0, 16.0), cell_size: 8.0, table_path: Some(\"lake.tables\"))])",
        )
        .unwrap();
        assert_eq!(manifest.surfaces.len(), 1);
        let surface = &manifest.surfaces[0];
        assert_eq!(surface.cell_size, 8.0);
        assert_eq!(surface.tessellation, WaterSurfaceConfig::default().tessellation);
        assert!(surface.validate().is_ok());
    }
}
