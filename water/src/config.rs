//! Water surface configuration.
//!
//! Serializable so surfaces can be described in RON files and rebuilt
//! whenever a field changes.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_BANK_RADIUS, DEFAULT_EDGE_THRESHOLD, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MIN_MOVEMENT_LENGTH, DEFAULT_PAGE_INDEX_CEILING, DEFAULT_SIMULATION_HORIZON,
    MIN_PAGE_INDEX_CEILING,
};
use crate::error::{WaterError, WaterResult};

/// From where a surface should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VisibilityMode {
    #[default]
    Always,
    /// Only while the viewer is inside the water volume
    InsideOnly,
    /// Only while the viewer is outside the water volume
    OutsideOnly,
}

/// Activation/propagation thresholds for the simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationTuning {
    /// Fraction of a cell's span from an edge within which movement
    /// activity spills over into the neighbor (0.0 - 0.5)
    pub edge_threshold: f32,
    /// Seconds a quiet cell keeps its slot before releasing it
    pub idle_timeout: f32,
    /// Cells further than this from the viewer are never simulated
    pub horizon: f32,
    /// Clipped segments shorter than this are stationary and ignored
    pub min_movement_length: f32,
}

impl Default for SimulationTuning {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            horizon: DEFAULT_SIMULATION_HORIZON,
            min_movement_length: DEFAULT_MIN_MOVEMENT_LENGTH,
        }
    }
}

/// Shoreline field and foam parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoreTuning {
    /// Bank samples further than this do not contribute to a vertex
    pub interpolation_radius: f32,
    pub foam_scale: f32,
    pub foam_bias: f32,
}

impl Default for ShoreTuning {
    fn default() -> Self {
        Self {
            interpolation_radius: DEFAULT_BANK_RADIUS,
            foam_scale: 1.0,
            foam_bias: 0.0,
        }
    }
}

/// Complete description of one water surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterSurfaceConfig {
    /// World position of the surface center at water level
    pub position: Vec3,
    /// Rotation around the vertical axis (radians)
    pub yaw: f32,
    /// Width (local X) and length (local Z) in world units
    pub size: Vec2,
    /// Distance between mesh vertices
    pub tessellation: f32,
    /// Distance between simulation texels
    pub texture_tessellation: f32,
    /// Side length of one simulation cell
    pub cell_size: f32,
    pub consistency: f32,
    pub smoothness: f32,
    /// Depth of the water volume below the surface
    pub depth: f32,
    /// Water depth at which the surface becomes fully opaque
    pub fade_depth: f32,
    /// Height of the volume above the surface that still counts as "in the water"
    pub surface_clearance: f32,
    pub shore: ShoreTuning,
    pub simulation_enabled: bool,
    pub visibility: VisibilityMode,
    pub tuning: SimulationTuning,
    /// Largest number of vertices a single index page may address
    pub max_page_index: u32,
    /// Where the precomputed rigidity/alpha tables are stored
    pub table_path: Option<PathBuf>,
}

impl Default for WaterSurfaceConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            size: Vec2::new(64.0, 64.0),
            tessellation: 1.0,
            texture_tessellation: 0.25,
            cell_size: 16.0,
            consistency: 0.5,
            smoothness: 0.5,
            depth: 4.0,
            fade_depth: 2.0,
            surface_clearance: 1.0,
            shore: ShoreTuning::default(),
            simulation_enabled: true,
            visibility: VisibilityMode::default(),
            tuning: SimulationTuning::default(),
            max_page_index: DEFAULT_PAGE_INDEX_CEILING,
            table_path: None,
        }
    }
}

fn require_positive(name: &str, value: f32) -> WaterResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(WaterError::invalid_config(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl WaterSurfaceConfig {
    /// Checks every field that the surface build depends on.
    /// Tessellation compatibility is checked by the mesh layout.
    pub fn validate(&self) -> WaterResult<()> {
        require_positive("size.x", self.size.x)?;
        require_positive("size.y", self.size.y)?;
        require_positive("tessellation", self.tessellation)?;
        require_positive("texture_tessellation", self.texture_tessellation)?;
        require_positive("cell_size", self.cell_size)?;
        require_positive("depth", self.depth)?;
        require_positive("fade_depth", self.fade_depth)?;

        if !self.yaw.is_finite() || !self.position.is_finite() {
            return Err(WaterError::invalid_config("transform must be finite"));
        }
        if !(0.0..=0.5).contains(&self.tuning.edge_threshold) {
            return Err(WaterError::invalid_config(format!(
                "edge_threshold must be within 0.0..=0.5, got {}",
                self.tuning.edge_threshold
            )));
        }
        if self.tuning.idle_timeout < 0.0 || self.tuning.min_movement_length < 0.0 {
            return Err(WaterError::invalid_config(
                "idle_timeout and min_movement_length must not be negative",
            ));
        }
        if self.surface_clearance < 0.0 || self.shore.interpolation_radius < 0.0 {
            return Err(WaterError::invalid_config(
                "surface_clearance and interpolation_radius must not be negative",
            ));
        }
        if self.max_page_index < MIN_PAGE_INDEX_CEILING {
            return Err(WaterError::invalid_config(format!(
                "max_page_index must be at least {MIN_PAGE_INDEX_CEILING}, got {}",
                self.max_page_index
            )));
        }
        Ok(())
    }

    /// Number of simulation texels along one cell side.
    pub fn texture_resolution(&self) -> u32 {
        (self.cell_size / self.texture_tessellation).ceil().max(1.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(WaterSurfaceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_cell_size() {
        let config = WaterSurfaceConfig {
            cell_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WaterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_small_page_ceiling() {
        let config = WaterSurfaceConfig {
            max_page_index: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_texture_resolution() {
        let config = WaterSurfaceConfig {
            cell_size: 16.0,
            texture_tessellation: 0.25,
            ..Default::default()
        };
        assert_eq!(config.texture_resolution(), 64);
    }
}
