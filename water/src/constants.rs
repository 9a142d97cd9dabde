/// Version tag written in front of every persisted table payload.
/// Bump whenever the rigidity/alpha derivation or the envelope changes.
pub const TABLE_VERSION: u32 = 1;

/// Byte that introduces a run record in the RLE stream.
pub const RLE_ESCAPE_MARKER: u8 = 0xFF;
/// Longest run a single escape record can carry.
pub const RLE_MAX_RUN: usize = 254;
/// Runs shorter than or equal to this are written as literals.
pub const RLE_LITERAL_RUN: usize = 2;

/// Largest number of entries a 16-bit index page can address.
pub const DEFAULT_PAGE_INDEX_CEILING: u32 = u16::MAX as u32;
/// A page must at least hold one triangle.
pub const MIN_PAGE_INDEX_CEILING: u32 = 3;

/// Quantized alpha for open water with no depth information.
pub const ALPHA_OPEN_WATER: u32 = 255;

/// Distance stored for vertices with no bank sample in range.
pub const BANK_DISTANCE_SENTINEL: f32 = f32::MAX;

pub const DEFAULT_EDGE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_IDLE_TIMEOUT: f32 = 2.0;
pub const DEFAULT_SIMULATION_HORIZON: f32 = 150.0;
pub const DEFAULT_MIN_MOVEMENT_LENGTH: f32 = 0.01;
pub const DEFAULT_BANK_RADIUS: f32 = 8.0;

/// Relative tolerance when checking that the surface size is a whole
/// multiple of the tessellation spacing.
pub const TESSELLATION_TOLERANCE: f32 = 1e-3;

pub const INVALID_CONFIG_ERROR: &str = "Invalid water surface configuration";
pub const TABLE_WRITE_ERROR: &str = "Failed to write persisted water tables";
