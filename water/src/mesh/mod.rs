//! Static surface geometry.
//!
//! - [`layout`]: the logical vertex grid, its strips and valid vertices
//! - [`partition`]: remapping of that grid into bounded index pages
//! - [`pages`]: per-page vertex buffers ready for upload

pub mod layout;
pub mod pages;
pub mod partition;

pub use layout::SurfaceLayout;
pub use pages::{SurfaceMesh, SurfaceVertex, VertexPage};
pub use partition::{IndexPage, IndexRemapTable, MeshPartitioner, PageId, PagedStrip, Partition};
