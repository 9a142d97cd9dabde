//! Vertex buffers for each index page.

use bevy::math::{Vec2, Vec3};

use super::layout::SurfaceLayout;
use super::partition::{IndexRemapTable, PageId, Partition};
use crate::bank::BankField;
use crate::config::ShoreTuning;
use crate::tables::SurfaceTables;

/// Per-vertex data consumed by the water shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceVertex {
    /// Surface-local position (Y = 0 at water level)
    pub position: Vec3,
    pub bank_direction: Vec2,
    pub bank_distance: f32,
    /// Depth-derived opacity, 0.0 - 1.0
    pub alpha: f32,
    /// Shore foam intensity, 0.0 - 1.0
    pub foam: f32,
}

/// One vertex buffer plus the strips drawn from it.
#[derive(Debug, Clone, Default)]
pub struct VertexPage {
    pub id: PageId,
    /// Indexed by local index
    pub vertices: Vec<SurfaceVertex>,
    pub strips: Vec<Vec<u32>>,
}

/// All pages of one surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceMesh {
    pages: Vec<VertexPage>,
    table: IndexRemapTable,
}

impl SurfaceMesh {
    pub fn build(
        layout: &SurfaceLayout,
        tables: &SurfaceTables,
        bank: &BankField,
        shore: &ShoreTuning,
        partition: Partition,
    ) -> Self {
        let vertex = |global: u32| {
            let index = global as usize;
            let xz = layout.local_position(index);
            let sample = bank.sample(index);
            SurfaceVertex {
                position: Vec3::new(xz.x, 0.0, xz.y),
                bank_direction: sample.direction,
                bank_distance: sample.distance,
                alpha: tables.alpha_at(index),
                foam: sample.foam(shore),
            }
        };

        let Partition { table, strips } = partition;
        let mut pages: Vec<VertexPage> = table
            .pages()
            .iter()
            .map(|page| {
                let vertices = if page.id().is_primary() {
                    // Identity mapped: the buffer mirrors the grid prefix
                    let count = layout.vertex_count().min(table.ceiling() as usize);
                    (0..count as u32).map(vertex).collect()
                } else {
                    page.globals().iter().map(|global| vertex(*global)).collect()
                };
                VertexPage {
                    id: page.id(),
                    vertices,
                    strips: Vec::new(),
                }
            })
            .collect();

        for strip in strips {
            pages[strip.page.0 as usize].strips.push(strip.indices);
        }

        Self { pages, table }
    }

    #[inline]
    pub fn pages(&self) -> &[VertexPage] {
        &self.pages
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn strip_count(&self) -> usize {
        self.pages.iter().map(|page| page.strips.len()).sum()
    }

    #[inline]
    pub fn remap_table(&self) -> &IndexRemapTable {
        &self.table
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strip_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BankFieldBuilder;
    use crate::mesh::MeshPartitioner;

    #[test]
    fn test_pages_hold_remapped_vertices() {
        // 6x4 vertices, ceiling 12: the upper two rows spill over
        let layout = SurfaceLayout::new(Vec2::new(5.0, 3.0), 1.0).unwrap();
        let tables = SurfaceTables::open_water(layout.vertex_count());
        let bank = BankFieldBuilder::new(4.0).build(&layout, &tables.rigid);
        let partition = MeshPartitioner::new(12)
            .unwrap()
            .rebuild(
                &layout.valid_vertices(&tables.rigid),
                &layout.triangle_strips(&tables.rigid),
            )
            .unwrap();

        let mesh = SurfaceMesh::build(&layout, &tables, &bank, &ShoreTuning::default(), partition);
        assert_eq!(mesh.page_count(), 3);
        assert_eq!(mesh.strip_count(), 3);
        assert_eq!(mesh.pages()[0].vertices.len(), 12);
        assert_eq!(mesh.pages()[0].strips.len(), 1);

        for page in mesh.pages() {
            assert!(page.vertices.len() <= 12);
            for strip in &page.strips {
                assert!(strip.iter().all(|local| (*local as usize) < page.vertices.len()));
            }
        }

        // The first overflow strip starts at grid row 1, column 0
        let overflow = &mesh.pages()[1];
        assert_eq!(overflow.vertices[0].position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(overflow.vertices[1].position, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_vertices_carry_shore_foam() {
        // Column 0 is dry, so columns 0 and 1 form the bank line
        let layout = SurfaceLayout::new(Vec2::new(5.0, 3.0), 1.0).unwrap();
        let mut tables = SurfaceTables::open_water(layout.vertex_count());
        for index in 0..layout.vertex_count() {
            tables.rigid[index] = layout.coords(index).0 == 0;
        }
        let shore = ShoreTuning {
            interpolation_radius: 2.0,
            foam_scale: 0.5,
            foam_bias: 0.25,
        };
        let bank = BankFieldBuilder::new(shore.interpolation_radius).build(&layout, &tables.rigid);
        let partition = MeshPartitioner::new(64)
            .unwrap()
            .rebuild(
                &layout.valid_vertices(&tables.rigid),
                &layout.triangle_strips(&tables.rigid),
            )
            .unwrap();

        let mesh = SurfaceMesh::build(&layout, &tables, &bank, &shore, partition);
        let primary = &mesh.pages()[0];
        assert_eq!(primary.vertices.len(), layout.vertex_count());
        for (index, vertex) in primary.vertices.iter().enumerate() {
            assert_eq!(vertex.foam, bank.sample(index).foam(&shore));
            assert!((0.25..=0.75).contains(&vertex.foam));
        }

        let on_bank = primary.vertices[layout.index(1, 1)].foam;
        let open = primary.vertices[layout.index(5, 1)].foam;
        assert!((on_bank - 0.75).abs() < 1e-5);
        assert_eq!(open, 0.25);
    }
}
