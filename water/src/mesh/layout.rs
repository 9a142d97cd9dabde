//! Logical vertex grid of a water surface.
//!
//! Vertices are laid out row-major: `index = row * columns + column`, rows
//! running along local Z. The grid is never altered by partitioning; pages
//! only remap its indices.

use bevy::math::Vec2;

use crate::constants::TESSELLATION_TOLERANCE;
use crate::error::{WaterError, WaterResult};

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayout {
    size: Vec2,
    spacing: Vec2,
    columns: u32,
    rows: u32,
}

fn segment_count(name: &str, extent: f32, tessellation: f32) -> WaterResult<u32> {
    let segments = extent / tessellation;
    let rounded = segments.round();
    if rounded < 1.0 {
        return Err(WaterError::invalid_config(format!(
            "{name} {extent} is smaller than the tessellation spacing {tessellation}"
        )));
    }
    if (segments - rounded).abs() > TESSELLATION_TOLERANCE * rounded {
        return Err(WaterError::invalid_config(format!(
            "{name} {extent} is not a multiple of the tessellation spacing {tessellation}"
        )));
    }
    if rounded >= u32::MAX as f32 {
        return Err(WaterError::invalid_config(format!(
            "{name} {extent} needs too many vertices"
        )));
    }
    Ok(rounded as u32)
}

impl SurfaceLayout {
    pub fn new(size: Vec2, tessellation: f32) -> WaterResult<Self> {
        let segments_x = segment_count("width", size.x, tessellation)?;
        let segments_z = segment_count("length", size.y, tessellation)?;

        let columns = segments_x + 1;
        let rows = segments_z + 1;
        if (columns as u64) * (rows as u64) > u32::MAX as u64 {
            return Err(WaterError::invalid_config(format!(
                "{columns}x{rows} vertices exceed the addressable vertex range"
            )));
        }

        Ok(Self {
            size,
            spacing: Vec2::new(size.x / segments_x as f32, size.y / segments_z as f32),
            columns,
            rows,
        })
    }

    #[inline]
    pub fn columns(&self) -> u32 {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn spacing(&self) -> Vec2 {
        self.spacing
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    #[inline]
    pub fn index(&self, column: u32, row: u32) -> usize {
        row as usize * self.columns as usize + column as usize
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (u32, u32) {
        (
            (index % self.columns as usize) as u32,
            (index / self.columns as usize) as u32,
        )
    }

    /// Local XZ of a vertex.
    #[inline]
    pub fn local_position(&self, index: usize) -> Vec2 {
        let (column, row) = self.coords(index);
        Vec2::new(column as f32 * self.spacing.x, row as f32 * self.spacing.y)
    }

    /// Edge-adjacent vertices that exist in the grid.
    pub fn neighbors4(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let (column, row) = self.coords(index);
        let candidates = [
            (column > 0).then(|| self.index(column - 1, row)),
            (column + 1 < self.columns).then(|| self.index(column + 1, row)),
            (row > 0).then(|| self.index(column, row - 1)),
            (row + 1 < self.rows).then(|| self.index(column, row + 1)),
        ];
        candidates.into_iter().flatten()
    }

    /// The four corner vertices of the surface footprint.
    pub fn corners(&self) -> [usize; 4] {
        [
            self.index(0, 0),
            self.index(self.columns - 1, 0),
            self.index(0, self.rows - 1),
            self.index(self.columns - 1, self.rows - 1),
        ]
    }

    /// A quad is wet unless all four corners are rigid.
    fn quad_is_wet(&self, rigid: &[bool], column: u32, row: u32) -> bool {
        !(rigid[self.index(column, row)]
            && rigid[self.index(column + 1, row)]
            && rigid[self.index(column, row + 1)]
            && rigid[self.index(column + 1, row + 1)])
    }

    /// Vertices that border at least one wet quad, ascending.
    pub fn valid_vertices(&self, rigid: &[bool]) -> Vec<u32> {
        debug_assert_eq!(rigid.len(), self.vertex_count());
        let mut valid = vec![false; self.vertex_count()];

        for row in 0..self.rows - 1 {
            for column in 0..self.columns - 1 {
                if self.quad_is_wet(rigid, column, row) {
                    valid[self.index(column, row)] = true;
                    valid[self.index(column + 1, row)] = true;
                    valid[self.index(column, row + 1)] = true;
                    valid[self.index(column + 1, row + 1)] = true;
                }
            }
        }

        valid
            .iter()
            .enumerate()
            .filter_map(|(index, is_valid)| is_valid.then_some(index as u32))
            .collect()
    }

    /// One triangle strip per contiguous run of wet quads in a quad row.
    ///
    /// Strip order alternates the lower and upper vertex row:
    /// `(c, r), (c, r+1), (c+1, r), (c+1, r+1), ...`
    pub fn triangle_strips(&self, rigid: &[bool]) -> Vec<Vec<u32>> {
        debug_assert_eq!(rigid.len(), self.vertex_count());
        let mut strips = Vec::new();

        for row in 0..self.rows - 1 {
            let mut current: Vec<u32> = Vec::new();
            for column in 0..self.columns - 1 {
                if self.quad_is_wet(rigid, column, row) {
                    if current.is_empty() {
                        current.push(self.index(column, row) as u32);
                        current.push(self.index(column, row + 1) as u32);
                    }
                    current.push(self.index(column + 1, row) as u32);
                    current.push(self.index(column + 1, row + 1) as u32);
                } else if !current.is_empty() {
                    strips.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                strips.push(current);
            }
        }

        strips
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_counts() {
        let layout = SurfaceLayout::new(Vec2::new(4.0, 2.0), 1.0).unwrap();
        assert_eq!(layout.columns(), 5);
        assert_eq!(layout.rows(), 3);
        assert_eq!(layout.vertex_count(), 15);
        assert_eq!(layout.local_position(7), Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_incompatible_tessellation() {
        assert!(SurfaceLayout::new(Vec2::new(4.5, 2.0), 1.0).is_err());
        assert!(SurfaceLayout::new(Vec2::new(0.5, 2.0), 1.0).is_err());
    }

    #[test]
    fn test_neighbors_at_corner() {
        let layout = SurfaceLayout::new(Vec2::new(2.0, 2.0), 1.0).unwrap();
        let neighbors: Vec<usize> = layout.neighbors4(0).collect();
        assert_eq!(neighbors, vec![1, 3]);
        assert_eq!(layout.neighbors4(4).count(), 4);
    }

    #[test]
    fn test_open_water_strips() {
        let layout = SurfaceLayout::new(Vec2::new(3.0, 2.0), 1.0).unwrap();
        let rigid = vec![false; layout.vertex_count()];
        let strips = layout.triangle_strips(&rigid);
        assert_eq!(strips.len(), 2);
        assert_eq!(strips[0], vec![0, 4, 1, 5, 2, 6, 3, 7]);
        assert_eq!(layout.valid_vertices(&rigid).len(), 12);
    }

    #[test]
    fn test_dry_quads_split_strips() {
        // 5x2 vertices; columns 2 and 3 are dry so quad 2 has four dry corners
        let layout = SurfaceLayout::new(Vec2::new(4.0, 1.0), 1.0).unwrap();
        let rigid: Vec<bool> = (0..layout.vertex_count())
            .map(|i| matches!(layout.coords(i).0, 2 | 3))
            .collect();
        let strips = layout.triangle_strips(&rigid);
        assert_eq!(strips, vec![vec![0, 5, 1, 6, 2, 7], vec![3, 8, 4, 9]]);
        // Every vertex still borders a wet quad
        assert_eq!(layout.valid_vertices(&rigid).len(), 10);
    }

    #[test]
    fn test_fully_dry_grid_has_no_valid_vertices() {
        let layout = SurfaceLayout::new(Vec2::new(2.0, 2.0), 1.0).unwrap();
        let rigid = vec![true; layout.vertex_count()];
        assert!(layout.valid_vertices(&rigid).is_empty());
        assert!(layout.triangle_strips(&rigid).is_empty());
    }
}
