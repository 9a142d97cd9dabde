use bevy::math::Vec2;

/// A disturbance routed to one simulation cell.
///
/// Entry and exit are in cell-local normalized coordinates: (0, 0) is the
/// cell's minimum corner and (1, 1) its maximum corner (local X, local Z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub entry: Vec2,
    pub exit: Vec2,
    /// Object diameter in world units
    pub diameter: f32,
    /// Length of the clipped segment in world units
    pub magnitude: f32,
}

/// Cell edges, named in surface-local space (Z grows towards the top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Local -X
    Left,
    /// Local +X
    Right,
    /// Local -Z
    Bottom,
    /// Local +Z
    Top,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Bottom, Edge::Top];

    #[inline]
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
            Edge::Bottom => Edge::Top,
            Edge::Top => Edge::Bottom,
        }
    }

    /// True for Left/Right.
    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            Edge::Left => 0,
            Edge::Right => 1,
            Edge::Bottom => 2,
            Edge::Top => 3,
        }
    }

    #[inline]
    fn bit(self) -> u8 {
        1 << self.slot()
    }
}

/// Set of cell edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EdgeMask(u8);

impl EdgeMask {
    pub const NONE: EdgeMask = EdgeMask(0);

    #[inline]
    pub fn insert(&mut self, edge: Edge) {
        self.0 |= edge.bit();
    }

    #[inline]
    pub fn contains(self, edge: Edge) -> bool {
        self.0 & edge.bit() != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn union(self, other: EdgeMask) -> EdgeMask {
        EdgeMask(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Edge> {
        Edge::ALL.into_iter().filter(move |edge| self.contains(*edge))
    }
}

impl FromIterator<Edge> for EdgeMask {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        let mut mask = EdgeMask::NONE;
        for edge in iter {
            mask.insert(edge);
        }
        mask
    }
}

impl Movement {
    /// Edges whose neighbor should see this movement: any point of the
    /// segment within `threshold` (fraction of the span) of the edge.
    pub fn near_edges(&self, threshold: f32) -> EdgeMask {
        let min = self.entry.min(self.exit);
        let max = self.entry.max(self.exit);

        let mut mask = EdgeMask::NONE;
        if min.x < threshold {
            mask.insert(Edge::Left);
        }
        if max.x > 1.0 - threshold {
            mask.insert(Edge::Right);
        }
        if min.y < threshold {
            mask.insert(Edge::Bottom);
        }
        if max.y > 1.0 - threshold {
            mask.insert(Edge::Top);
        }
        mask
    }
}
