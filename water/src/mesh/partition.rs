//! Index remapping under a bounded index space.
//!
//! A surface mesh can have more vertices than a 16-bit index buffer can
//! address. The partitioner splits the logical vertex grid into pages:
//!
//! - **Primary page** (id 0): every valid vertex whose global index is below
//!   the ceiling, mapped to itself. Strips that only touch these vertices are
//!   drawn without any indirection.
//! - **Overflow pages** (id 1..): dense remappings starting at local index 0.
//!   A strip that touches any vertex above the ceiling is drawn entirely from
//!   one overflow page, so primary vertices it shares get a copy there.
//!
//! A page never holds more than `ceiling` entries and a new page is only
//! started once the current one cannot take the next strip.

use std::collections::HashMap;

use crate::constants::MIN_PAGE_INDEX_CEILING;
use crate::error::{WaterError, WaterResult};

/// Identifies an index page. Page 0 is the primary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PageId(pub u32);

impl PageId {
    pub const PRIMARY: PageId = PageId(0);

    #[inline]
    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }
}

/// One bounded index space.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    id: PageId,
    /// Global index of every entry, in insertion order
    globals: Vec<u32>,
    global_to_local: HashMap<u32, u32>,
}

impl IndexPage {
    fn new(id: PageId) -> Self {
        Self {
            id,
            globals: Vec::new(),
            global_to_local: HashMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Number of entries addressed by this page.
    #[inline]
    pub fn len(&self) -> usize {
        self.globals.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Global indices held by this page. For overflow pages the position in
    /// this slice is the local index.
    #[inline]
    pub fn globals(&self) -> &[u32] {
        &self.globals
    }

    #[inline]
    pub fn local_of(&self, global: u32) -> Option<u32> {
        self.global_to_local.get(&global).copied()
    }

    /// Number of globals in `indices` this page does not hold yet.
    fn missing_count(&self, indices: &[u32]) -> usize {
        let mut seen: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|global| !self.global_to_local.contains_key(global))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    fn insert_identity(&mut self, global: u32) {
        self.globals.push(global);
        self.global_to_local.insert(global, global);
    }

    /// Returns the local index of `global`, assigning the next free one.
    fn map_dense(&mut self, global: u32) -> u32 {
        if let Some(local) = self.global_to_local.get(&global) {
            return *local;
        }
        let local = self.globals.len() as u32;
        self.globals.push(global);
        self.global_to_local.insert(global, local);
        local
    }
}

/// Ordered mapping of global vertex indices to (page, local index).
#[derive(Debug, Clone, Default)]
pub struct IndexRemapTable {
    ceiling: u32,
    pages: Vec<IndexPage>,
    /// Page that first received each global, with its local index there
    owners: HashMap<u32, (PageId, u32)>,
}

impl IndexRemapTable {
    #[inline]
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    #[inline]
    pub fn pages(&self) -> &[IndexPage] {
        &self.pages
    }

    #[inline]
    pub fn page(&self, id: PageId) -> Option<&IndexPage> {
        self.pages.get(id.0 as usize)
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page owning `global` and its local index there.
    #[inline]
    pub fn owner(&self, global: u32) -> Option<(PageId, u32)> {
        self.owners.get(&global).copied()
    }

    /// All (global, page, local) ownership entries.
    pub fn owners(&self) -> impl Iterator<Item = (u32, PageId, u32)> + '_ {
        self.owners
            .iter()
            .map(|(global, (page, local))| (*global, *page, *local))
    }

    #[inline]
    pub fn owned_count(&self) -> usize {
        self.owners.len()
    }
}

/// A triangle strip rewritten into the index space of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedStrip {
    pub page: PageId,
    pub indices: Vec<u32>,
}

/// Output of [`MeshPartitioner::rebuild`].
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub table: IndexRemapTable,
    pub strips: Vec<PagedStrip>,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshPartitioner {
    ceiling: u32,
}

impl MeshPartitioner {
    /// `ceiling` is the largest number of entries a page may hold.
    pub fn new(ceiling: u32) -> WaterResult<Self> {
        if ceiling < MIN_PAGE_INDEX_CEILING {
            return Err(WaterError::invalid_config(format!(
                "page ceiling must be at least {MIN_PAGE_INDEX_CEILING}, got {ceiling}"
            )));
        }
        Ok(Self { ceiling })
    }

    #[inline]
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Assigns every valid vertex to a page and rewrites `strips` through
    /// the page that draws them.
    ///
    /// `valid_vertices` must be the set of vertices that can be referenced;
    /// strips are expected to reference only those.
    pub fn rebuild(&self, valid_vertices: &[u32], strips: &[Vec<u32>]) -> WaterResult<Partition> {
        let mut table = IndexRemapTable {
            ceiling: self.ceiling,
            pages: vec![IndexPage::new(PageId::PRIMARY)],
            owners: HashMap::with_capacity(valid_vertices.len()),
        };

        for &global in valid_vertices.iter().filter(|g| **g < self.ceiling) {
            table.pages[0].insert_identity(global);
            table.owners.insert(global, (PageId::PRIMARY, global));
        }

        let mut paged = Vec::with_capacity(strips.len());
        for (strip_index, strip) in strips.iter().enumerate() {
            if strip.iter().all(|global| *global < self.ceiling) {
                paged.push(PagedStrip {
                    page: PageId::PRIMARY,
                    indices: strip.clone(),
                });
                continue;
            }

            let needed = self.reserve_for(&mut table, strip, strip_index)?;
            let page_id = PageId(table.pages.len() as u32 - 1);
            let page = &mut table.pages[page_id.0 as usize];
            let indices: Vec<u32> = strip.iter().map(|global| page.map_dense(*global)).collect();
            debug_assert!(page.len() <= self.ceiling as usize, "reserved {needed} entries");

            for (global, local) in strip.iter().zip(&indices) {
                table.owners.entry(*global).or_insert((page_id, *local));
            }
            paged.push(PagedStrip {
                page: page_id,
                indices,
            });
        }

        // Valid vertices above the ceiling that no strip references
        for &global in valid_vertices.iter().filter(|g| **g >= self.ceiling) {
            if table.owners.contains_key(&global) {
                continue;
            }
            self.reserve_for(&mut table, &[global], usize::MAX)?;
            let page_id = PageId(table.pages.len() as u32 - 1);
            let local = table.pages[page_id.0 as usize].map_dense(global);
            table.owners.insert(global, (page_id, local));
        }

        log::debug!(
            "Partitioned {} vertices into {} page(s) under ceiling {}",
            valid_vertices.len(),
            table.pages.len(),
            self.ceiling
        );

        Ok(Partition {
            table,
            strips: paged,
        })
    }

    /// Makes sure the last page is an overflow page with room for every
    /// vertex of `indices`, starting a fresh page when needed.
    fn reserve_for(
        &self,
        table: &mut IndexRemapTable,
        indices: &[u32],
        strip_index: usize,
    ) -> WaterResult<usize> {
        let ceiling = self.ceiling as usize;

        if let Some(current) = table.pages.last().filter(|page| !page.id.is_primary()) {
            let missing = current.missing_count(indices);
            if current.len() + missing <= ceiling {
                return Ok(missing);
            }
        }

        let fresh = IndexPage::new(PageId(table.pages.len() as u32));
        let distinct = fresh.missing_count(indices);
        if distinct > ceiling {
            return Err(WaterError::PageOverflow {
                strip: strip_index,
                distinct,
                ceiling: self.ceiling,
            });
        }
        table.pages.push(fresh);
        Ok(distinct)
    }
}
