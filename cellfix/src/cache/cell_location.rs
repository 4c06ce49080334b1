//! In-memory cell id to coordinates table.
//!
//! Cell geography does not change while the process runs, so entries are
//! never evicted. The table is owned by the provider's event loop and is
//! never shared, hence no locking.

use std::collections::{HashMap, HashSet};

use crate::cell::{Coordinates, UniqueCellId};

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup {
    /// The cell has known coordinates.
    Found(Coordinates),
    /// The cell was never resolved; an online lookup may help.
    NotFound,
    /// The cell was looked up before and has no known location.
    KnownUnlocatable,
}

impl CacheLookup {
    /// Coordinates if the cell is resolved.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            CacheLookup::Found(coords) => Some(*coords),
            _ => None,
        }
    }
}

/// Maps cell ids to coordinates and remembers unlocatable cells.
///
/// A cell id is never present in both tables at once.
#[derive(Debug, Default)]
pub struct CellLocationCache {
    locations: HashMap<UniqueCellId, Coordinates>,
    unlocatable: HashSet<UniqueCellId>,
}

impl CellLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cell.
    pub fn lookup(&self, cell: &UniqueCellId) -> CacheLookup {
        if let Some(coords) = self.locations.get(cell) {
            CacheLookup::Found(*coords)
        } else if self.unlocatable.contains(cell) {
            CacheLookup::KnownUnlocatable
        } else {
            CacheLookup::NotFound
        }
    }

    /// Store coordinates for a cell, replacing any previous entry.
    ///
    /// The cell is removed from the unlocatable set.
    pub fn store(&mut self, cell: UniqueCellId, coords: Coordinates) {
        if self.unlocatable.remove(&cell) {
            tracing::debug!(cell = %cell, "Previously unlocatable cell resolved");
        }
        self.locations.insert(cell, coords);
    }

    /// Record that a cell has no known location.
    ///
    /// Ignored when the cell already has coordinates. Returns `true` if the
    /// cell was newly marked.
    pub fn mark_unlocatable(&mut self, cell: UniqueCellId) -> bool {
        if self.locations.contains_key(&cell) {
            return false;
        }
        self.unlocatable.insert(cell)
    }

    /// Number of cells with known coordinates.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of cells known to be unlocatable.
    pub fn unlocatable_len(&self) -> usize {
        self.unlocatable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cell(id: u64) -> UniqueCellId {
        UniqueCellId::new(250, 1, 7700, id)
    }

    #[test]
    fn test_unknown_cell_is_not_found() {
        let cache = CellLocationCache::new();
        assert_eq!(cache.lookup(&cell(1)), CacheLookup::NotFound);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_and_lookup() {
        let mut cache = CellLocationCache::new();
        let coords = Coordinates::new(55.75, 37.61);
        cache.store(cell(1), coords);

        assert_eq!(cache.lookup(&cell(1)), CacheLookup::Found(coords));
        assert_eq!(cache.lookup(&cell(1)).coordinates(), Some(coords));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_overwrites() {
        let mut cache = CellLocationCache::new();
        cache.store(cell(1), Coordinates::new(1.0, 1.0));
        cache.store(cell(1), Coordinates::new(2.0, 2.0));

        assert_eq!(
            cache.lookup(&cell(1)),
            CacheLookup::Found(Coordinates::new(2.0, 2.0))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_mark_unlocatable_then_store() {
        let mut cache = CellLocationCache::new();
        assert!(cache.mark_unlocatable(cell(7)));
        assert_eq!(cache.lookup(&cell(7)), CacheLookup::KnownUnlocatable);
        assert_eq!(cache.unlocatable_len(), 1);

        let coords = Coordinates::new(55.76, 37.62);
        cache.store(cell(7), coords);
        assert_eq!(cache.lookup(&cell(7)), CacheLookup::Found(coords));
        assert_eq!(cache.unlocatable_len(), 0);
    }

    #[test]
    fn test_mark_unlocatable_ignored_for_cached_cell() {
        let mut cache = CellLocationCache::new();
        let coords = Coordinates::new(55.75, 37.61);
        cache.store(cell(3), coords);

        assert!(!cache.mark_unlocatable(cell(3)));
        assert_eq!(cache.lookup(&cell(3)), CacheLookup::Found(coords));
        assert_eq!(cache.unlocatable_len(), 0);
    }

    #[test]
    fn test_mark_unlocatable_twice() {
        let mut cache = CellLocationCache::new();
        assert!(cache.mark_unlocatable(cell(9)));
        assert!(!cache.mark_unlocatable(cell(9)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Store(u64),
        Mark(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..16).prop_map(Op::Store),
            (0u64..16).prop_map(Op::Mark),
        ]
    }

    proptest! {
        #[test]
        fn prop_cell_never_in_both_tables(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let mut cache = CellLocationCache::new();
            for op in &ops {
                match op {
                    Op::Store(id) => cache.store(cell(*id), Coordinates::new(1.0, 2.0)),
                    Op::Mark(id) => { cache.mark_unlocatable(cell(*id)); }
                }
            }
            for id in 0..16 {
                let c = cell(id);
                prop_assert!(!(cache.locations.contains_key(&c) && cache.unlocatable.contains(&c)));
            }
        }

        #[test]
        fn prop_untouched_cells_not_found(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let mut cache = CellLocationCache::new();
            for op in &ops {
                match op {
                    Op::Store(id) => cache.store(cell(*id), Coordinates::new(1.0, 2.0)),
                    Op::Mark(id) => { cache.mark_unlocatable(cell(*id)); }
                }
            }
            // Ids 100.. are never touched by the strategy.
            prop_assert_eq!(cache.lookup(&cell(100)), CacheLookup::NotFound);
        }
    }
}
