use std::collections::HashMap;

use ahash::RandomState as AHasher;
use dashmap::DashMap;

use crate::engine::Board;

/// A chance node is identified by its board and the moves left to search.
type TranspositionKey = (Board, u64);

/// Chance-node values for one top-level search. A lookup hits only on the
/// exact (board, depth) it was stored under.
#[derive(Debug, Default)]
pub(crate) struct TranspositionTable {
    map: HashMap<TranspositionKey, f64, AHasher>,
}

impl TranspositionTable {
    pub(crate) fn new() -> Self { Self::default() }

    #[inline]
    pub(crate) fn get(&self, board: Board, move_depth: u64) -> Option<f64> {
        self.map.get(&(board, move_depth)).copied()
    }

    #[inline]
    pub(crate) fn insert(&mut self, board: Board, move_depth: u64, score: f64) {
        self.map.insert((board, move_depth), score);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize { self.map.len() }
}

/// Concurrent variant for the parallel search. Two writers for the same key
/// store the same value, so the race is harmless.
#[derive(Debug)]
pub(crate) struct SharedTranspositionTable {
    map: DashMap<TranspositionKey, f64, AHasher>,
}

impl SharedTranspositionTable {
    pub(crate) fn new() -> Self { Self { map: DashMap::with_hasher(AHasher::new()) } }

    #[inline]
    pub(crate) fn get(&self, board: Board, move_depth: u64) -> Option<f64> {
        self.map.get(&(board, move_depth)).map(|entry| *entry)
    }

    #[inline]
    pub(crate) fn insert(&self, board: Board, move_depth: u64, score: f64) {
        self.map.insert((board, move_depth), score);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize { self.map.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_needs_matching_depth() {
        let mut table = TranspositionTable::new();
        let b = Board::from_raw(0x1200_0000_0000_0000);
        table.insert(b, 2, 10.0);
        assert_eq!(table.get(b, 2), Some(10.0));
        assert_eq!(table.get(b, 1), None);
        assert_eq!(table.get(b, 3), None);
    }

    #[test]
    fn depths_are_stored_side_by_side() {
        let mut table = TranspositionTable::new();
        let b = Board::from_raw(0x1200_0000_0000_0000);
        table.insert(b, 3, 30.0);
        table.insert(b, 1, 10.0);
        assert_eq!(table.get(b, 3), Some(30.0));
        assert_eq!(table.get(b, 1), Some(10.0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn shared_table_follows_same_rules() {
        let table = SharedTranspositionTable::new();
        let b = Board::from_raw(0x1200_0000_0000_0000);
        table.insert(b, 2, 20.0);
        table.insert(b, 1, 10.0);
        assert_eq!(table.get(b, 2), Some(20.0));
        assert_eq!(table.get(b, 1), Some(10.0));
        assert_eq!(table.get(b, 3), None);
        assert_eq!(table.get(Board::EMPTY, 2), None);
        assert_eq!(table.len(), 2);
    }
}
