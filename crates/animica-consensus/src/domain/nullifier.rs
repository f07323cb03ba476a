//! One-shot proof replay prevention over a sliding block-height window.

use crate::domain::error::ConsensusError;
use animica_types::{Hash, Nullifier};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tracks which nullifiers have been spent, keyed by the height at which
/// they were first accepted, so entries can be purged once they fall more
/// than `nullifier_window` blocks behind the tip.
///
/// Exclusive to one owner (the service layer); callers coordinate their
/// own locking if shared across threads.
#[derive(Debug, Default)]
pub struct NullifierStore {
    by_height: BTreeMap<u64, HashSet<Hash>>,
    reverse: HashMap<Hash, u64>,
}

impl NullifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the height a nullifier was first seen at, if it is
    /// currently tracked.
    pub fn first_seen_height(&self, nullifier: &Nullifier) -> Option<u64> {
        self.reverse.get(&nullifier.0).copied()
    }

    /// Check a batch of nullifiers for conflicts with the active window
    /// without mutating the store. Used during block validation, before
    /// `insert_block` commits them.
    pub fn check_no_conflict(&self, nullifiers: &[Nullifier]) -> Result<(), ConsensusError> {
        let mut seen_in_batch = HashSet::with_capacity(nullifiers.len());
        for n in nullifiers {
            if let Some(height) = self.first_seen_height(n) {
                return Err(ConsensusError::NullifierReuse {
                    nullifier: n.0,
                    first_seen_height: height,
                });
            }
            if !seen_in_batch.insert(n.0) {
                return Err(ConsensusError::NullifierReuse {
                    nullifier: n.0,
                    first_seen_height: u64::MAX,
                });
            }
        }
        Ok(())
    }

    /// Record all nullifiers from a newly accepted block at `height`.
    /// Caller must have already called `check_no_conflict` for the same
    /// set within the same validation pass.
    pub fn insert_block(&mut self, height: u64, nullifiers: &[Nullifier]) {
        let entry = self.by_height.entry(height).or_default();
        for n in nullifiers {
            entry.insert(n.0);
            self.reverse.insert(n.0, height);
        }
    }

    /// Remove all nullifiers recorded at `height`, used when a block is
    /// abandoned during a reorg.
    pub fn remove_block(&mut self, height: u64, nullifiers: &[Nullifier]) {
        if let Some(set) = self.by_height.get_mut(&height) {
            for n in nullifiers {
                set.remove(&n.0);
                if let Some(&recorded_height) = self.reverse.get(&n.0) {
                    if recorded_height == height {
                        self.reverse.remove(&n.0);
                    }
                }
            }
            if set.is_empty() {
                self.by_height.remove(&height);
            }
        }
    }

    /// Drop every entry older than `tip_height - window`. Called after
    /// every accepted block so the window never grows unbounded.
    pub fn purge(&mut self, tip_height: u64, window: u64) {
        let floor = tip_height.saturating_sub(window);
        let stale: Vec<u64> = self
            .by_height
            .range(..floor)
            .map(|(height, _)| *height)
            .collect();
        for height in stale {
            if let Some(set) = self.by_height.remove(&height) {
                for hash in set {
                    if let Some(&recorded_height) = self.reverse.get(&hash) {
                        if recorded_height == height {
                            self.reverse.remove(&hash);
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nf(byte: u8) -> Nullifier {
        Nullifier([byte; 32])
    }

    #[test]
    fn fresh_nullifier_has_no_conflict() {
        let store = NullifierStore::new();
        assert!(store.check_no_conflict(&[nf(1), nf(2)]).is_ok());
    }

    #[test]
    fn duplicate_within_same_block_is_rejected() {
        let store = NullifierStore::new();
        assert!(store.check_no_conflict(&[nf(1), nf(1)]).is_err());
    }

    #[test]
    fn reused_nullifier_across_blocks_is_rejected() {
        let mut store = NullifierStore::new();
        store.insert_block(10, &[nf(1)]);
        let err = store.check_no_conflict(&[nf(1)]).unwrap_err();
        match err {
            ConsensusError::NullifierReuse {
                first_seen_height, ..
            } => assert_eq!(first_seen_height, 10),
            other => panic!("expected NullifierReuse, got {other:?}"),
        }
    }

    #[test]
    fn remove_block_clears_entries_for_reorg() {
        let mut store = NullifierStore::new();
        store.insert_block(10, &[nf(1), nf(2)]);
        store.remove_block(10, &[nf(1), nf(2)]);
        assert!(store.check_no_conflict(&[nf(1)]).is_ok());
        assert!(store.is_empty());
    }

    #[test]
    fn purge_drops_entries_outside_window() {
        let mut store = NullifierStore::new();
        store.insert_block(1, &[nf(1)]);
        store.insert_block(50, &[nf(2)]);
        store.purge(100, 10);
        assert!(store.check_no_conflict(&[nf(1)]).is_ok());
        assert!(store.check_no_conflict(&[nf(2)]).is_err());
    }

    #[test]
    fn remove_block_does_not_clear_entry_reinserted_at_another_height() {
        let mut store = NullifierStore::new();
        store.insert_block(10, &[nf(1)]);
        store.insert_block(20, &[nf(1)]);
        store.remove_block(10, &[nf(1)]);
        assert_eq!(store.first_seen_height(&nf(1)), Some(20));
    }
}
