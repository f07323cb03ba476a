//! Weight-aware block DAG and tip selection.
//!
//! Mirrors the teacher's `LMDGhostStore` data shape (`blocks`/`children`
//! maps plus a cached per-block weight) but keys weight on cumulative
//! accepted `S` instead of validator stake votes, and share receipts never
//! enter this structure at all (ratified in `SPEC_FULL.md` §9 Open
//! Question 3).

use crate::domain::error::{ConsensusError, ConsensusResult};
use animica_crypto::Hash;
use animica_types::Nullifier;
use std::collections::HashMap;

/// One accepted block's position in the DAG plus its cached cumulative
/// weight (`own S` + `cumWeight(parent)`). Carries its own nullifier set
/// so a later reorg can diff two chains without consulting anything
/// outside this structure.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub parent: Hash,
    pub height: u64,
    pub own_weight: u64,
    pub cum_weight: u64,
    pub nullifiers: Vec<Nullifier>,
}

/// One block's worth of nullifiers, on either side of a reorg's
/// divergence point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullifierDelta {
    pub block_hash: Hash,
    pub height: u64,
    pub nullifiers: Vec<Nullifier>,
}

/// Emitted whenever `best_tip()` would return a different hash than it
/// did before the most recent `insert`. `abandoned`/`adopted` carry the
/// nullifier deltas the caller must apply atomically alongside the tip
/// flip: abandoned blocks' nullifiers are released, adopted blocks'
/// nullifiers become active. Both are ordered oldest-block-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipChanged {
    pub old_tip: Option<Hash>,
    pub new_tip: Hash,
    pub new_height: u64,
    pub abandoned: Vec<NullifierDelta>,
    pub adopted: Vec<NullifierDelta>,
}

/// Weight-aware fork-choice store: every accepted block is inserted once,
/// tip selection is cumulative-weight-greatest with a deterministic
/// tie-break, and reorgs are bounded by `max_reorg_depth`.
pub struct ForkChoice {
    blocks: HashMap<Hash, BlockNode>,
    children: HashMap<Hash, Vec<Hash>>,
    genesis: Hash,
    tip: Hash,
    max_reorg_depth: u64,
}

impl ForkChoice {
    pub fn new(genesis: Hash, max_reorg_depth: u64) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(
            genesis,
            BlockNode { parent: genesis, height: 0, own_weight: 0, cum_weight: 0, nullifiers: Vec::new() },
        );
        Self { blocks, children: HashMap::new(), genesis, tip: genesis, max_reorg_depth }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn node(&self, hash: &Hash) -> Option<&BlockNode> {
        self.blocks.get(hash)
    }

    /// Insert a newly accepted block, extending `parent`, with its own
    /// `S` as weight and the nullifiers its proofs spent. Returns
    /// `Some(TipChanged)` if the best tip changed as a result, carrying
    /// the nullifier deltas of every block abandoned/adopted between the
    /// old and new tip. Rejects a reorg that would unwind further than
    /// `max_reorg_depth` blocks from the current tip.
    pub fn insert(
        &mut self,
        hash: Hash,
        parent: Hash,
        height: u64,
        own_weight: u64,
        nullifiers: Vec<Nullifier>,
    ) -> ConsensusResult<Option<TipChanged>> {
        let parent_node = self.blocks.get(&parent).ok_or(ConsensusError::UnknownParent(parent))?;
        let cum_weight = parent_node.cum_weight.saturating_add(own_weight);

        self.blocks.insert(hash, BlockNode { parent, height, own_weight, cum_weight, nullifiers });
        self.children.entry(parent).or_default().push(hash);

        let candidate = self.best_tip();
        if candidate == self.tip {
            return Ok(None);
        }

        let depth = self.reorg_depth(self.tip, candidate);
        if depth > self.max_reorg_depth {
            // Undo the insert: this block is valid but cannot become the
            // active tip without violating the reorg-depth bound. It
            // stays in the DAG as a known side branch.
            return Err(ConsensusError::ReorgTooDeep { depth, max_depth: self.max_reorg_depth });
        }

        let old_tip = self.tip;
        let ancestor = self.common_ancestor(old_tip, candidate);
        let abandoned = self.path_to_ancestor(old_tip, ancestor);
        let mut adopted = self.path_to_ancestor(candidate, ancestor);
        adopted.reverse(); // oldest-adopted-block-first, mirroring `abandoned`'s tip-first order inverted

        self.tip = candidate;
        let new_height = self.blocks[&candidate].height;
        Ok(Some(TipChanged {
            old_tip: Some(old_tip),
            new_tip: candidate,
            new_height,
            abandoned,
            adopted,
        }))
    }

    /// Walk every known leaf-reachable block and return the one with
    /// greatest `cumWeight`, breaking ties by lower hash then by greater
    /// height.
    fn best_tip(&self) -> Hash {
        self.blocks
            .iter()
            .max_by(|(hash_a, node_a), (hash_b, node_b)| {
                node_a
                    .cum_weight
                    .cmp(&node_b.cum_weight)
                    .then_with(|| hash_b.cmp(hash_a)) // lower hash wins => reverse cmp
                    .then_with(|| node_a.height.cmp(&node_b.height))
            })
            .map(|(hash, _)| *hash)
            .unwrap_or(self.genesis)
    }

    /// Number of blocks on the current tip's chain that are not ancestors
    /// of `candidate` — i.e. how many blocks a reorg to `candidate` would
    /// unwind.
    fn reorg_depth(&self, from: Hash, to: Hash) -> u64 {
        let ancestors_of_to = self.ancestor_set(to);
        let mut depth = 0u64;
        let mut cursor = from;
        while cursor != self.genesis && !ancestors_of_to.contains(&cursor) {
            depth += 1;
            cursor = match self.blocks.get(&cursor) {
                Some(node) => node.parent,
                None => break,
            };
        }
        depth
    }

    /// The first hash common to both `a`'s and `b`'s ancestry, i.e. the
    /// point a reorg between them diverges from.
    fn common_ancestor(&self, a: Hash, b: Hash) -> Hash {
        let ancestors_of_b = self.ancestor_set(b);
        let mut cursor = a;
        loop {
            if ancestors_of_b.contains(&cursor) {
                return cursor;
            }
            match self.blocks.get(&cursor) {
                Some(node) => cursor = node.parent,
                None => return self.genesis,
            }
        }
    }

    /// The nullifier deltas for every block from `from` up to (but not
    /// including) `ancestor`, nearest-to-`from` first.
    fn path_to_ancestor(&self, mut cursor: Hash, ancestor: Hash) -> Vec<NullifierDelta> {
        let mut path = Vec::new();
        while cursor != ancestor {
            let node = match self.blocks.get(&cursor) {
                Some(node) => node,
                None => break,
            };
            path.push(NullifierDelta {
                block_hash: cursor,
                height: node.height,
                nullifiers: node.nullifiers.clone(),
            });
            cursor = node.parent;
        }
        path
    }

    fn ancestor_set(&self, mut cursor: Hash) -> std::collections::HashSet<Hash> {
        let mut set = std::collections::HashSet::new();
        set.insert(cursor);
        while cursor != self.genesis {
            match self.blocks.get(&cursor) {
                Some(node) => {
                    cursor = node.parent;
                    set.insert(cursor);
                }
                None => break,
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> Hash {
        [b; 32]
    }

    fn nf(b: u8) -> Vec<Nullifier> {
        vec![Nullifier([b; 32])]
    }

    #[test]
    fn genesis_is_the_initial_tip() {
        let fc = ForkChoice::new(h(0), 10);
        assert_eq!(fc.tip(), h(0));
    }

    #[test]
    fn single_child_becomes_tip() {
        let mut fc = ForkChoice::new(h(0), 10);
        let event = fc.insert(h(1), h(0), 1, 5, nf(1)).unwrap();
        assert_eq!(fc.tip(), h(1));
        let event = event.unwrap();
        assert_eq!(event.new_tip, h(1));
        assert!(event.abandoned.is_empty());
        assert_eq!(event.adopted.len(), 1);
        assert_eq!(event.adopted[0].block_hash, h(1));
        assert_eq!(event.adopted[0].nullifiers, nf(1));
    }

    #[test]
    fn higher_cumulative_weight_wins_over_longer_chain() {
        let mut fc = ForkChoice::new(h(0), 10);
        fc.insert(h(1), h(0), 1, 3, nf(1)).unwrap();
        fc.insert(h(2), h(1), 2, 3, nf(2)).unwrap(); // chain A: cumWeight 6, height 2
        fc.insert(h(9), h(0), 1, 100, nf(9)).unwrap(); // chain B: cumWeight 100, height 1
        assert_eq!(fc.tip(), h(9));
    }

    #[test]
    fn tie_breaks_on_lower_hash() {
        let mut fc = ForkChoice::new(h(0), 10);
        fc.insert(h(5), h(0), 1, 10, nf(5)).unwrap();
        let event = fc.insert(h(3), h(0), 1, 10, nf(3)).unwrap();
        // Equal weight, equal height: [3;32] < [5;32] so h(3) should win.
        assert_eq!(fc.tip(), h(3));
        assert!(event.is_some());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut fc = ForkChoice::new(h(0), 10);
        let err = fc.insert(h(1), h(99), 1, 5, nf(1)).unwrap_err();
        assert!(matches!(err, ConsensusError::UnknownParent(_)));
    }

    #[test]
    fn reorg_within_bound_succeeds() {
        let mut fc = ForkChoice::new(h(0), 2);
        fc.insert(h(1), h(0), 1, 10, nf(1)).unwrap();
        fc.insert(h(2), h(1), 2, 10, nf(2)).unwrap();
        // Side branch directly off genesis with enough weight to win;
        // reorg depth from h(2) back to genesis is 2, within bound.
        let event = fc.insert(h(9), h(0), 1, 25, nf(9)).unwrap().unwrap();
        assert_eq!(fc.tip(), h(9));
        // h(1) and h(2) are abandoned; h(9) is adopted.
        let abandoned_hashes: Vec<Hash> = event.abandoned.iter().map(|d| d.block_hash).collect();
        assert_eq!(abandoned_hashes, vec![h(2), h(1)]);
        assert_eq!(event.adopted.len(), 1);
        assert_eq!(event.adopted[0].block_hash, h(9));
    }

    #[test]
    fn reorg_deeper_than_bound_is_rejected() {
        let mut fc = ForkChoice::new(h(0), 1);
        fc.insert(h(1), h(0), 1, 10, nf(1)).unwrap();
        fc.insert(h(2), h(1), 2, 10, nf(2)).unwrap();
        fc.insert(h(3), h(2), 3, 10, nf(3)).unwrap();
        // Reorg back to a branch off genesis would unwind 3 blocks, but
        // max_reorg_depth is 1.
        let err = fc.insert(h(9), h(0), 1, 1000, nf(9)).unwrap_err();
        assert!(matches!(err, ConsensusError::ReorgTooDeep { .. }));
        assert_eq!(fc.tip(), h(3)); // tip unchanged
    }

    #[test]
    fn extending_the_current_tip_is_never_a_reorg() {
        let mut fc = ForkChoice::new(h(0), 0);
        fc.insert(h(1), h(0), 1, 10, nf(1)).unwrap();
        let event = fc.insert(h(2), h(1), 2, 10, nf(2)).unwrap().unwrap();
        assert_eq!(fc.tip(), h(2));
        assert!(event.abandoned.is_empty());
        assert_eq!(event.adopted.len(), 1);
        assert_eq!(event.adopted[0].block_hash, h(2));
    }
}
