//! # Domain-Tagged SHA3-256 Hashing
//!
//! Every hash the consensus core produces is tagged with a fixed ASCII
//! domain string before hashing, so the same byte layout hashed for two
//! different purposes (header identity vs. a nullifier vs. the u-draw)
//! never collides.
//!
//! `H(tag, body) = SHA3-256(tag_ascii || 0x00 || body)`

use sha3::{Digest, Sha3_256};

/// A 32-byte SHA3-256 digest.
pub type Hash = [u8; 32];

/// Header identity hash tag.
pub const TAG_HEADER: &str = "ANM-HEADER-V1";
/// Transaction sign-bytes tag.
pub const TAG_TX_SIGN: &str = "ANM-TX-SIGN-V1";
/// Receipt hash tag.
pub const TAG_RECEIPT: &str = "ANM-RECEIPT-V1";
/// Nonce-draw (u-draw) tag.
pub const TAG_NONCE: &str = "ANM-NONCE-V1";
/// Empty-Merkle-tree tag.
pub const TAG_MERKLE_EMPTY: &str = "ANM-MERKLE-EMPTY";

/// Nullifier tag prefix; the per-type tag is `"ANM-NULLIFIER-<T>-V1"`.
pub const NULLIFIER_TAG_PREFIX: &str = "ANM-NULLIFIER-";
pub const NULLIFIER_TAG_SUFFIX: &str = "-V1";

/// Build the nullifier domain tag for a proof type, e.g. `"HASH"` ->
/// `"ANM-NULLIFIER-HASH-V1"`.
pub fn nullifier_tag(type_tag: &str) -> String {
    format!("{NULLIFIER_TAG_PREFIX}{type_tag}{NULLIFIER_TAG_SUFFIX}")
}

/// Compute a domain-tagged SHA3-256 hash over a single body.
///
/// `tag` must be fixed ASCII with no embedded NUL; this is an internal
/// invariant of every call site in this crate, not user input.
pub fn domain_hash(tag: &str, body: &[u8]) -> Hash {
    debug_assert!(tag.is_ascii() && !tag.as_bytes().contains(&0));
    let mut hasher = Sha3_256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0x00]);
    hasher.update(body);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Compute a domain-tagged hash over multiple body segments without an
/// intermediate allocation.
pub fn domain_hash_many(tag: &str, segments: &[&[u8]]) -> Hash {
    debug_assert!(tag.is_ascii() && !tag.as_bytes().contains(&0));
    let mut hasher = Sha3_256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0x00]);
    for segment in segments {
        hasher.update(segment);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Merkle combiner: `H(a, b) = SHA3-256(0x01 || a || b)`.
pub fn merkle_combine(a: &Hash, b: &Hash) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update([0x01]);
    hasher.update(a);
    hasher.update(b);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// The hash of an empty Merkle tree.
pub fn merkle_empty_root() -> Hash {
    domain_hash(TAG_MERKLE_EMPTY, &[])
}

/// Fold a list of leaf hashes into a single Merkle root.
///
/// Odd counts at any level duplicate the last hash, per spec. Returns
/// [`merkle_empty_root`] for an empty leaf set.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return merkle_empty_root();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let combined = match pair {
                [a, b] => merkle_combine(a, b),
                [a] => merkle_combine(a, a),
                _ => unreachable!("chunks(2) never yields more than two elements"),
            };
            next.push(combined);
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_hash_is_deterministic() {
        let a = domain_hash(TAG_HEADER, b"payload");
        let b = domain_hash(TAG_HEADER, b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn different_tags_never_collide_on_same_body() {
        let a = domain_hash(TAG_HEADER, b"payload");
        let b = domain_hash(TAG_RECEIPT, b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn nullifier_tag_format() {
        assert_eq!(nullifier_tag("HASH"), "ANM-NULLIFIER-HASH-V1");
        assert_eq!(nullifier_tag("AI"), "ANM-NULLIFIER-AI-V1");
    }

    #[test]
    fn merkle_root_single_leaf_is_identity() {
        let leaf = domain_hash(TAG_HEADER, b"x");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn merkle_root_odd_count_duplicates_last() {
        let a = domain_hash(TAG_HEADER, b"a");
        let b = domain_hash(TAG_HEADER, b"b");
        let c = domain_hash(TAG_HEADER, b"c");

        let root = merkle_root(&[a, b, c]);
        let expected_top_right = merkle_combine(&c, &c);
        let expected = merkle_combine(&merkle_combine(&a, &b), &expected_top_right);
        assert_eq!(root, expected);
    }

    #[test]
    fn merkle_root_empty_is_empty_tag() {
        assert_eq!(merkle_root(&[]), merkle_empty_root());
    }
}
