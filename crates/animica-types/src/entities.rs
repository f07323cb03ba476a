//! # Core Primitive Types
//!
//! Hash/address/identifier primitives shared between the consensus core and
//! its collaborators (codec, proof verification, block packer, P2P). Kept
//! deliberately small: this crate is not the place for chain-execution
//! types (accounts, transactions) since those belong to the out-of-scope
//! VM/state collaborator.

use serde::{Deserialize, Serialize};

/// A 32-byte SHA3-256 digest.
pub type Hash = [u8; 32];

/// A 20-byte account/coinbase address.
pub type Address = [u8; 20];

/// Unique identifier for the network a header was produced for.
///
/// Bound into every domain tag so a header valid on one chain can never be
/// replayed as valid on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u32);

impl ChainId {
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// 32-byte digest of the active PoIES policy, included in every header.
///
/// All nodes must load the same `Policy` bytes for a given root; loading a
/// policy whose hash disagrees with a header's claimed root is a protocol
/// violation (`UnknownPolicy`), not a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRoot(pub Hash);

impl PolicyRoot {
    pub const ZERO: PolicyRoot = PolicyRoot([0u8; 32]);
}

/// A one-shot proof identifier, domain-separated per proof type and bound
/// to the header it was submitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(pub Hash);

/// Micro-nat: the integer fixed-point unit used throughout the scoring
/// pipeline (`beta`, `gamma`, `alpha` scaling, `H(u)`, `psi`, `Theta`).
///
/// Saturating on overflow rather than panicking or wrapping: caps and sums
/// are bounded by policy in well-formed operation, but an adversarial proof
/// multiset must never be able to panic the core or wrap a running total
/// past zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct MicroNat(pub u64);

impl MicroNat {
    pub const ZERO: MicroNat = MicroNat(0);

    pub fn new(value: u64) -> Self {
        MicroNat(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, other: MicroNat) -> MicroNat {
        MicroNat(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: MicroNat) -> MicroNat {
        MicroNat(self.0.saturating_sub(other.0))
    }

    pub fn saturating_mul(self, other: MicroNat) -> MicroNat {
        MicroNat(self.0.saturating_mul(other.0))
    }

    pub fn min(self, other: MicroNat) -> MicroNat {
        MicroNat(self.0.min(other.0))
    }
}

impl std::fmt::Display for MicroNat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micro_nat_saturates_on_overflow() {
        let a = MicroNat::new(u64::MAX);
        let b = MicroNat::new(10);
        assert_eq!(a.saturating_add(b), MicroNat::new(u64::MAX));
    }

    #[test]
    fn micro_nat_saturates_on_underflow() {
        let a = MicroNat::new(5);
        let b = MicroNat::new(10);
        assert_eq!(a.saturating_sub(b), MicroNat::ZERO);
    }
}
