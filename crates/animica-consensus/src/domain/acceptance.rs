//! The u-draw, the block score `S = H(u) + Psi`, and the three-way
//! accept / share / reject decision.

use crate::domain::error::ConsensusError;
use crate::domain::header::Header;
use crate::domain::policy::Policy;
use crate::domain::scorer::ScoreBreakdown;
use animica_crypto::hashing::TAG_NONCE;
use animica_crypto::{domain_hash_many, ln_fp_pow2, ln_fp_u256, mul_fp, Hash};
use primitive_types::U256;

/// `N`, the u-draw digest interpreted as a 256-bit unsigned integer, plus
/// its derived `H(u)` in micro-nats.
#[derive(Debug, Clone, Copy)]
pub struct UDraw {
    pub n: U256,
    pub h_u: u64,
}

/// Compute the u-draw for a header: `digest = SHA3-256("ANM-NONCE-V1" ||
/// 0x00 || chain_id || header_view_cbor)`, `u = (N+1)/2^256`, `H(u) =
/// -ln(u)`.
///
/// `ln(2^256)` cannot be evaluated by constructing `2^256` as a [`U256`]
/// (it overflows by one bit), so it is computed directly via
/// [`animica_crypto::ln_fp_pow2`] and the `N+1` term handles its own
/// overflow (`N == U256::MAX` implies `N+1 == 2^256`, i.e. `u == 1`,
/// `H(u) == 0`).
pub fn u_draw(chain_id: u32, header: &Header) -> UDraw {
    let digest: Hash = domain_hash_many(TAG_NONCE, &[&chain_id.to_be_bytes(), &header.encode_canonical()]);
    let n = U256::from_big_endian(&digest);

    let ln_n_plus_one = match n.checked_add(U256::one()) {
        Some(n_plus_one) => ln_fp_u256(n_plus_one),
        None => ln_fp_pow2(256),
    };
    let h_u = (ln_fp_pow2(256) - ln_n_plus_one).max(0) as u64;

    UDraw { n, h_u }
}

/// The accounted outcome of scoring a validated header against its proof
/// set: `S`, `H(u)`, `Psi`, and the full per-proof breakdown.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub s: u64,
    pub h_u: u64,
    pub psi: u64,
    pub breakdown: ScoreBreakdown,
}

pub fn score(chain_id: u32, header: &Header, breakdown: ScoreBreakdown) -> ScoreResult {
    let draw = u_draw(chain_id, header);
    let s = draw.h_u.saturating_add(breakdown.psi_total);
    ScoreResult {
        s,
        h_u: draw.h_u,
        psi: breakdown.psi_total,
        breakdown,
    }
}

/// A successfully chain-extending block.
#[derive(Debug, Clone)]
pub struct AcceptedBlock {
    pub header_hash: Hash,
    pub result: ScoreResult,
}

/// A sub-threshold but above-micro-target submission: surfaced to the
/// rewards collaborator, never mutates chain state or fork choice.
#[derive(Debug, Clone)]
pub struct ShareReceipt {
    pub header_hash: Hash,
    pub result: ScoreResult,
}

/// Three-way acceptance decision given an already-scored header.
pub enum Decision {
    Accepted(AcceptedBlock),
    Share(ShareReceipt),
    Rejected(ConsensusError),
}

/// Apply `S >= Theta` / `S >= theta_share_ratio * Theta` / reject, per
/// `spec.md` §4.4. `header.theta` is the block's claimed threshold; the
/// caller is responsible for having already checked it against the core's
/// own retargeted `Theta` for this height.
pub fn decide(policy: &Policy, header_hash: Hash, header: &Header, result: ScoreResult) -> Decision {
    if result.s >= header.theta {
        return Decision::Accepted(AcceptedBlock { header_hash, result });
    }
    let share_threshold = mul_fp(header.theta, policy.theta_share_ratio_fp);
    if result.s >= share_threshold {
        return Decision::Share(ShareReceipt { header_hash, result });
    }
    Decision::Rejected(ConsensusError::BelowThreshold { score: result.s, theta: header.theta })
}
