//! Driving port (inbound API).

use crate::domain::{Block, ConsensusResult, Decision, Header, HeaderContext, ProofEnvelope, ProofKind, ProofMetrics, ScoreBreakdown};
use animica_crypto::Hash;
use async_trait::async_trait;
use std::time::Duration;

/// The consensus core's public surface.
///
/// `async_trait` for interface parity with how the teacher's node wires
/// subsystems together, even though every method here is CPU-bound and
/// synchronous-in-spirit — none of it awaits I/O.
#[async_trait]
pub trait ConsensusApi: Send + Sync {
    /// Structural and gate checks on a header in isolation: size cap,
    /// canonical encoding, known parent, timestamp skew.
    async fn validate_header(&self, header: &Header) -> ConsensusResult<()>;

    /// Verify one proof envelope against the active policy and pinned
    /// vendor roots, returning its metrics on success. `deadline`, if
    /// given, is a budget relative to the call itself; once it elapses
    /// the verifier returns `VerificationTimedOut` instead of running.
    async fn verify_proof(
        &self,
        ctx: HeaderContext<'_>,
        envelope: &ProofEnvelope,
        deadline: Option<Duration>,
    ) -> ConsensusResult<ProofMetrics>;

    /// Score an already-verified proof set without mutating any state.
    async fn score_block(
        &self,
        proofs: &[(ProofEnvelope, ProofMetrics)],
    ) -> ConsensusResult<ScoreBreakdown>;

    /// Full pipeline: validate, verify, score, decide, and — on
    /// `Accepted` — mutate chain state (nullifiers, fork choice, epoch
    /// accumulator). `deadline` bounds the whole proof-verification pass;
    /// a block whose proof set cannot be verified in time is rejected
    /// with `VerificationTimedOut` rather than left half-verified.
    async fn submit_block(&self, block: Block, deadline: Option<Duration>) -> ConsensusResult<Decision>;

    /// The current best tip's header hash.
    async fn tip(&self) -> Hash;

    /// The currently active acceptance threshold `Theta`.
    async fn get_theta(&self) -> u64;

    /// The currently active fairness multiplier `alpha` for one proof
    /// type.
    async fn get_alpha(&self, kind: ProofKind) -> ConsensusResult<u64>;
}
