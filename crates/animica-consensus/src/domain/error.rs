//! Error taxonomy for the consensus core.

use animica_types::Hash;

/// Every failure mode the core can report. Side-effect free: whichever
/// variant is returned, no state mutation has occurred on that call.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("non-canonical encoding: {0}")]
    MalformedEncoding(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unknown policy root: {0:?}")]
    UnknownPolicy(Hash),

    #[error("attestation verification failed: {0}")]
    BadAttestation(String),

    #[error("attestation expired")]
    ExpiredAttestation,

    #[error("unknown proof algorithm id: {0}")]
    UnknownAlgorithm(u64),

    #[error("malformed proof body: {0}")]
    MalformedBody(String),

    #[error("nullifier mismatch: envelope claims {claimed:?}, derived {derived:?}")]
    NullifierMismatch { claimed: Hash, derived: Hash },

    #[error("nullifier already used at height {first_seen_height}: {nullifier:?}")]
    NullifierReuse {
        nullifier: Hash,
        first_seen_height: u64,
    },

    #[error("hash share below configured share target")]
    BelowShareTarget,

    #[error("score {score} below acceptance threshold {theta}")]
    BelowThreshold { score: u64, theta: u64 },

    #[error("escort violation: psi {psi} exceeds tau_escort*gamma_total with only {distinct_types} distinct proof type(s), need {required}")]
    EscortViolation {
        psi: u64,
        distinct_types: usize,
        required: usize,
    },

    #[error("reorg depth {depth} exceeds max_reorg_depth {max_depth}")]
    ReorgTooDeep { depth: u64, max_depth: u64 },

    #[error("proof verification exceeded its deadline")]
    VerificationTimedOut,

    #[error("parent block {0:?} not found")]
    UnknownParent(Hash),
}

/// Result alias used throughout the core.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
