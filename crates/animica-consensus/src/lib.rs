//! # Animica Consensus — PoIES Core
//!
//! Proof-of-Integrated-Evidence-of-Score: blocks are accepted by drawing a
//! per-header random value `u`, converting it to a surprisal `H(u)`, and
//! adding a bounded evidence score `Psi` extracted from independently
//! verified proofs (hash shares, AI/QPU attestations, storage seals, VDF
//! outputs). A block is accepted once `S = H(u) + Psi` clears the
//! policy's acceptance threshold `Theta`.
//!
//! ## Architecture
//!
//! Hexagonal: [`domain`] holds every pure rule (codec, scoring,
//! acceptance, retargeting, fork choice) with no I/O; [`ports`] declares
//! the driving ([`ports::ConsensusApi`]) and driven
//! ([`ports::AttestationRoots`], [`ports::Clock`]) trait boundaries; and
//! [`service::ConsensusService`] wires them together, owning the one
//! mutable state the core carries across blocks.
//!
//! ## Determinism
//!
//! No floating point, no wall-clock reads outside timestamp-skew gating,
//! no non-canonical byte layouts accepted anywhere on the wire. Given the
//! same `(policy_root, genesis_header, ordered block stream)`, two nodes
//! compute bit-identical state.

pub mod domain;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

pub use domain::{
    Block, ConsensusError, ConsensusResult, Decision, Header, HeaderContext, Policy, ProofEnvelope,
    ProofKind, ProofMetrics, ScoreBreakdown,
};
pub use events::TipChanged;
pub use ports::{AttestationRoots, Clock, ConsensusApi, SystemClock};
pub use service::ConsensusService;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theta_target_is_reachable_from_a_validated_policy() {
        let policy = domain::policy::fixtures::test_policy();
        assert!(policy.validate().is_ok());
        assert!(policy.theta_target > 0);
    }
}
