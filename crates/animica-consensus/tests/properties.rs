//! Property-based checks over the scoring and acceptance pipeline.
//!
//! These exercise invariants that should hold for *any* well-formed input,
//! not just the hand-picked cases in the unit tests: canonical ordering
//! never changes the total awarded, adding evidence never lowers `Psi`,
//! and the accept/reject boundary is monotone in `H(u)`.

use animica_consensus::domain::codec::Writer;
use animica_consensus::domain::policy::Curve;
use animica_consensus::domain::{
    decide, score as score_header, Header, Policy, ProofEnvelope, ProofKind, ProofMetrics, Scorer,
    TypeParams,
};
use animica_crypto::FP_SCALE;
use animica_types::{Nullifier, PolicyRoot};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn test_policy() -> Policy {
    let mut types = BTreeMap::new();
    for (kind, beta, gamma_proof, gamma_type) in [
        (ProofKind::Hash, 10, 4, 4),
        (ProofKind::Ai, 1, 5, 5),
        (ProofKind::Qpu, 1, 5, 5),
        (ProofKind::Stor, 1, 3, 3),
        (ProofKind::Vdf, 1, 1_000, 1_000),
    ] {
        types.insert(
            kind,
            TypeParams {
                gamma_type,
                gamma_proof,
                beta,
                alpha_target_fp: FP_SCALE / 5,
                alpha_fp: FP_SCALE,
            },
        );
    }

    Policy {
        theta_target: 0,
        gamma_total: 1_000_000,
        types,
        alpha_min_fp: FP_SCALE / 10,
        alpha_max_fp: FP_SCALE * 3,
        rho_fp: FP_SCALE / 20,
        kappa_fp: FP_SCALE / 10,
        delta_plus: 5,
        delta_minus: 5,
        q_escort: 100, // effectively disabled for these property checks
        tau_escort_fp: FP_SCALE * 1_000,
        theta_share_ratio_fp: (FP_SCALE * 4) / 5,
        nullifier_window: 100,
        lambda_target_fp: FP_SCALE / 12,
        delta_t_min_secs: 1,
        delta_t_max_secs: 600,
        epoch_len: 100,
        max_reorg_depth: 10,
        max_timestamp_skew_secs: 120,
        g_traps: Curve { knots: vec![(0, 0), (FP_SCALE, FP_SCALE)] },
        r_redundancy: Curve { knots: vec![(0, 0), (FP_SCALE, FP_SCALE)] },
        storage_sigma_fp: FP_SCALE / 2,
        storage_retrieval_delta_fp: FP_SCALE / 10,
        chain_id: 1,
        nonce_domain_tag: "ANM-NONCE-V1".to_string(),
        hash_share_target: primitive_types::U256::MAX,
    }
}

fn vdf_proof(nullifier_byte: u8, t_seconds: u64) -> (ProofEnvelope, ProofMetrics) {
    let mut w = Writer::new();
    w.write_map_header(2).write_uint(0).write_uint(t_seconds).write_uint(1).write_bytes(&[0u8; 32]);
    let envelope = ProofEnvelope {
        type_id: ProofKind::Vdf.type_id(),
        body_cbor: w.into_bytes(),
        nullifier: Nullifier([nullifier_byte; 32]),
    };
    let metrics = ProofMetrics::Vdf(animica_consensus::domain::proof::VdfMetrics { t_seconds });
    (envelope, metrics)
}

fn sample_header(mix_seed: [u8; 32], theta: u64) -> Header {
    Header {
        parent_hash: [0u8; 32],
        height: 1,
        mix_seed,
        state_root: [0u8; 32],
        txs_root: [0u8; 32],
        proofs_root: [0u8; 32],
        da_root: [0u8; 32],
        receipts_root: [0u8; 32],
        theta,
        policy_root: PolicyRoot([0u8; 32]),
        alg_policy_root: [0u8; 32],
        nonce_domain_tag: "ANM-NONCE-V1".to_string(),
        coinbase: [0u8; 20],
        timestamp: 1,
    }
}

proptest! {
    /// The scorer sorts its input into canonical `(type_id, nullifier)`
    /// order internally, so the total it awards must not depend on the
    /// order the caller happened to pass proofs in.
    #[test]
    fn scoring_total_is_independent_of_input_order(
        mut t_seconds in prop::collection::vec(1u64..500, 1..8),
    ) {
        let policy = test_policy();
        let scorer = Scorer::new(&policy);

        let proofs: Vec<(ProofEnvelope, ProofMetrics)> = t_seconds
            .drain(..)
            .enumerate()
            .map(|(i, t)| vdf_proof(i as u8, t))
            .collect();

        let forward = scorer.score(&proofs).unwrap().psi_total;
        let mut reversed = proofs.clone();
        reversed.reverse();
        let backward = scorer.score(&reversed).unwrap().psi_total;

        prop_assert_eq!(forward, backward);
    }

    /// Adding one more verified proof to a set can never lower the
    /// block's total `Psi`: caps only ever clamp a running sum upward
    /// from where it already was, never claw back an earlier award.
    #[test]
    fn psi_is_monotone_under_adding_a_proof(
        mut t_seconds in prop::collection::vec(1u64..500, 0..6),
        extra in 1u64..500,
    ) {
        let policy = test_policy();
        let scorer = Scorer::new(&policy);

        let base: Vec<(ProofEnvelope, ProofMetrics)> = t_seconds
            .drain(..)
            .enumerate()
            .map(|(i, t)| vdf_proof(i as u8, t))
            .collect();
        let mut extended = base.clone();
        extended.push(vdf_proof(250, extra));

        let psi_base = scorer.score(&base).unwrap().psi_total;
        let psi_extended = scorer.score(&extended).unwrap().psi_total;

        prop_assert!(psi_extended >= psi_base);
    }

    /// `decide` is monotone in the score it is handed: holding `Psi` and
    /// `Theta` fixed, a strictly larger `H(u)` can never flip an accepted
    /// header into a rejected one, nor a share into a reject.
    #[test]
    fn decision_boundary_is_monotone_in_score(
        theta in 0u64..1_000_000,
        share_ratio_fp in 1u64..(FP_SCALE - 1),
        lower in 0u64..500_000,
        delta in 0u64..500_000,
    ) {
        let mut policy = test_policy();
        policy.theta_share_ratio_fp = share_ratio_fp;
        let header = sample_header([1u8; 32], theta);

        let higher = lower.saturating_add(delta);
        let breakdown_lower = animica_consensus::domain::ScoreBreakdown { psi_total: lower, ..Default::default() };
        let breakdown_higher = animica_consensus::domain::ScoreBreakdown { psi_total: higher, ..Default::default() };

        let result_lower = score_header(1, &header, breakdown_lower);
        let result_higher = score_header(1, &header, breakdown_higher);

        // Both draws share the same u, so s scales directly with psi_total.
        let rank = |s: u64| -> u8 {
            if s >= theta {
                2
            } else if s >= animica_crypto::mul_fp(theta, share_ratio_fp) {
                1
            } else {
                0
            }
        };

        let decision_lower = decide(&policy, header.hash(), &header, result_lower.clone());
        let decision_higher = decide(&policy, header.hash(), &header, result_higher.clone());

        prop_assert!(rank(result_higher.s) >= rank(result_lower.s));
        match (decision_lower, decision_higher) {
            (animica_consensus::Decision::Rejected(_), animica_consensus::Decision::Rejected(_)) => {}
            (animica_consensus::Decision::Rejected(_), _) => {}
            (animica_consensus::Decision::Share(_), animica_consensus::Decision::Share(_)) => {}
            (animica_consensus::Decision::Share(_), animica_consensus::Decision::Accepted(_)) => {}
            (animica_consensus::Decision::Accepted(_), animica_consensus::Decision::Accepted(_)) => {}
            other => prop_assert!(false, "decision rank decreased as score increased: {:?}", other_as_ranks(&other)),
        }
    }
}

fn other_as_ranks(_other: &(animica_consensus::Decision, animica_consensus::Decision)) -> &'static str {
    "accepted/share/rejected ordering violated"
}
