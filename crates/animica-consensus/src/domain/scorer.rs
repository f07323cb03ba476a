//! Maps verified [`ProofMetrics`] to a non-negative integer `psi` in
//! micro-nats, applies `alpha`, and enforces the per-proof / per-type /
//! global caps plus the diversity (escort) rule.
//!
//! Every quantity here shares the integer scale produced by
//! `animica_crypto::ln_fp`/`pow_fp` (a plain `u64` `v` represents the real
//! number `v / FP_SCALE`); `beta[T]` is a dimensionless multiplier applied
//! directly, not itself fixed-point scaled, matching `spec.md`'s worked
//! examples (`beta_hash = 10`, not `10 * FP_SCALE`).

use crate::domain::error::{ConsensusError, ConsensusResult};
use crate::domain::policy::Policy;
use crate::domain::proof::{ProofEnvelope, ProofKind, ProofMetrics};
use animica_crypto::{ln_fp, mul_fp, pow_fp, FP_SCALE};
use animica_types::Nullifier;
use std::collections::{BTreeMap, BTreeSet};

/// One proof's contribution after every cap has been applied.
#[derive(Debug, Clone)]
pub struct ScoredProof {
    pub kind: ProofKind,
    pub nullifier: Nullifier,
    pub psi_raw: u64,
    pub psi_taken: u64,
}

/// The full accounting for a block's evidence score, returned to the
/// caller of `score_block` regardless of whether the block is ultimately
/// accepted.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub psi_total: u64,
    pub per_type: BTreeMap<ProofKind, u64>,
    pub per_proof: Vec<ScoredProof>,
    pub contributing_types: BTreeSet<ProofKind>,
}

pub struct Scorer<'a> {
    policy: &'a Policy,
}

impl<'a> Scorer<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// Pre-cap, pre-alpha raw score for a single proof's metrics.
    fn psi_raw(&self, metrics: &ProofMetrics) -> ConsensusResult<u64> {
        let kind = metrics.kind();
        let params = self.policy.types.get(&kind).ok_or_else(|| {
            ConsensusError::MalformedBody(format!("policy has no type params for {kind:?}"))
        })?;
        let beta = params.beta;

        let raw = match metrics {
            ProofMetrics::Hash(m) => {
                // d_ratio >= FP_SCALE (i.e. >= 1) is a verifier invariant;
                // ln_fp is therefore never negative here.
                let ln_d = ln_fp(m.d_ratio_fp.max(FP_SCALE)).max(0) as u64;
                beta.saturating_mul(ln_d)
            }
            ProofMetrics::Ai(m) => {
                let g = self.policy.g_traps.eval(m.traps_ratio_fp);
                let r = self.policy.r_redundancy.eval(m.redundancy.saturating_mul(FP_SCALE));
                let base = beta.saturating_mul(m.ai_units);
                let scaled = mul_fp(base, m.qos_fp);
                let scaled = mul_fp(scaled, g);
                mul_fp(scaled, r)
            }
            ProofMetrics::Qpu(m) => {
                let g = self.policy.g_traps.eval(m.traps_ratio_fp);
                let base = beta.saturating_mul(m.quantum_units);
                let scaled = mul_fp(base, m.qos_fp);
                mul_fp(scaled, g)
            }
            ProofMetrics::Stor(m) => {
                let sealed_bytes_fp = (m.sealed_bytes as u128 * FP_SCALE as u128)
                    .min(u64::MAX as u128) as u64;
                let curve = pow_fp(sealed_bytes_fp.max(1), self.policy.storage_sigma_fp);
                let base = beta.saturating_mul(curve);
                let scaled = mul_fp(base, m.uptime_qos_fp);
                let bonus_multiplier = if m.retrieval_bonus {
                    FP_SCALE.saturating_add(self.policy.storage_retrieval_delta_fp)
                } else {
                    FP_SCALE
                };
                mul_fp(scaled, bonus_multiplier)
            }
            ProofMetrics::Vdf(m) => beta.saturating_mul(m.t_seconds),
        };

        Ok(raw)
    }

    /// Score a verified, nullifier-checked proof set.
    ///
    /// `proofs` must already be verified (one [`ProofMetrics`] per
    /// envelope); this function sorts them into the mandatory
    /// `(type_id, nullifier)` order itself, so callers may pass them in
    /// whatever order they were verified (e.g. out of a parallel worker
    /// pool).
    pub fn score(
        &self,
        proofs: &[(ProofEnvelope, ProofMetrics)],
    ) -> ConsensusResult<ScoreBreakdown> {
        let mut ordered: Vec<&(ProofEnvelope, ProofMetrics)> = proofs.iter().collect();
        ordered.sort_by(|(a, _), (b, _)| {
            a.type_id.cmp(&b.type_id).then_with(|| a.nullifier.0.cmp(&b.nullifier.0))
        });

        let mut breakdown = ScoreBreakdown::default();

        for (envelope, metrics) in ordered {
            let kind = metrics.kind();
            let params = self.policy.types.get(&kind).ok_or_else(|| {
                ConsensusError::MalformedBody(format!("policy has no type params for {kind:?}"))
            })?;

            let psi_raw = self.psi_raw(metrics)?;
            let psi_adj = mul_fp(psi_raw, params.alpha_fp);
            let proof_capped = psi_adj.min(params.gamma_proof);

            let type_sum_so_far = *breakdown.per_type.get(&kind).unwrap_or(&0);
            let type_budget = params.gamma_type.saturating_sub(type_sum_so_far);
            let type_take = proof_capped.min(type_budget);

            let global_budget = self.policy.gamma_total.saturating_sub(breakdown.psi_total);
            let final_take = type_take.min(global_budget);

            *breakdown.per_type.entry(kind).or_insert(0) += final_take;
            breakdown.psi_total += final_take;
            if final_take > 0 {
                breakdown.contributing_types.insert(kind);
            }
            breakdown.per_proof.push(ScoredProof {
                kind,
                nullifier: envelope.nullifier,
                psi_raw,
                psi_taken: final_take,
            });
        }

        let escort_threshold = mul_fp(self.policy.gamma_total, self.policy.tau_escort_fp);
        if breakdown.psi_total > escort_threshold
            && breakdown.contributing_types.len() < self.policy.q_escort
        {
            return Err(ConsensusError::EscortViolation {
                psi: breakdown.psi_total,
                distinct_types: breakdown.contributing_types.len(),
                required: self.policy.q_escort,
            });
        }

        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::fixtures::test_policy;
    use crate::domain::proof::{HashMetrics, VdfMetrics};
    use animica_types::Nullifier;

    fn envelope(kind: ProofKind, nullifier_byte: u8) -> ProofEnvelope {
        ProofEnvelope {
            type_id: kind.type_id(),
            body_cbor: vec![],
            nullifier: Nullifier([nullifier_byte; 32]),
        }
    }

    #[test]
    fn no_proofs_yields_zero_psi() {
        let policy = test_policy();
        let scorer = Scorer::new(&policy);
        let breakdown = scorer.score(&[]).unwrap();
        assert_eq!(breakdown.psi_total, 0);
        assert!(breakdown.contributing_types.is_empty());
    }

    #[test]
    fn d_ratio_of_one_contributes_zero() {
        let policy = test_policy();
        let scorer = Scorer::new(&policy);
        let metrics = ProofMetrics::Hash(HashMetrics { d_ratio_fp: FP_SCALE });
        let proofs = vec![(envelope(ProofKind::Hash, 1), metrics)];
        let breakdown = scorer.score(&proofs).unwrap();
        assert_eq!(breakdown.psi_total, 0);
    }

    #[test]
    fn per_proof_cap_is_enforced() {
        let mut policy = test_policy();
        policy.types.get_mut(&ProofKind::Vdf).unwrap().gamma_proof = 3;
        policy.types.get_mut(&ProofKind::Vdf).unwrap().gamma_type = 100;
        policy.gamma_total = 100;
        let scorer = Scorer::new(&policy);

        let metrics = ProofMetrics::Vdf(VdfMetrics { t_seconds: 1000 });
        let proofs = vec![(envelope(ProofKind::Vdf, 1), metrics)];
        let breakdown = scorer.score(&proofs).unwrap();
        assert_eq!(breakdown.psi_total, 3);
    }

    #[test]
    fn per_type_cap_is_enforced_across_multiple_proofs() {
        let mut policy = test_policy();
        policy.types.get_mut(&ProofKind::Vdf).unwrap().gamma_proof = 100;
        policy.types.get_mut(&ProofKind::Vdf).unwrap().gamma_type = 5;
        policy.gamma_total = 100;
        let scorer = Scorer::new(&policy);

        let metrics = |t| ProofMetrics::Vdf(VdfMetrics { t_seconds: t });
        let proofs = vec![
            (envelope(ProofKind::Vdf, 1), metrics(3)),
            (envelope(ProofKind::Vdf, 2), metrics(3)),
        ];
        let breakdown = scorer.score(&proofs).unwrap();
        assert_eq!(breakdown.psi_total, 5);
        assert_eq!(*breakdown.per_type.get(&ProofKind::Vdf).unwrap(), 5);
    }

    #[test]
    fn global_cap_saturates_the_last_proof_taken() {
        let mut policy = test_policy();
        for params in policy.types.values_mut() {
            params.gamma_proof = 100;
            params.gamma_type = 100;
        }
        policy.gamma_total = 4;
        let scorer = Scorer::new(&policy);

        let metrics = |t| ProofMetrics::Vdf(VdfMetrics { t_seconds: t });
        let proofs = vec![
            (envelope(ProofKind::Vdf, 1), metrics(3)),
            (envelope(ProofKind::Vdf, 2), metrics(3)),
        ];
        let breakdown = scorer.score(&proofs).unwrap();
        assert_eq!(breakdown.psi_total, 4);
    }

    #[test]
    fn escort_violation_rejects_the_whole_block() {
        let mut policy = test_policy();
        for params in policy.types.values_mut() {
            params.gamma_proof = 100;
            params.gamma_type = 100;
        }
        policy.gamma_total = 10;
        policy.tau_escort_fp = FP_SCALE / 2; // threshold 5
        policy.q_escort = 3;
        let scorer = Scorer::new(&policy);

        let metrics = |t| ProofMetrics::Vdf(VdfMetrics { t_seconds: t });
        let proofs = vec![(envelope(ProofKind::Vdf, 1), metrics(8))];
        let err = scorer.score(&proofs).unwrap_err();
        assert!(matches!(err, ConsensusError::EscortViolation { .. }));
    }

    #[test]
    fn enough_distinct_types_avoids_escort_violation() {
        let mut policy = test_policy();
        for params in policy.types.values_mut() {
            params.gamma_proof = 100;
            params.gamma_type = 100;
        }
        policy.gamma_total = 10;
        policy.tau_escort_fp = FP_SCALE / 2; // threshold 5
        policy.q_escort = 3;
        let scorer = Scorer::new(&policy);

        let proofs = vec![
            (envelope(ProofKind::Vdf, 1), ProofMetrics::Vdf(VdfMetrics { t_seconds: 3 })),
            (
                envelope(ProofKind::Hash, 2),
                ProofMetrics::Hash(HashMetrics { d_ratio_fp: 2 * FP_SCALE }),
            ),
            (
                envelope(ProofKind::Qpu, 3),
                ProofMetrics::Qpu(crate::domain::proof::QpuMetrics {
                    quantum_units: 3,
                    qos_fp: FP_SCALE,
                    traps_ratio_fp: FP_SCALE,
                }),
            ),
        ];
        let breakdown = scorer.score(&proofs).unwrap();
        assert!(breakdown.contributing_types.len() >= 3);
    }

    #[test]
    fn monotonicity_adding_a_proof_never_decreases_psi() {
        let mut policy = test_policy();
        for params in policy.types.values_mut() {
            params.gamma_proof = 100;
            params.gamma_type = 100;
        }
        policy.gamma_total = 1000;
        let scorer = Scorer::new(&policy);

        let base = vec![(
            envelope(ProofKind::Vdf, 1),
            ProofMetrics::Vdf(VdfMetrics { t_seconds: 5 }),
        )];
        let with_extra = {
            let mut v = base.clone();
            v.push((envelope(ProofKind::Vdf, 2), ProofMetrics::Vdf(VdfMetrics { t_seconds: 7 })));
            v
        };

        let psi_base = scorer.score(&base).unwrap().psi_total;
        let psi_extra = scorer.score(&with_extra).unwrap().psi_total;
        assert!(psi_extra >= psi_base);
    }
}
