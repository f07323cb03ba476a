//! The PoIES policy bundle: every tunable consensus parameter, including
//! the tabulated curves that would otherwise be "invented" constants.
//!
//! A `Policy` is loaded once per `policy_root` and treated as immutable
//! for the lifetime of that root — mirroring the teacher's "load once into
//! an immutable value owned by the core" guidance for vendor roots and
//! configuration (see `DESIGN.md`).

use crate::domain::error::ConsensusError;
use crate::domain::proof::ProofKind;
use animica_crypto::{domain_hash, FP_SCALE};
use animica_types::PolicyRoot;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-proof-type caps and conversion constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParams {
    /// Per-type running-sum cap, in micro-nats.
    pub gamma_type: u64,
    /// Per-proof cap, in micro-nats.
    pub gamma_proof: u64,
    /// Metric -> micro-nat conversion constant.
    pub beta: u64,
    /// Fairness multiplier bounds are shared across types (`alpha_bounds`
    /// in `Policy`); the per-type *target* mix fraction is stored here.
    pub alpha_target_fp: u64,
    /// Current fairness multiplier, fixed-point (scaled by `FP_SCALE`).
    pub alpha_fp: u64,
}

/// A monotonic piecewise-linear lookup table: `(x_fp, y_fp)` knots sorted
/// by `x_fp`, both scaled by [`FP_SCALE`].
///
/// Used for `g(traps_ratio)` (convex below a policy-chosen target ratio,
/// flat above it) and `r(redundancy)` (`min(k, r_max)^rho` as a tabulated
/// curve). Per the open question in the source material, these shapes are
/// not given machine-readable values upstream; this implementation fixes
/// them as policy-carried data so they are hashed into `policy_root`
/// rather than hard-coded in the binary (see `DESIGN.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curve {
    pub knots: Vec<(u64, u64)>,
}

impl Curve {
    /// Evaluate the curve at `x_fp` via linear interpolation; clamps to
    /// the first/last knot outside the table's domain.
    pub fn eval(&self, x_fp: u64) -> u64 {
        if self.knots.is_empty() {
            return 0;
        }
        if x_fp <= self.knots[0].0 {
            return self.knots[0].1;
        }
        if x_fp >= self.knots[self.knots.len() - 1].0 {
            return self.knots[self.knots.len() - 1].1;
        }
        for window in self.knots.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if x_fp >= x0 && x_fp <= x1 {
                if x1 == x0 {
                    return y0;
                }
                let num = (y1 as i128 - y0 as i128) * (x_fp as i128 - x0 as i128);
                let delta = num / (x1 as i128 - x0 as i128);
                return (y0 as i128 + delta) as u64;
            }
        }
        self.knots[self.knots.len() - 1].1
    }

    /// A curve is well-formed when its knots are sorted and non-decreasing
    /// in `x`; `Policy::validate` rejects anything else.
    pub fn is_monotone_in_x(&self) -> bool {
        self.knots.windows(2).all(|w| w[0].0 < w[1].0)
    }
}

/// The full PoIES parameter bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub theta_target: u64,
    pub gamma_total: u64,
    pub types: BTreeMap<ProofKind, TypeParams>,
    pub alpha_min_fp: u64,
    pub alpha_max_fp: u64,
    /// Alpha learning rate, fixed-point.
    pub rho_fp: u64,
    /// Retarget responsiveness, fixed-point.
    pub kappa_fp: u64,
    pub delta_plus: u64,
    pub delta_minus: u64,
    /// Minimum distinct proof types required once `Psi` crosses
    /// `tau_escort_fp * gamma_total`.
    pub q_escort: usize,
    pub tau_escort_fp: u64,
    /// `m` in `Theta_share = m * Theta`, fixed-point in `(0, FP_SCALE)`.
    pub theta_share_ratio_fp: u64,
    pub nullifier_window: u64,
    /// Target inter-arrival rate (blocks per second, fixed-point).
    pub lambda_target_fp: u64,
    pub delta_t_min_secs: u64,
    pub delta_t_max_secs: u64,
    pub epoch_len: u64,
    pub max_reorg_depth: u64,
    pub max_timestamp_skew_secs: u64,
    /// `g(traps_ratio)`: convex below a policy-chosen target, flat above.
    pub g_traps: Curve,
    /// `r(redundancy) = min(k, r_max)^rho`, tabulated.
    pub r_redundancy: Curve,
    /// `pow_fp` sigma exponent for the storage sublinear curve, fixed-point.
    pub storage_sigma_fp: u64,
    /// Storage retrieval-bonus multiplier `delta`, fixed-point.
    pub storage_retrieval_delta_fp: u64,
    pub chain_id: u32,
    pub nonce_domain_tag: String,
    /// Hash-share difficulty target; a hash share's work value must be
    /// numerically below this for the proof to clear `BelowShareTarget`.
    pub hash_share_target: U256,
}

impl Policy {
    /// Canonical byte form used both for hashing (`policy_root`) and for
    /// wire transport. Delegates to `serde_json` deterministic field order
    /// is not guaranteed by `serde_json`'s `Value`, so this hashes the
    /// struct's stable `Vec<u8>` via `bincode`-free manual concatenation
    /// of its already-canonical sub-encodings instead of round-tripping
    /// through a generic map type.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Policy is host-supplied configuration, not a per-block wire
        // value on the hot path, so a straightforward stable JSON
        // serialization (derived `Serialize`, struct field order is fixed
        // by declaration order for `serde_json` when not going through a
        // `Value`) is sufficient; only its hash is consensus-critical.
        serde_json::to_vec(self).expect("Policy serialization cannot fail")
    }

    pub fn compute_root(&self) -> PolicyRoot {
        PolicyRoot(domain_hash("ANM-POLICY-V1", &self.canonical_bytes()))
    }

    /// Validate internal consistency: monotone curves, bounds ordering,
    /// chain ids, ratios in range. Called once at load time; a policy
    /// that fails this is never treated as an `UnknownPolicy` case by the
    /// caller — it simply never becomes loadable.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.alpha_min_fp > self.alpha_max_fp {
            return Err(ConsensusError::MalformedBody(
                "alpha_min_fp exceeds alpha_max_fp".into(),
            ));
        }
        if self.theta_share_ratio_fp == 0 || self.theta_share_ratio_fp >= FP_SCALE {
            return Err(ConsensusError::MalformedBody(
                "theta_share_ratio_fp must be in (0, FP_SCALE)".into(),
            ));
        }
        if self.delta_t_min_secs > self.delta_t_max_secs {
            return Err(ConsensusError::MalformedBody(
                "delta_t_min_secs exceeds delta_t_max_secs".into(),
            ));
        }
        if !self.g_traps.is_monotone_in_x() || !self.r_redundancy.is_monotone_in_x() {
            return Err(ConsensusError::MalformedBody(
                "tabulated curves must be strictly monotone in x".into(),
            ));
        }
        for kind in [
            ProofKind::Hash,
            ProofKind::Ai,
            ProofKind::Qpu,
            ProofKind::Stor,
            ProofKind::Vdf,
        ] {
            let params = self
                .types
                .get(&kind)
                .ok_or_else(|| ConsensusError::MalformedBody(format!("missing type params for {kind:?}")))?;
            if params.gamma_proof > params.gamma_type {
                return Err(ConsensusError::MalformedBody(format!(
                    "{kind:?}: gamma_proof exceeds gamma_type"
                )));
            }
            if params.gamma_type > self.gamma_total {
                return Err(ConsensusError::MalformedBody(format!(
                    "{kind:?}: gamma_type exceeds gamma_total"
                )));
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::test_policy;
    use super::*;

    #[test]
    fn test_policy_validates() {
        assert!(test_policy().validate().is_ok());
    }

    #[test]
    fn policy_root_is_deterministic() {
        let policy = test_policy();
        assert_eq!(policy.compute_root(), policy.compute_root());
    }

    #[test]
    fn curve_eval_clamps_outside_domain() {
        let curve = Curve {
            knots: vec![(10, 100), (20, 200)],
        };
        assert_eq!(curve.eval(0), 100);
        assert_eq!(curve.eval(30), 200);
        assert_eq!(curve.eval(15), 150);
    }

    #[test]
    fn non_monotone_curve_fails_validation() {
        let mut policy = test_policy();
        policy.g_traps.knots = vec![(10, 0), (5, 10)];
        assert!(policy.validate().is_err());
    }

    #[test]
    fn gamma_proof_exceeding_gamma_type_fails_validation() {
        let mut policy = test_policy();
        policy.types.get_mut(&ProofKind::Hash).unwrap().gamma_proof = 999;
        assert!(policy.validate().is_err());
    }
}
