//! Epoch-boundary updates: the `Theta` retargeter and the per-type `alpha`
//! fairness tuner. Both fire exactly once per `epoch_len` accepted blocks,
//! using only data observed along the finalized prefix.

use crate::domain::policy::Policy;
use crate::domain::proof::ProofKind;
use animica_crypto::{exp_fp, ln_fp, mul_fp, FP_SCALE};
use std::collections::BTreeMap;

/// The one piece of retarget state that persists across epoch boundaries:
/// a running estimate of the block inter-arrival rate `1/Delta t`.
#[derive(Debug, Clone, Copy)]
pub struct RetargetState {
    pub lambda_ema_fp: u64,
}

impl RetargetState {
    pub fn new(initial_lambda_fp: u64) -> Self {
        Self { lambda_ema_fp: initial_lambda_fp }
    }

    /// Fold in one block's observed inter-arrival time. `delta_t_secs` is
    /// clamped to `[delta_t_min_secs, delta_t_max_secs]` first so a single
    /// pathological gap (a long network partition, a clock jump) cannot
    /// swing `lambda_ema` past recovery.
    ///
    /// Smoothing window: one block contributes `1/epoch_len` of the
    /// update, i.e. the EMA has roughly one epoch's worth of memory. The
    /// source material specifies the clamp but not this window; fixed
    /// here and recorded as a ratified choice in `DESIGN.md`.
    pub fn observe(&mut self, delta_t_secs: u64, policy: &Policy) {
        let clamped = delta_t_secs.clamp(policy.delta_t_min_secs, policy.delta_t_max_secs).max(1);
        let rate_fp = FP_SCALE / clamped;
        let weight = policy.epoch_len.max(1) as i128;
        let delta = rate_fp as i128 - self.lambda_ema_fp as i128;
        let updated = self.lambda_ema_fp as i128 + delta / weight;
        self.lambda_ema_fp = updated.max(0) as u64;
    }
}

/// Per-epoch accumulator of accepted `psi` by proof type, reset after
/// every retarget/alpha-tune cycle.
#[derive(Debug, Clone, Default)]
pub struct EpochAccumulator {
    psi_by_type: BTreeMap<ProofKind, u64>,
    blocks: u64,
}

impl EpochAccumulator {
    pub fn record(&mut self, per_type: &BTreeMap<ProofKind, u64>) {
        for (kind, psi) in per_type {
            *self.psi_by_type.entry(*kind).or_insert(0) += psi;
        }
        self.blocks += 1;
    }

    pub fn reset(&mut self) {
        self.psi_by_type.clear();
        self.blocks = 0;
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    fn total_psi(&self) -> u64 {
        self.psi_by_type.values().sum()
    }
}

/// Fractional log-space EMA retargeter for `Theta`.
pub struct Retargeter;

impl Retargeter {
    /// `Theta_{t+1} = clamp(Theta_t + kappa*(ln(lambda_ema) -
    /// ln(lambda_target)), Theta_t - delta_minus, Theta_t + delta_plus)`.
    pub fn retarget(policy: &Policy, theta_prev: u64, state: &RetargetState) -> u64 {
        let ln_lambda = ln_fp(state.lambda_ema_fp.max(1));
        let ln_target = ln_fp(policy.lambda_target_fp.max(1));
        let diff = (ln_lambda - ln_target) as i128;
        let step = (policy.kappa_fp as i128 * diff) / FP_SCALE as i128;

        let proposed = theta_prev as i128 + step;
        let floor = theta_prev as i128 - policy.delta_minus as i128;
        let ceiling = theta_prev as i128 + policy.delta_plus as i128;
        proposed.clamp(floor, ceiling).max(0) as u64
    }
}

/// Slow multiplicative fairness tuner: nudges each type's `alpha` toward
/// its policy-declared target mix fraction based on the type's observed
/// share of accepted `psi` over the epoch.
pub struct AlphaTuner;

impl AlphaTuner {
    /// `alpha_T <- clamp(alpha_T * exp(rho * (pi*_T - pi_T)), alpha_min,
    /// alpha_max)`. Applied in place to every type in `policy.types`.
    pub fn tune(policy: &mut Policy, accum: &EpochAccumulator) {
        let total = accum.total_psi();
        let rho_fp = policy.rho_fp;
        let (alpha_min, alpha_max) = (policy.alpha_min_fp, policy.alpha_max_fp);

        for (kind, params) in policy.types.iter_mut() {
            let observed = *accum.psi_by_type.get(kind).unwrap_or(&0);
            let pi_observed_fp = if total == 0 {
                0
            } else {
                ((observed as u128 * FP_SCALE as u128) / total as u128) as u64
            };

            let diff_fp = params.alpha_target_fp as i64 - pi_observed_fp as i64;
            let exponent_fp = (rho_fp as i128 * diff_fp as i128) / FP_SCALE as i128;
            let exponent_fp = exponent_fp.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            let multiplier_fp = exp_fp(exponent_fp);

            let updated = mul_fp(params.alpha_fp, multiplier_fp);
            params.alpha_fp = updated.clamp(alpha_min, alpha_max);
        }
    }
}
