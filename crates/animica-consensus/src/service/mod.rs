//! Consensus service: wires the pure [`crate::domain`] logic to the
//! [`crate::ports`] a host injects and owns the one piece of mutable
//! state the core is allowed to carry across blocks.

use crate::domain::{
    decide, score as score_block_score, AlphaTuner, Block, ConsensusError, ConsensusResult,
    Decision, EpochAccumulator, ForkChoice, Header, HeaderContext, NullifierStore, Policy,
    ProofEnvelope, ProofKind, ProofMetrics, ProofRegistry, RetargetState, Retargeter,
    ScoreBreakdown, Scorer,
};
use crate::events::TipChanged;
use crate::ports::{AttestationRoots, Clock, ConsensusApi};
use animica_crypto::Hash;
use animica_types::Nullifier;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything the service mutates once a block is accepted. Grouped
/// behind its own lock set so read-mostly paths (`tip`, `get_theta`,
/// `get_alpha`) never contend with the rarer write path.
struct MutableState {
    headers: HashMap<Hash, Header>,
    fork_choice: ForkChoice,
    nullifiers: NullifierStore,
    retarget_state: RetargetState,
    epoch_accum: EpochAccumulator,
    theta: u64,
}

/// The PoIES consensus core: scoring, acceptance, retargeting, and fork
/// choice behind a single driving port ([`ConsensusApi`]).
///
/// Internal state is guarded by `parking_lot::RwLock`, matching the
/// teacher's convention for in-process shared state over `std::sync`.
pub struct ConsensusService<R, C>
where
    R: AttestationRoots,
    C: Clock,
{
    roots: Arc<R>,
    clock: Arc<C>,
    policy: RwLock<Policy>,
    state: RwLock<MutableState>,
}

impl<R, C> ConsensusService<R, C>
where
    R: AttestationRoots,
    C: Clock,
{
    /// Build a fresh core rooted at `genesis`. `policy` must already
    /// satisfy [`Policy::validate`]; the caller is responsible for having
    /// checked `genesis.policy_root == policy.compute_root()`.
    pub fn new(policy: Policy, genesis: Header, roots: Arc<R>, clock: Arc<C>) -> Self {
        let genesis_hash = genesis.hash();
        let theta = policy.theta_target;
        let lambda_target = policy.lambda_target_fp;

        let mut headers = HashMap::new();
        headers.insert(genesis_hash, genesis);

        let state = MutableState {
            headers,
            fork_choice: ForkChoice::new(genesis_hash, policy.max_reorg_depth),
            nullifiers: NullifierStore::new(),
            retarget_state: RetargetState::new(lambda_target),
            epoch_accum: EpochAccumulator::default(),
            theta,
        };

        Self { roots, clock, policy: RwLock::new(policy), state: RwLock::new(state) }
    }

    fn header_ctx<'a>(header: &'a Header) -> HeaderContext<'a> {
        HeaderContext {
            parent_hash: &header.parent_hash,
            mix_seed: &header.mix_seed,
            height: header.height,
            policy_root: &header.policy_root.0,
            nonce_domain_tag: &header.nonce_domain_tag,
        }
    }

    /// Structural and gate checks that do not require the proof set:
    /// known parent, sequential height, monotonic/bounded timestamp,
    /// matching policy root, claimed `theta` matching the tracked value.
    fn validate_header_gate(&self, header: &Header) -> ConsensusResult<()> {
        let policy = self.policy.read();
        if header.policy_root != policy.compute_root() {
            return Err(ConsensusError::UnknownPolicy(header.policy_root.0));
        }

        let state = self.state.read();
        if header.is_genesis() {
            if !state.headers.contains_key(&header.hash()) {
                return Err(ConsensusError::MalformedHeader(
                    "genesis header does not match the core's own genesis".into(),
                ));
            }
            return Ok(());
        }

        let parent = state
            .headers
            .get(&header.parent_hash)
            .ok_or(ConsensusError::UnknownParent(header.parent_hash))?;

        if header.height != parent.height + 1 {
            return Err(ConsensusError::MalformedHeader(format!(
                "height {} does not follow parent height {}",
                header.height, parent.height
            )));
        }
        if header.timestamp < parent.timestamp {
            return Err(ConsensusError::MalformedHeader(
                "timestamp precedes parent timestamp".into(),
            ));
        }
        let now = self.clock.now();
        let skew = header.timestamp.abs_diff(now);
        if skew > policy.max_timestamp_skew_secs {
            return Err(ConsensusError::MalformedHeader(format!(
                "timestamp skew {skew}s exceeds policy bound {}s",
                policy.max_timestamp_skew_secs
            )));
        }
        if header.theta != state.theta {
            return Err(ConsensusError::MalformedHeader(format!(
                "claimed theta {} does not match tracked theta {}",
                header.theta, state.theta
            )));
        }

        Ok(())
    }

    fn maybe_retarget_and_tune(&self, state: &mut MutableState, policy: &mut Policy, height: u64) {
        if policy.epoch_len == 0 || height % policy.epoch_len != 0 {
            return;
        }
        let new_theta = Retargeter::retarget(policy, state.theta, &state.retarget_state);
        debug!(old_theta = state.theta, new_theta, height, "epoch retarget");
        state.theta = new_theta;
        AlphaTuner::tune(policy, &state.epoch_accum);
        state.epoch_accum.reset();
    }
}

#[async_trait]
impl<R, C> ConsensusApi for ConsensusService<R, C>
where
    R: AttestationRoots + 'static,
    C: Clock + 'static,
{
    async fn validate_header(&self, header: &Header) -> ConsensusResult<()> {
        self.validate_header_gate(header)
    }

    async fn verify_proof(
        &self,
        ctx: HeaderContext<'_>,
        envelope: &ProofEnvelope,
        deadline: Option<Duration>,
    ) -> ConsensusResult<ProofMetrics> {
        let policy = self.policy.read();
        let vendor_roots = self.roots.vendor_roots().await;
        let registry = ProofRegistry::new(&policy, &vendor_roots);
        let deadline = deadline.map(|d| Instant::now() + d);
        let metrics = registry.verify(envelope, ctx, deadline)?;
        crate::metrics::record_proof_verified();
        Ok(metrics)
    }

    async fn score_block(
        &self,
        proofs: &[(ProofEnvelope, ProofMetrics)],
    ) -> ConsensusResult<ScoreBreakdown> {
        let policy = self.policy.read();
        Scorer::new(&policy).score(proofs)
    }

    async fn submit_block(&self, block: Block, deadline: Option<Duration>) -> ConsensusResult<Decision> {
        let header = block.header;
        let header_hash = header.hash();
        debug!(height = header.height, hash = ?header_hash, "submit_block");

        self.validate_header_gate(&header)?;

        let policy_snapshot = self.policy.read().clone();
        let vendor_roots = self.roots.vendor_roots().await;
        let registry = ProofRegistry::new(&policy_snapshot, &vendor_roots);
        let ctx = Self::header_ctx(&header);
        let deadline = deadline.map(|d| Instant::now() + d);

        let mut verified = Vec::with_capacity(block.proofs.len());
        for envelope in &block.proofs {
            let metrics = registry.verify(envelope, ctx, deadline).map_err(|e| {
                let reason = if matches!(e, ConsensusError::VerificationTimedOut) {
                    "verification_timed_out"
                } else {
                    "proof_verification_failed"
                };
                crate::metrics::record_block_rejected(reason);
                e
            })?;
            crate::metrics::record_proof_verified();
            verified.push((envelope.clone(), metrics));
        }

        let nullifiers: Vec<Nullifier> = block.proofs.iter().map(|p| p.nullifier).collect();
        {
            let state = self.state.read();
            state.nullifiers.check_no_conflict(&nullifiers).map_err(|e| {
                crate::metrics::record_block_rejected("nullifier_reuse");
                e
            })?;
        }

        let breakdown = Scorer::new(&policy_snapshot).score(&verified).map_err(|e| {
            crate::metrics::record_block_rejected("escort_violation");
            e
        })?;

        let result = score_block_score(policy_snapshot.chain_id, &header, breakdown.clone());
        let decision = decide(&policy_snapshot, header_hash, &header, result);

        match &decision {
            Decision::Accepted(accepted) => {
                let mut state = self.state.write();
                let mut policy = self.policy.write();

                let delta_t = state
                    .headers
                    .get(&header.parent_hash)
                    .map(|parent| header.timestamp.saturating_sub(parent.timestamp))
                    .unwrap_or(0);
                state.retarget_state.observe(delta_t, &policy);
                state.epoch_accum.record(&breakdown.per_type);

                let own_weight = accepted.result.s;
                let tip_event = state
                    .fork_choice
                    .insert(header_hash, header.parent_hash, header.height, own_weight, nullifiers)
                    .map_err(|e| {
                        crate::metrics::record_block_rejected("reorg_too_deep");
                        e
                    })?;

                // Nullifiers only ever enter the active view when they
                // land on the chain that becomes (or stays) the tip. A
                // block that is accepted but never becomes canonical
                // (`Ok(None)`) leaves the active view untouched; on a
                // reorg, the abandoned branch's nullifiers are released
                // and the newly adopted branch's are claimed atomically
                // with the tip flip.
                if let Some(TipChanged { new_tip, new_height, abandoned, adopted, .. }) = &tip_event {
                    for delta in abandoned {
                        state.nullifiers.remove_block(delta.height, &delta.nullifiers);
                    }
                    for delta in adopted {
                        state.nullifiers.insert_block(delta.height, &delta.nullifiers);
                    }
                    let window = policy.nullifier_window;
                    state.nullifiers.purge(*new_height, window);
                    debug!(
                        ?new_tip,
                        new_height = *new_height,
                        abandoned = abandoned.len(),
                        adopted = adopted.len(),
                        "tip changed"
                    );
                }

                state.headers.insert(header_hash, header.clone());
                self.maybe_retarget_and_tune(&mut state, &mut policy, header.height);
                crate::metrics::record_block_accepted();
            }
            Decision::Share(_) => {
                debug!(height = header.height, hash = ?header_hash, "share receipt");
                crate::metrics::record_block_shared();
            }
            Decision::Rejected(err) => {
                warn!(height = header.height, hash = ?header_hash, ?err, "below threshold");
                crate::metrics::record_block_rejected("below_threshold");
            }
        }

        Ok(decision)
    }

    async fn tip(&self) -> Hash {
        self.state.read().fork_choice.tip()
    }

    async fn get_theta(&self) -> u64 {
        self.state.read().theta
    }

    async fn get_alpha(&self, kind: ProofKind) -> ConsensusResult<u64> {
        let policy = self.policy.read();
        policy
            .types
            .get(&kind)
            .map(|p| p.alpha_fp)
            .ok_or_else(|| ConsensusError::MalformedBody(format!("no type params for {kind:?}")))
    }
}
