//! Proof verification: dispatch on [`ProofKind`], extract [`ProofMetrics`],
//! and derive the nullifier each proof must carry.
//!
//! Verifiers are pure functions of `(body, header context, policy, vendor
//! roots)` — no wall-clock, network, or filesystem access — so the caller
//! is free to run them on a worker pool and join the results before they
//! ever reach the [`Scorer`](crate::domain::scorer::Scorer).

use crate::domain::codec::{Reader, Writer};
use crate::domain::error::{ConsensusError, ConsensusResult};
use crate::domain::policy::Policy;
use crate::domain::proof::{
    AiMetrics, HeaderContext, ProofEnvelope, ProofKind, ProofMetrics, QpuMetrics, StorMetrics,
    VdfMetrics,
};
use animica_crypto::{domain_hash_many, nullifier_tag, Hash};
use animica_types::Nullifier;
use primitive_types::U256;
use std::time::Instant;

/// Pinned attestation root digests, one list per TEE/QPU vendor family.
/// Loaded once at startup and held as immutable byte slices for the
/// lifetime of the process — never mutated by the registry.
#[derive(Debug, Clone, Default)]
pub struct VendorRoots {
    pub sgx: Vec<Hash>,
    pub sev_snp: Vec<Hash>,
    pub arm_cca: Vec<Hash>,
    pub qpu: Vec<Hash>,
}

impl VendorRoots {
    fn contains(roots: &[Hash], candidate: &Hash) -> bool {
        roots.iter().any(|r| r == candidate)
    }
}

const TAG_ATTEST: &str = "ANM-ATTEST-V1";
const TAG_STOR_CHALLENGE: &str = "ANM-STOR-CHALLENGE-V1";
const TAG_VDF: &str = "ANM-VDF-V1";

/// Dispatches proof envelopes to the verifier for their claimed type.
pub struct ProofRegistry<'a> {
    policy: &'a Policy,
    vendor_roots: &'a VendorRoots,
}

impl<'a> ProofRegistry<'a> {
    pub fn new(policy: &'a Policy, vendor_roots: &'a VendorRoots) -> Self {
        Self {
            policy,
            vendor_roots,
        }
    }

    /// Verify one envelope, returning its extracted metrics. `deadline`
    /// is checked once at entry: this function is CPU-bound and does not
    /// suspend, so it cannot be preempted mid-verification, but a caller
    /// that already knows its budget is exhausted (a backlog of proofs
    /// queued behind a slow one) gets `VerificationTimedOut` without
    /// paying for the verification itself.
    pub fn verify(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
        deadline: Option<Instant>,
    ) -> ConsensusResult<ProofMetrics> {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(ConsensusError::VerificationTimedOut);
            }
        }

        let kind = envelope.kind()?;
        match kind {
            ProofKind::Hash => self.verify_hash(envelope, ctx),
            ProofKind::Ai => self.verify_ai(envelope, ctx),
            ProofKind::Qpu => self.verify_qpu(envelope, ctx),
            ProofKind::Stor => self.verify_stor(envelope, ctx),
            ProofKind::Vdf => self.verify_vdf(envelope, ctx),
        }
    }

    fn verify_hash(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
    ) -> ConsensusResult<ProofMetrics> {
        let mut r = Reader::new(&envelope.body_cbor);
        let fields = r.read_map_header()?;
        if fields != 1 {
            return Err(ConsensusError::MalformedBody(
                "hash-share body must have exactly 1 field".into(),
            ));
        }
        let key = r.read_uint()?;
        if key != 0 {
            return Err(ConsensusError::MalformedBody("unexpected hash-share key".into()));
        }
        let extranonce = r.read_bytes()?.to_vec();
        if !r.is_empty() {
            return Err(ConsensusError::MalformedBody("trailing bytes in hash-share body".into()));
        }

        let height_be = ctx.height.to_be_bytes();
        let work_hash = domain_hash_many(
            "ANM-HASHSHARE-V1",
            &[
                ctx.parent_hash.as_slice(),
                ctx.mix_seed.as_slice(),
                height_be.as_slice(),
                ctx.policy_root.as_slice(),
                ctx.nonce_domain_tag.as_bytes(),
                extranonce.as_slice(),
            ],
        );
        let work_value = U256::from_big_endian(&work_hash);

        if work_value >= self.policy.hash_share_target {
            return Err(ConsensusError::BelowShareTarget);
        }

        let d_ratio_fp = u256_ratio_fp(self.policy.hash_share_target, work_value + U256::one());

        let derived = derive_nullifier(ProofKind::Hash, &extranonce, ctx.mix_seed, ctx.policy_root);
        check_nullifier(&envelope.nullifier, &derived)?;

        Ok(ProofMetrics::Hash(crate::domain::proof::HashMetrics { d_ratio_fp }))
    }

    fn verify_ai(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
    ) -> ConsensusResult<ProofMetrics> {
        let report = self.verify_attestation(&envelope.body_cbor, &self.vendor_roots.sgx_union())?;
        let identity = domain_hash_many(TAG_ATTEST, &[&report.raw]);
        let derived = derive_nullifier(ProofKind::Ai, &identity, ctx.mix_seed, ctx.policy_root);
        check_nullifier(&envelope.nullifier, &derived)?;

        Ok(ProofMetrics::Ai(AiMetrics {
            ai_units: report.ai_units,
            qos_fp: report.qos_fp,
            traps_ratio_fp: report.traps_ratio_fp,
            redundancy: report.redundancy,
        }))
    }

    fn verify_qpu(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
    ) -> ConsensusResult<ProofMetrics> {
        let report = self.verify_attestation(&envelope.body_cbor, &self.vendor_roots.qpu)?;
        let identity = domain_hash_many(TAG_ATTEST, &[&report.raw]);
        let derived = derive_nullifier(ProofKind::Qpu, &identity, ctx.mix_seed, ctx.policy_root);
        check_nullifier(&envelope.nullifier, &derived)?;

        Ok(ProofMetrics::Qpu(QpuMetrics {
            quantum_units: report.ai_units,
            qos_fp: report.qos_fp,
            traps_ratio_fp: report.traps_ratio_fp,
        }))
    }

    fn verify_stor(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
    ) -> ConsensusResult<ProofMetrics> {
        let mut r = Reader::new(&envelope.body_cbor);
        let fields = r.read_map_header()?;
        if fields != 4 {
            return Err(ConsensusError::MalformedBody(
                "storage body must have exactly 4 fields".into(),
            ));
        }
        expect_key(&mut r, 0)?;
        let sealed_bytes = r.read_uint()?;
        expect_key(&mut r, 1)?;
        let uptime_qos_fp = r.read_uint()?;
        expect_key(&mut r, 2)?;
        let retrieval_bonus = r.read_uint()? != 0;
        expect_key(&mut r, 3)?;
        let challenge_response = r.read_fixed_bytes::<32>()?;
        if !r.is_empty() {
            return Err(ConsensusError::MalformedBody("trailing bytes in storage body".into()));
        }

        let height_be = ctx.height.to_be_bytes();
        let sealed_bytes_be = sealed_bytes.to_be_bytes();
        let expected = domain_hash_many(
            TAG_STOR_CHALLENGE,
            &[ctx.mix_seed.as_slice(), height_be.as_slice(), sealed_bytes_be.as_slice()],
        );
        if challenge_response != expected {
            return Err(ConsensusError::BadAttestation(
                "storage challenge response does not match expected heartbeat".into(),
            ));
        }

        let identity = domain_hash_many(
            "ANM-STOR-IDENTITY-V1",
            &[sealed_bytes_be.as_slice(), challenge_response.as_slice()],
        );
        let derived = derive_nullifier(ProofKind::Stor, &identity, ctx.mix_seed, ctx.policy_root);
        check_nullifier(&envelope.nullifier, &derived)?;

        Ok(ProofMetrics::Stor(StorMetrics {
            sealed_bytes,
            uptime_qos_fp,
            retrieval_bonus,
        }))
    }

    fn verify_vdf(
        &self,
        envelope: &ProofEnvelope,
        ctx: HeaderContext<'_>,
    ) -> ConsensusResult<ProofMetrics> {
        let mut r = Reader::new(&envelope.body_cbor);
        let fields = r.read_map_header()?;
        if fields != 2 {
            return Err(ConsensusError::MalformedBody("vdf body must have exactly 2 fields".into()));
        }
        expect_key(&mut r, 0)?;
        let t_seconds = r.read_uint()?;
        expect_key(&mut r, 1)?;
        let output = r.read_fixed_bytes::<32>()?;
        if !r.is_empty() {
            return Err(ConsensusError::MalformedBody("trailing bytes in vdf body".into()));
        }

        let t_seconds_be = t_seconds.to_be_bytes();
        let expected = domain_hash_many(
            TAG_VDF,
            &[ctx.parent_hash.as_slice(), ctx.mix_seed.as_slice(), t_seconds_be.as_slice()],
        );
        if output != expected {
            return Err(ConsensusError::BadAttestation(
                "vdf output does not match the expected sequential function result".into(),
            ));
        }

        let derived = derive_nullifier(ProofKind::Vdf, &output, ctx.mix_seed, ctx.policy_root);
        check_nullifier(&envelope.nullifier, &derived)?;

        Ok(ProofMetrics::Vdf(VdfMetrics { t_seconds }))
    }

    /// Shared attestation-chain check for AI/QPU envelopes: the body
    /// carries a claimed vendor root id, a report, and a MAC binding the
    /// two. This models "verify a signature chain against pinned roots"
    /// without re-implementing DCAP/JWKS parsing, which belongs to the
    /// external attestation-primitive collaborator.
    fn verify_attestation(&self, body: &[u8], allowed_roots: &[Hash]) -> ConsensusResult<AttestedReport> {
        let mut r = Reader::new(body);
        let fields = r.read_map_header()?;
        if fields != 6 {
            return Err(ConsensusError::MalformedBody(
                "attestation body must have exactly 6 fields".into(),
            ));
        }
        expect_key(&mut r, 0)?;
        let root_id = r.read_fixed_bytes::<32>()?;
        expect_key(&mut r, 1)?;
        let mac = r.read_fixed_bytes::<32>()?;
        expect_key(&mut r, 2)?;
        let ai_units = r.read_uint()?;
        expect_key(&mut r, 3)?;
        let qos_fp = r.read_uint()?;
        expect_key(&mut r, 4)?;
        let traps_ratio_fp = r.read_uint()?;
        expect_key(&mut r, 5)?;
        let redundancy = r.read_uint()?;
        if !r.is_empty() {
            return Err(ConsensusError::MalformedBody("trailing bytes in attestation body".into()));
        }

        if !VendorRoots::contains(allowed_roots, &root_id) {
            return Err(ConsensusError::BadAttestation(
                "attestation root is not in the pinned allow-list".into(),
            ));
        }

        let mut report_w = Writer::new();
        report_w
            .write_uint(ai_units)
            .write_uint(qos_fp)
            .write_uint(traps_ratio_fp)
            .write_uint(redundancy);
        let report_bytes = report_w.into_bytes();

        let expected_mac = domain_hash_many(TAG_ATTEST, &[&root_id, &report_bytes]);
        if mac != expected_mac {
            return Err(ConsensusError::BadAttestation(
                "attestation MAC does not match pinned root binding".into(),
            ));
        }

        Ok(AttestedReport {
            ai_units,
            qos_fp,
            traps_ratio_fp,
            redundancy,
            raw: report_bytes,
        })
    }
}

impl VendorRoots {
    fn sgx_union(&self) -> Vec<Hash> {
        let mut out = self.sgx.clone();
        out.extend_from_slice(&self.sev_snp);
        out.extend_from_slice(&self.arm_cca);
        out
    }
}

struct AttestedReport {
    ai_units: u64,
    qos_fp: u64,
    traps_ratio_fp: u64,
    redundancy: u64,
    raw: Vec<u8>,
}

fn expect_key(r: &mut Reader<'_>, expected: u64) -> ConsensusResult<()> {
    let key = r.read_uint()?;
    if key != expected {
        return Err(ConsensusError::MalformedBody(format!(
            "expected field key {expected}, got {key}"
        )));
    }
    Ok(())
}

/// The nullifier every proof of `kind` carrying `identity_bytes` under this
/// header context must equal. Exposed so callers building proof envelopes
/// (the block packer, integration tests) can compute the same value the
/// registry will independently re-derive at verification time.
pub fn derive_nullifier(kind: ProofKind, identity_bytes: &[u8], mix_seed: &Hash, policy_root: &Hash) -> Hash {
    domain_hash_many(&nullifier_tag(kind.tag()), &[identity_bytes, mix_seed, policy_root])
}

fn check_nullifier(claimed: &Nullifier, derived: &Hash) -> ConsensusResult<()> {
    if claimed.0 != *derived {
        return Err(ConsensusError::NullifierMismatch {
            claimed: claimed.0,
            derived: *derived,
        });
    }
    Ok(())
}

/// `numerator / denominator` as a fixed-point ratio scaled by `FP_SCALE`,
/// for 256-bit inputs.
fn u256_ratio_fp(numerator: U256, denominator: U256) -> u64 {
    let scaled = numerator.saturating_mul(U256::from(animica_crypto::FP_SCALE));
    let result = scaled / denominator;
    if result > U256::from(u64::MAX) {
        u64::MAX
    } else {
        result.as_u64()
    }
}
