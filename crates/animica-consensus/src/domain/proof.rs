//! Proof envelopes and the per-type metrics the registry extracts from them.

use animica_types::{Hash, Nullifier};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// The five evidence kinds PoIES recognizes. A closed sum type rather than
/// string/`type_id` dispatch, per the redesign flag in the source material:
/// new kinds are added here and in [`ProofRegistry`](crate::domain::registry::ProofRegistry),
/// never inferred from an open-ended identifier at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProofKind {
    Hash = 0,
    Ai = 1,
    Qpu = 2,
    Stor = 3,
    Vdf = 4,
}

impl ProofKind {
    /// The ASCII tag used when deriving this kind's nullifier domain,
    /// e.g. `"ANM-NULLIFIER-HASH-V1"`.
    pub fn tag(self) -> &'static str {
        match self {
            ProofKind::Hash => "HASH",
            ProofKind::Ai => "AI",
            ProofKind::Qpu => "QPU",
            ProofKind::Stor => "STOR",
            ProofKind::Vdf => "VDF",
        }
    }

    /// The wire `type_id` for this kind.
    pub fn type_id(self) -> u64 {
        self as u64
    }
}

impl TryFrom<u64> for ProofKind {
    type Error = crate::domain::error::ConsensusError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProofKind::Hash),
            1 => Ok(ProofKind::Ai),
            2 => Ok(ProofKind::Qpu),
            3 => Ok(ProofKind::Stor),
            4 => Ok(ProofKind::Vdf),
            other => Err(crate::domain::error::ConsensusError::UnknownAlgorithm(other)),
        }
    }
}

/// A proof as received over the wire, before verification.
///
/// `body_cbor` decodes into a type-specific schema depending on `type_id`;
/// the registry never peeks inside it before dispatching to the matching
/// verifier.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofEnvelope {
    pub type_id: u64,
    #[serde_as(as = "Bytes")]
    pub body_cbor: Vec<u8>,
    pub nullifier: Nullifier,
}

impl ProofEnvelope {
    pub fn kind(&self) -> Result<ProofKind, crate::domain::error::ConsensusError> {
        ProofKind::try_from(self.type_id)
    }
}

/// Verified, type-discriminated metrics extracted from a [`ProofEnvelope`].
/// This is what the [`Scorer`](crate::domain::scorer::Scorer) consumes;
/// raw envelope bytes never reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProofMetrics {
    Hash(HashMetrics),
    Ai(AiMetrics),
    Qpu(QpuMetrics),
    Stor(StorMetrics),
    Vdf(VdfMetrics),
}

impl ProofMetrics {
    pub fn kind(&self) -> ProofKind {
        match self {
            ProofMetrics::Hash(_) => ProofKind::Hash,
            ProofMetrics::Ai(_) => ProofKind::Ai,
            ProofMetrics::Qpu(_) => ProofKind::Qpu,
            ProofMetrics::Stor(_) => ProofKind::Stor,
            ProofMetrics::Vdf(_) => ProofKind::Vdf,
        }
    }
}

/// `d_ratio = target / share_target`, scaled by `animica_crypto::FP_SCALE`.
/// Always `>= FP_SCALE` (i.e. `d_ratio >= 1`) for a proof that passed
/// verification; verification itself rejects anything below the share
/// target with `BelowShareTarget`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HashMetrics {
    pub d_ratio_fp: u64,
}

/// Metrics from a verified AI-compute attestation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiMetrics {
    pub ai_units: u64,
    /// `qos` in `[0, FP_SCALE]`.
    pub qos_fp: u64,
    /// `traps_ratio` in `[0, FP_SCALE]`.
    pub traps_ratio_fp: u64,
    pub redundancy: u64,
}

/// Metrics from a verified quantum-compute attestation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QpuMetrics {
    pub quantum_units: u64,
    pub qos_fp: u64,
    pub traps_ratio_fp: u64,
}

/// Metrics from a verified storage heartbeat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorMetrics {
    pub sealed_bytes: u64,
    pub uptime_qos_fp: u64,
    pub retrieval_bonus: bool,
}

/// Metrics from a verified VDF proof.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VdfMetrics {
    pub t_seconds: u64,
}

/// Context a verifier needs that is not contained in the envelope body:
/// the header fields that bind a proof to a specific block attempt.
#[derive(Debug, Clone, Copy)]
pub struct HeaderContext<'a> {
    pub parent_hash: &'a Hash,
    pub mix_seed: &'a Hash,
    pub height: u64,
    pub policy_root: &'a Hash,
    pub nonce_domain_tag: &'a str,
}
