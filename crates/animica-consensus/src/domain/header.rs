//! Canonical block header: the pure-data shape every node hashes and
//! scores identically.

use crate::domain::codec::{Reader, Writer};
use crate::domain::error::ConsensusError;
use animica_types::{Address, Hash, PolicyRoot};
use serde::{Deserialize, Serialize};

/// Header size cap, in bytes of its canonical CBOR encoding.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Canonical block header.
///
/// Field order below is the canonical CBOR map key order (ascending,
/// `0..=13`); see [`Header::encode_canonical`]. Reordering these fields in
/// the struct does not change the wire format — the encoder assigns keys
/// explicitly — but the list here documents the committed key assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// key 0
    pub parent_hash: Hash,
    /// key 1
    pub height: u64,
    /// key 2 — binds the u-draw; doubles as the proposer's nonce.
    pub mix_seed: Hash,
    /// key 3
    pub state_root: Hash,
    /// key 4
    pub txs_root: Hash,
    /// key 5
    pub proofs_root: Hash,
    /// key 6
    pub da_root: Hash,
    /// key 7
    pub receipts_root: Hash,
    /// key 8 — acceptance threshold, in micro-nats.
    pub theta: u64,
    /// key 9
    pub policy_root: PolicyRoot,
    /// key 10
    pub alg_policy_root: Hash,
    /// key 11 — fixed ASCII constant.
    pub nonce_domain_tag: String,
    /// key 12
    pub coinbase: Address,
    /// key 13 — unix seconds.
    pub timestamp: u64,
}

impl Header {
    /// Encode this header as canonical CBOR: a definite-length map with
    /// strictly ascending integer keys `0..=13`, minimal integer encoding.
    pub fn encode_canonical(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_map_header(14);
        w.write_uint(0).write_bytes(&self.parent_hash);
        w.write_uint(1).write_uint(self.height);
        w.write_uint(2).write_bytes(&self.mix_seed);
        w.write_uint(3).write_bytes(&self.state_root);
        w.write_uint(4).write_bytes(&self.txs_root);
        w.write_uint(5).write_bytes(&self.proofs_root);
        w.write_uint(6).write_bytes(&self.da_root);
        w.write_uint(7).write_bytes(&self.receipts_root);
        w.write_uint(8).write_uint(self.theta);
        w.write_uint(9).write_bytes(&self.policy_root.0);
        w.write_uint(10).write_bytes(&self.alg_policy_root);
        w.write_uint(11).write_text(&self.nonce_domain_tag);
        w.write_uint(12).write_bytes(&self.coinbase);
        w.write_uint(13).write_uint(self.timestamp);
        w.into_bytes()
    }

    /// Decode a canonical-CBOR-encoded header, rejecting any non-canonical
    /// byte layout (out-of-order keys, extra fields, non-minimal ints).
    pub fn decode_canonical(bytes: &[u8]) -> Result<Self, ConsensusError> {
        if bytes.len() > MAX_HEADER_BYTES {
            return Err(ConsensusError::MalformedHeader(format!(
                "header size {} exceeds cap {}",
                bytes.len(),
                MAX_HEADER_BYTES
            )));
        }

        let mut r = Reader::new(bytes);
        let len = r.read_map_header()?;
        if len != 14 {
            return Err(ConsensusError::MalformedEncoding(format!(
                "expected 14 header fields, got {len}"
            )));
        }

        let mut last_key: Option<u64> = None;
        let mut next_key = |r: &mut Reader| -> Result<u64, ConsensusError> {
            let key = r.read_uint()?;
            if let Some(prev) = last_key {
                if key <= prev {
                    return Err(ConsensusError::MalformedEncoding(
                        "header map keys are not strictly ascending".into(),
                    ));
                }
            }
            last_key = Some(key);
            Ok(key)
        };

        macro_rules! expect_key {
            ($k:expr) => {{
                let key = next_key(&mut r)?;
                if key != $k {
                    return Err(ConsensusError::MalformedEncoding(format!(
                        "expected header key {}, got {}",
                        $k, key
                    )));
                }
            }};
        }

        expect_key!(0);
        let parent_hash = r.read_fixed_bytes::<32>()?;
        expect_key!(1);
        let height = r.read_uint()?;
        expect_key!(2);
        let mix_seed = r.read_fixed_bytes::<32>()?;
        expect_key!(3);
        let state_root = r.read_fixed_bytes::<32>()?;
        expect_key!(4);
        let txs_root = r.read_fixed_bytes::<32>()?;
        expect_key!(5);
        let proofs_root = r.read_fixed_bytes::<32>()?;
        expect_key!(6);
        let da_root = r.read_fixed_bytes::<32>()?;
        expect_key!(7);
        let receipts_root = r.read_fixed_bytes::<32>()?;
        expect_key!(8);
        let theta = r.read_uint()?;
        expect_key!(9);
        let policy_root = PolicyRoot(r.read_fixed_bytes::<32>()?);
        expect_key!(10);
        let alg_policy_root = r.read_fixed_bytes::<32>()?;
        expect_key!(11);
        let nonce_domain_tag = r.read_text()?.to_string();
        expect_key!(12);
        let coinbase = r.read_fixed_bytes::<20>()?;
        expect_key!(13);
        let timestamp = r.read_uint()?;

        if !r.is_empty() {
            return Err(ConsensusError::MalformedEncoding(
                "trailing bytes after header map".into(),
            ));
        }

        Ok(Header {
            parent_hash,
            height,
            mix_seed,
            state_root,
            txs_root,
            proofs_root,
            da_root,
            receipts_root,
            theta,
            policy_root,
            alg_policy_root,
            nonce_domain_tag,
            coinbase,
            timestamp,
        })
    }

    /// The domain-tagged header identity hash.
    pub fn hash(&self) -> Hash {
        animica_crypto::domain_hash(animica_crypto::hashing::TAG_HEADER, &self.encode_canonical())
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.parent_hash == [0u8; 32]
    }
}
