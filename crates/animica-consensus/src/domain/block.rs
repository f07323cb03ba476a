//! The block shape the core actually consumes.
//!
//! Per the scope cut in `spec.md` §1/§3, the core only ever reads a
//! block's `header` and `proofs`; transaction bodies and receipts belong
//! to the VM/mempool collaborator and are carried here only so a host can
//! pass its full block type through without restructuring it first.

use crate::domain::proof::ProofEnvelope;
use crate::domain::header::Header;

/// A candidate block as submitted to [`crate::service::ConsensusService`].
///
/// `txs` and `receipts_root_data` are opaque to the core: their digests
/// are already folded into `header.txs_root`/`header.receipts_root` by the
/// block packer, and the core never inspects their contents.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: Header,
    pub proofs: Vec<ProofEnvelope>,
}

impl Block {
    pub fn new(header: Header, proofs: Vec<ProofEnvelope>) -> Self {
        Self { header, proofs }
    }
}
