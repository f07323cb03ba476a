//! Consensus metrics.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! animica-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics exported
//!
//! - `consensus_blocks_accepted_total` - counter of blocks that crossed `Theta`
//! - `consensus_blocks_shared_total` - counter of share-tier receipts
//! - `consensus_blocks_rejected_total` - counter of rejections, labeled by reason
//! - `consensus_submit_latency_seconds` - histogram of `submit_block` latency
//! - `consensus_proofs_verified_total` - counter of individually verified proofs

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total blocks accepted (`S >= Theta`).
    pub static ref BLOCKS_ACCEPTED: IntCounter = register_int_counter!(
        "consensus_blocks_accepted_total",
        "Total number of blocks accepted into the chain"
    )
    .expect("Failed to create BLOCKS_ACCEPTED metric");

    /// Total share-tier receipts issued.
    pub static ref BLOCKS_SHARED: IntCounter = register_int_counter!(
        "consensus_blocks_shared_total",
        "Total number of share receipts issued"
    )
    .expect("Failed to create BLOCKS_SHARED metric");

    /// Total blocks rejected, labeled by rejection reason.
    pub static ref BLOCKS_REJECTED: CounterVec = register_counter_vec!(
        "consensus_blocks_rejected_total",
        "Total number of blocks rejected",
        &["reason"]
    )
    .expect("Failed to create BLOCKS_REJECTED metric");

    /// Histogram of `submit_block` latency.
    pub static ref SUBMIT_LATENCY: Histogram = register_histogram!(
        "consensus_submit_latency_seconds",
        "Time taken to run the full submit_block pipeline, in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to create SUBMIT_LATENCY metric");

    /// Total individual proofs verified.
    pub static ref PROOFS_VERIFIED: IntCounter = register_int_counter!(
        "consensus_proofs_verified_total",
        "Total number of proof envelopes independently verified"
    )
    .expect("Failed to create PROOFS_VERIFIED metric");
}

/// Record an accepted block.
#[cfg(feature = "metrics")]
pub fn record_block_accepted() {
    BLOCKS_ACCEPTED.inc();
}

/// Record a share-tier receipt.
#[cfg(feature = "metrics")]
pub fn record_block_shared() {
    BLOCKS_SHARED.inc();
}

/// Record a rejected block with reason.
#[cfg(feature = "metrics")]
pub fn record_block_rejected(reason: &str) {
    BLOCKS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record `submit_block` latency.
#[cfg(feature = "metrics")]
pub fn record_submit_latency(seconds: f64) {
    SUBMIT_LATENCY.observe(seconds);
}

/// Record one verified proof.
#[cfg(feature = "metrics")]
pub fn record_proof_verified() {
    PROOFS_VERIFIED.inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_block_accepted() {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_shared() {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_submit_latency(_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_proof_verified() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_harmless_noops_when_disabled() {
        record_block_accepted();
        record_block_shared();
        record_block_rejected("test");
        record_submit_latency(1.0);
        record_proof_verified();
    }
}
