//! Driven ports (outbound dependencies a host injects).

use crate::domain::VendorRoots;
use async_trait::async_trait;

/// Source of pinned hardware/QPU attestation roots, kept outside the
/// core so a host can rotate vendor trust without touching consensus
/// logic.
#[async_trait]
pub trait AttestationRoots: Send + Sync {
    /// The currently trusted roots for the active policy.
    async fn vendor_roots(&self) -> VendorRoots;
}

/// Wall-clock for timestamp-skew checks only — never consulted for
/// scoring or the u-draw, both of which are pure functions of header
/// bytes. Mirrors the teacher's `TimeSource`/`SystemTimeSource` split
/// exactly.
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Default [`Clock`] backed by `std::time::SystemTime`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
