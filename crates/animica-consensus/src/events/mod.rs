//! Events emitted by the consensus core.

pub use crate::domain::fork_choice::{NullifierDelta, TipChanged};
