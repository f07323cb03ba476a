//! # Animica Types Crate
//!
//! Primitive types shared by the consensus core and its collaborators:
//! hashes, addresses, chain/policy identifiers, and the micro-nat
//! fixed-point unit. This is the single source of truth for cross-crate
//! type definitions; it intentionally does not reach into execution,
//! networking, or storage concerns.

pub mod entities;

pub use entities::*;
