//! Domain layer types and invariants.

pub mod entry;
pub mod error;
pub mod identity;
pub mod scope;
