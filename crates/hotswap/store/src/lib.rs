//! Storage layer for the hotswap governance core
//!
//! Persisted approval and job records are the single source of truth.
//! Every approval transition goes through [`ApprovalStore::compare_and_swap`]
//! or [`ApprovalStore::expire_overdue`], both conditional on the current
//! status, so concurrent mutators cannot both succeed.

#![deny(unsafe_code)]

mod error;
mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{ApprovalStore, JobStore, Store, SwapOutcome};
