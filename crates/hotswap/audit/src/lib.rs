//! Hotswap Audit
//!
//! Tamper-evident audit trail for governance transitions. Every entry
//! carries the hash of its predecessor, so removing or editing an entry
//! breaks verification of everything after it.
//!
//! - [`AuditEntry`]: a single hash-chained event
//! - [`AuditSink`]: append-only sink trait, with memory and JSON-lines backends
//! - [`verify_chain`]: integrity check over a sequence of entries

pub mod entry;
pub mod error;
pub mod integrity;
pub mod sink;

pub use entry::{AuditEntry, AuditEvent, AuditOutcome, PartialAuditEntry};
pub use error::{AuditError, Result};
pub use integrity::{verify_chain, ChainVerification, ChainViolation, IntegrityChain};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};
