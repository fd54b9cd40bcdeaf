//! Hotswap Types - Core types for change governance
//!
//! Hotswap is the governance-and-execution core of the fleet hot-swap
//! platform. Module and schema changes are classified, gated on human
//! approval where required, and then handed to a supervised execution queue.
//!
//! ## Key Concepts
//!
//! - **ProposedChange**: A change to a subject (schema, module, migration)
//! - **ApprovalRequest**: Lifecycle record for a change awaiting sign-off
//! - **ExecutionJob**: A unit of accepted work owned by the execution queue
//! - **CompatibilityVerdict**: Breaking changes found between two schema versions

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod approval;
pub mod change;
pub mod compat;
pub mod ids;
pub mod job;

// Re-export main types
pub use approval::{
    ApprovalDecision, ApprovalDetails, ApprovalLevel, ApprovalRequest, ApprovalStatus, Verdict,
};
pub use change::{ChangeBody, ProposedChange, RiskTier, SubjectKind};
pub use compat::{
    BreakingChange, BreakingChangeKind, CompatibilityVerdict, FieldDef, FieldType,
    SchemaDefinition,
};
pub use ids::{ApprovalId, JobId, SubjectId};
pub use job::{ExecutionJob, JobStatus};
