#![deny(unsafe_code)]
//! Orchestration facade for the hotswap governance core.
//!
//! [`Orchestrator::submit`] is the entry point other subsystems call: it
//! classifies a change, gates it on approval when needed, and hands approved
//! changes to the execution queue.

pub mod error;
pub mod orchestrator;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SubmitOutcome, Submission};
