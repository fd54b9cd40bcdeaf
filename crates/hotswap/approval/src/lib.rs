#![deny(unsafe_code)]
//! Approval gate for the hotswap governance core.
//!
//! This crate provides:
//! - **The gate** ([`ApprovalGate`]): request, decide, wait and sweep.
//! - **Notification sinks** ([`NotificationSink`], [`NoopNotifier`], [`LogNotifier`]).
//! - **The sweeper** ([`Sweeper`]): periodic expiry of overdue requests.
//!
//! Human decisions, deadline expiry inside a wait and sweeps can race on the
//! same subject. Each is a conditional update on the stored status, so one
//! of them records the transition and the others get a typed error (or, for
//! waits, the winning record).

pub mod config;
pub mod error;
pub mod gate;
pub mod notify;
pub mod sweeper;

pub use config::GateConfig;
pub use error::{ApprovalError, Result};
pub use gate::{ApprovalGate, NewApproval, SYSTEM_ACTOR, TIMEOUT_REASON};
pub use notify::{ApprovalNotification, LogNotifier, NoopNotifier, NotificationSink, NotifyError};
pub use sweeper::Sweeper;
