//! Execution queue for the hotswap governance core
//!
//! Accepted changes become [`ExecutionJob`](hotswap_types::ExecutionJob)s
//! drained in FIFO order by one supervised worker into an external
//! [`PipelineExecutor`].
//!
//! - Executor errors are recorded on the job and the worker moves on.
//! - Store errors stop the worker; continuing could lose or repeat work.
//! - On shutdown a claimed job ends completed, failed, or back in the queue.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod queue;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use event::JobEvent;
pub use executor::{ExecutorError, PipelineExecutor};
pub use queue::{ExecutionQueue, ShutdownReport};
