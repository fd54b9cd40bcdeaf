//! Hotswap daemon library
//!
//! This module provides the pieces `hotswapd` is assembled from:
//! - Configuration loading
//! - The dry-run pipeline executor
//! - Server wiring and lifecycle management

pub mod config;
pub mod error;
pub mod executor;
pub mod server;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use executor::DryRunExecutor;
pub use server::Server;
