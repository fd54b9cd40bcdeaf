#![deny(unsafe_code)]
//! Change classification for the hotswap governance core.
//!
//! This crate provides:
//! - **Classification** of proposed changes ([`ChangeClassifier`], [`Classification`]).
//! - **Schema compatibility** checks ([`check_compatibility`], [`CompatibilityMode`]).
//!
//! Policy for schema subjects: the first version of a subject needs no
//! approval, a candidate with no breaking changes needs no approval, and any
//! breaking change requires approval with the change list attached.

pub mod classifier;
pub mod compatibility;

pub use classifier::{ChangeClassifier, Classification, ClassifierPolicy};
pub use compatibility::{check_compatibility, CompatibilityMode};
