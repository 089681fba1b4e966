//! # medinsight-core
//!
//! Core crate for the MedInsight event pipeline. Contains configuration
//! schemas, the audit and notification event wire types, typed
//! identifiers, pagination types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MedInsight crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
