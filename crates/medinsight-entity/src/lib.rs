//! # medinsight-entity
//!
//! Records persisted by the pipeline's consumers. Every struct here is a
//! table row; all derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! `sqlx::FromRow`.

pub mod audit;
pub mod dead_letter;
pub mod delivery;
pub mod notification;
