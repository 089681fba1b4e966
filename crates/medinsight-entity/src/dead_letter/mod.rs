//! Records that could not be dead-lettered.

pub mod model;

pub use model::PoisonMessage;
