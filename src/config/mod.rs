//! Configuration module
//!
//! Loads and validates the engine configuration: monitor tick, reminder
//! thresholds, rank table, and arbitration seed.

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::EngineConfig;
pub use validation::{ValidationResult, Validator};
