//! `Riposte` - Timed defense window arbitration engine
//!
//! When an actor attacks, the defender gets a bounded reaction window sized
//! by their power rank. A counter attempt inside the window is graded by how
//! fast it came; a window nobody answers expires with a default verdict.
//! Every window reaches exactly one terminal outcome.

pub mod arbiter;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod window;

pub use engine::{DefenseEngine, EngineStats};
