//! Command-line interface
//!
//! Argument definitions and command handlers for the `riposte` binary.

pub mod args;
pub mod commands;
