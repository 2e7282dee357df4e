//! CLI Module Organization
//!
//! - args: clap argument structures
//! - commands: command execution
//! - logging: tracing subscriber setup from the notification channels
//! - output: coloured console rendering

pub mod args;
pub mod commands;
pub mod logging;
pub mod output;

pub use args::*;
pub use commands::*;
