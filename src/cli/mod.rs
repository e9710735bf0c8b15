//! Command-line interface for tunelight.
//!
//! The default command opens the terminal player; the others inspect files
//! and configuration without starting playback.

mod commands;

pub use commands::{Cli, Commands, Format, run_command};
