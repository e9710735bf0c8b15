//! Tunelight - a terminal playlist player with synced lyrics.
//!
//! Plays a list of audio files with paired LRC lyrics, cover art, an accent
//! colour taken from the artwork and a live spectrum. Run without arguments
//! to pick up the tracks in the current directory.

pub mod cli;
pub mod config;
pub mod cover;
pub mod error;
pub mod library;
pub mod loader;
pub mod lyrics;
pub mod metadata;
pub mod model;
pub mod player;
pub mod render;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so they stay out of the player view
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tunelight=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(args)
}
