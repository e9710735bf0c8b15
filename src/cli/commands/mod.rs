//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `play`: the terminal player (default)
//! - `inspect`: metadata, accent colour and lyric checks
//! - `config`: configuration file and audio device info

mod config;
mod inspect;
mod play;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use config::{cmd_config, cmd_devices};
pub use inspect::{cmd_inspect, cmd_lyrics};
pub use play::{PlayArgs, cmd_play};

/// Tunelight CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "TUNELIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for report commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Play audio files (the default when no subcommand is given)
    Play {
        /// Audio and lyric files; lyrics pair with audio by file name
        files: Vec<PathBuf>,
        /// Additional lyric files
        #[arg(short, long)]
        lyrics: Vec<PathBuf>,
        /// Image shown as the cover of every track
        #[arg(long)]
        cover: Option<PathBuf>,
        /// Image used as background and accent colour source
        #[arg(long)]
        background: Option<PathBuf>,
        /// Directory scanned when no audio files are given
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Show extracted metadata and accent colour of an audio file
    Inspect {
        /// Path to the audio file
        path: PathBuf,
        /// Image to extract the accent colour from instead of the cover
        #[arg(long)]
        background: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Parse a lyric file and show its events
    Lyrics {
        /// Path to the lyric file
        path: PathBuf,
        /// Show the line active at this many seconds
        #[arg(long)]
        at: Option<f64>,
        /// Keep fractional seconds in timestamps
        #[arg(long)]
        precise: bool,
    },
    /// Show or initialise the configuration file
    Config {
        /// Write the default configuration if no file exists
        #[arg(long)]
        init: bool,
    },
    /// List audio output devices
    Devices,
}

/// Run the specified CLI command. No subcommand starts the player.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => crate::config::load_from(path),
        None => crate::config::load(),
    };
    let rt = Runtime::new()?;

    match cli.command {
        None => cmd_play(&rt, &config, PlayArgs::default()),
        Some(Commands::Play {
            files,
            lyrics,
            cover,
            background,
            dir,
        }) => cmd_play(
            &rt,
            &config,
            PlayArgs {
                files,
                lyrics,
                cover,
                background,
                dir,
            },
        ),
        Some(Commands::Inspect {
            path,
            background,
            format,
        }) => cmd_inspect(&rt, &path, background.as_deref(), format),
        Some(Commands::Lyrics { path, at, precise }) => cmd_lyrics(&config, &path, at, precise),
        Some(Commands::Config { init }) => cmd_config(&config, cli.config.as_deref(), init),
        Some(Commands::Devices) => cmd_devices(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["tunelight"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_play_arguments() {
        let cli = Cli::try_parse_from([
            "tunelight",
            "play",
            "a.mp3",
            "a.lrc",
            "--lyrics",
            "b.lrc",
            "--background",
            "bg.png",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Play {
                files,
                lyrics,
                background,
                cover,
                dir,
            }) => {
                assert_eq!(files, vec![PathBuf::from("a.mp3"), PathBuf::from("a.lrc")]);
                assert_eq!(lyrics, vec![PathBuf::from("b.lrc")]);
                assert_eq!(background, Some(PathBuf::from("bg.png")));
                assert!(cover.is_none());
                assert!(dir.is_none());
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_inspect_format() {
        let cli = Cli::try_parse_from(["tunelight", "inspect", "a.mp3", "--format", "json"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Inspect {
                format: Format::Json,
                ..
            })
        ));
    }
}
