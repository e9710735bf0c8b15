//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\tunelight\config.toml
//! - macOS: ~/Library/Application Support/tunelight/config.toml
//! - Linux: ~/.config/tunelight/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded once
//! at startup; `tunelight config --init` writes the defaults out.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lyrics::TimestampPrecision;
use crate::player::EndOfPlaylist;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Track sequencing
    pub playback: PlaybackConfig,

    /// Lyric file handling
    pub lyrics: LyricsConfig,

    /// Spectrum visualizer
    pub visualizer: VisualizerConfig,

    /// Appearance settings
    pub appearance: AppearanceConfig,

    /// Library settings
    pub library: LibraryConfig,
}

/// Playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// What a natural `ended` on the last track does
    pub end_of_playlist: EndOfPlaylist,

    /// Start playing the first track as soon as it is bound
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            end_of_playlist: EndOfPlaylist::Stop,
            autoplay: true,
        }
    }
}

/// Lyric settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Extensions recognised as lyric files (lowercase, no dot)
    pub extensions: Vec<String>,

    /// Keep the fractional part of `[MM:SS.ff]` tags instead of whole seconds
    pub precise_timestamps: bool,
}

impl LyricsConfig {
    pub fn precision(&self) -> TimestampPrecision {
        if self.precise_timestamps {
            TimestampPrecision::Millis
        } else {
            TimestampPrecision::WholeSeconds
        }
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["lrc".to_string()],
            precise_timestamps: false,
        }
    }
}

/// Spectrum visualizer settings.
///
/// The defaults mirror a browser analyser node: 256-point FFT, 128 byte bins,
/// dB window of -100..-30 and 0.8 time smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub enabled: bool,
    pub fft_size: usize,
    /// Snapshot cadence in frames per second
    pub refresh_hz: u32,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl VisualizerConfig {
    /// Interval between two snapshots.
    pub fn cadence(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.refresh_hz.max(1)))
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fft_size: 256,
            refresh_hz: 60,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Appearance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Accent used before any track produced a colour (`#rrggbb`)
    pub fallback_accent: String,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            fallback_accent: "#ffffff".to_string(),
        }
    }
}

/// Library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Extensions picked up by the selection scan (lowercase, no dot)
    pub audio_extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            audio_extensions: ["mp3", "flac", "ogg", "wav", "m4a"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunelight"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to an explicit file.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
