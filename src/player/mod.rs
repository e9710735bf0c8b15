//! Playback session, audio transport and visualization.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  PlaybackSession (tokio task)                   │
//! │  Commands, transport notices and load events on one select loop │
//! └──────────────┬───────────────────────────────┬──────────────────┘
//!                │ MediaTransport                │ TrackLoader
//!                ▼                               ▼
//! ┌──────────────────────────────┐  ┌───────────────────────────────┐
//! │   AudioOutput (decoder thr.) │  │  metadata / lyrics / artwork  │
//! │   cpal callback → device     │  │  steps, cancelled on switch   │
//! └──────────────┬───────────────┘  └───────────────────────────────┘
//!                │ SignalTap
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          FrequencySampler → RenderSurface::draw_spectrum        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod audio;
mod decoder;
mod hotkeys;
mod navigator;
mod resampler;
mod sampler;
mod session;
mod state;
mod transport;
mod visualization;

pub use audio::AudioOutput;
pub use decoder::{AudioDecoder, DecodedFrame};
pub use hotkeys::{HotkeyError, HotkeyGuard, Hotkeys, Key};
pub use navigator::{EndAction, EndOfPlaylist, Navigator};
pub use resampler::{Resampler, remap_channels};
pub use sampler::{FrequencySampler, FrequencySnapshot, SamplerError};
pub use session::{Command, PlaybackSession, SessionDeps, SessionSettings, SessionStart};
pub use state::{
    PlaybackState, SessionPhase, TrackInfo, TrackPresentation, format_clock,
};
pub use transport::{
    BindingId, MediaTransport, TransportError, TransportEvent, TransportListener,
    TransportNotice,
};
pub use visualization::{SignalTap, SpectrumAnalyser};

/// List available audio output devices.
pub fn list_audio_devices() -> Vec<String> {
    use cpal::traits::{DeviceTrait, HostTrait};
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Name of the default output device.
pub fn current_audio_device() -> String {
    use cpal::traits::{DeviceTrait, HostTrait};
    let host = cpal::default_host();
    host.default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_else(|| "Unknown".to_string())
}
