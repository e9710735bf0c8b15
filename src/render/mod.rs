//! What the session shows, and where it shows it.
//!
//! The session controller builds a [`NowPlaying`] view after every state
//! change and hands it to a [`RenderSurface`]. Spectrum frames go through the
//! same surface from the sampler's render loop.

mod terminal;

pub use terminal::TerminalSurface;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::loader::{AccentColor, ResourceId};
use crate::model::Payload;
use crate::player::{FrequencySnapshot, SessionPhase, format_clock};

/// Scale from analyser byte to bar height.
pub const BAR_HEIGHT_SCALE: f32 = 0.75;
/// Bar width relative to an even split of the surface.
pub const BAR_WIDTH_SCALE: f32 = 1.5;
/// Gap between two bars.
pub const BAR_GAP: f32 = 1.0;

/// Drawing target for the playback session.
pub trait RenderSurface: Send {
    fn present(&mut self, view: &NowPlaying);

    fn draw_spectrum(&mut self, snapshot: &FrequencySnapshot, accent: AccentColor);
}

/// A surface shared between the session and the sampler's render loop.
pub type SharedSurface = Arc<Mutex<dyn RenderSurface>>;

/// The active lyric line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Image shown for the active track.
#[derive(Debug, Clone)]
pub struct ArtworkView {
    /// Changes whenever the image does
    pub id: ResourceId,
    pub payload: Payload,
}

/// Snapshot of everything visible for the active track.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub lyric: Option<LyricLine>,
    pub accent: AccentColor,
    pub is_playing: bool,
    pub phase: SessionPhase,
    pub artwork: Option<ArtworkView>,
}

impl NowPlaying {
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(d) if !d.is_zero() => (self.position.as_secs_f64() / d.as_secs_f64()).min(1.0),
            _ => 0.0,
        }
    }

    /// `MM:SS / MM:SS`, with `--:--` while the duration is unknown.
    pub fn clock(&self) -> String {
        let total = self
            .duration
            .map(format_clock)
            .unwrap_or_else(|| "--:--".to_string());
        format!("{} / {}", format_clock(self.position), total)
    }
}

/// One spectrum bar in surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub width: f32,
    pub height: f32,
}

/// Lay out one bar per magnitude, left to right.
///
/// Bars are `width / bins * 1.5` wide with a one unit gap, so the tail of a
/// dense snapshot runs past the right edge and is clipped by the surface.
pub fn layout_bars(magnitudes: &[u8], width: f32) -> Vec<Bar> {
    if magnitudes.is_empty() {
        return Vec::new();
    }
    let bar_width = width / magnitudes.len() as f32 * BAR_WIDTH_SCALE;
    let mut x = 0.0;
    magnitudes
        .iter()
        .map(|&m| {
            let bar = Bar {
                x,
                width: bar_width,
                height: f32::from(m) * BAR_HEIGHT_SCALE,
            };
            x += bar_width + BAR_GAP;
            bar
        })
        .collect()
}
