//! Playback state and presentation types.

use std::time::Duration;

use crate::loader::{AccentColor, TransientResource};

/// Where the session controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No track bound yet.
    #[default]
    Idle,
    /// Track activated, load pipeline still in flight.
    Loading,
    Playing,
    Paused,
    /// Torn down; every listener and resource released.
    Closed,
}

/// Transport-facing state of the session.
///
/// Only the session controller writes this, in response to transport events
/// or explicit navigation and seek calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    /// Current playlist index
    pub index: usize,
    /// Current position in the track
    pub position: Duration,
    /// Total duration, once the transport knows it
    pub duration: Option<Duration>,
    /// Mirrors the transport's play/pause notifications
    pub is_playing: bool,
}

impl PlaybackState {
    /// Clamp a seek target to the known duration.
    pub fn clamp_position(&self, target: Duration) -> Duration {
        match self.duration {
            Some(d) => target.min(d),
            None => target,
        }
    }
}

/// Format a duration as MM:SS. Minutes are not wrapped into hours.
pub fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Container metadata shown for the active track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Everything the load pipeline produced for the active track.
///
/// Built empty on activation and filled field by field; dropped as a whole
/// on the next track change, which revokes the artwork and background.
#[derive(Debug, Default)]
pub struct TrackPresentation {
    pub info: TrackInfo,
    pub artwork: Option<TransientResource>,
    pub background: Option<TransientResource>,
    pub accent: Option<AccentColor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::ZERO), "00:00");
        assert_eq!(format_clock(Duration::from_millis(65_900)), "01:05");
        assert_eq!(format_clock(Duration::from_secs(3661)), "61:01");
    }

    #[test]
    fn test_clamp_position() {
        let mut state = PlaybackState::default();
        assert_eq!(state.clamp_position(Duration::from_secs(500)), Duration::from_secs(500));

        state.duration = Some(Duration::from_secs(200));
        assert_eq!(state.clamp_position(Duration::from_secs(500)), Duration::from_secs(200));
        assert_eq!(state.clamp_position(Duration::from_secs(20)), Duration::from_secs(20));
    }
}
