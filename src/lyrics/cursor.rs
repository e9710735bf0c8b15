//! Maps a playback position to the active lyric line.

use std::time::Duration;

use super::LyricEvent;

/// Index of the event active at `now`.
///
/// The active event is the one just before the first event (other than the
/// first) whose time is strictly after `now`; when no such event exists the
/// last event is active. Positions before the first event still resolve to
/// index 0. Empty input has no active event.
pub fn active_index(events: &[LyricEvent], now: Duration) -> Option<usize> {
    if events.is_empty() {
        return None;
    }
    match events.iter().skip(1).position(|e| now < e.time) {
        Some(boundary) => Some(boundary),
        None => Some(events.len() - 1),
    }
}

/// Lyric state of exactly one track.
///
/// The cursor owns its event sequence, so an index can never outlive the
/// sequence it was computed against: a track change builds a new cursor.
#[derive(Debug, Clone, Default)]
pub struct LyricCursor {
    events: Vec<LyricEvent>,
    active: Option<usize>,
}

impl LyricCursor {
    pub fn new(events: Vec<LyricEvent>) -> Self {
        Self {
            events,
            active: None,
        }
    }

    /// A cursor with nothing to display.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Recompute from the latest position. Returns `true` when the active
    /// line changed.
    pub fn update(&mut self, now: Duration) -> bool {
        let next = active_index(&self.events, now);
        let changed = next != self.active;
        self.active = next;
        changed
    }

    pub fn current(&self) -> Option<&LyricEvent> {
        self.active.and_then(|i| self.events.get(i))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn events(&self) -> &[LyricEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
