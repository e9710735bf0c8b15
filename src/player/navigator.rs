//! Playlist position and prev/next transitions.

use serde::{Deserialize, Serialize};

/// What a natural `ended` on the last track does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfPlaylist {
    /// Stay on the last track, stop playing and rewind it.
    #[default]
    Stop,
    /// Restart from the first track.
    Loop,
}

/// Outcome of a track ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    /// Moved to the following track.
    Advanced,
    /// Wrapped to the first track under [`EndOfPlaylist::Loop`].
    Wrapped,
    /// Last track finished under [`EndOfPlaylist::Stop`].
    Finished,
}

/// Current index into a playlist of fixed length.
///
/// The index always satisfies `0 <= index < len`. Explicit navigation never
/// wraps around; only [`Navigator::advance_on_end`] may, and only when the
/// policy asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    len: usize,
    index: usize,
}

impl Navigator {
    /// Returns `None` for an empty playlist.
    pub fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self { len, index: 0 })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.len
    }

    /// Step back. Returns whether the index moved.
    pub fn prev(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Step forward. Returns whether the index moved.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Handle the transport reporting the current track ended.
    pub fn advance_on_end(&mut self, policy: EndOfPlaylist) -> EndAction {
        if self.next() {
            return EndAction::Advanced;
        }
        match policy {
            EndOfPlaylist::Stop => EndAction::Finished,
            EndOfPlaylist::Loop => {
                self.index = 0;
                EndAction::Wrapped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_playlist_has_no_navigator() {
        assert!(Navigator::new(0).is_none());
    }

    #[test]
    fn test_prev_at_start_is_noop() {
        let mut nav = Navigator::new(3).unwrap();
        assert!(!nav.prev());
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_next_at_end_is_noop() {
        let mut nav = Navigator::new(3).unwrap();
        assert!(nav.next());
        assert!(nav.next());
        assert_eq!(nav.index(), 2);

        assert!(!nav.next());
        assert_eq!(nav.index(), 2);
    }

    #[test]
    fn test_prev_next_walk() {
        let mut nav = Navigator::new(2).unwrap();
        assert!(nav.next());
        assert!(nav.is_last());
        assert!(nav.prev());
        assert!(nav.is_first());
    }

    #[test]
    fn test_single_track() {
        let mut nav = Navigator::new(1).unwrap();
        assert!(nav.is_first() && nav.is_last());
        assert!(!nav.next());
        assert!(!nav.prev());
    }

    #[test]
    fn test_end_advances_mid_playlist() {
        let mut nav = Navigator::new(3).unwrap();
        assert_eq!(nav.advance_on_end(EndOfPlaylist::Stop), EndAction::Advanced);
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn test_end_of_playlist_policies() {
        let mut nav = Navigator::new(2).unwrap();
        nav.next();

        assert_eq!(nav.advance_on_end(EndOfPlaylist::Stop), EndAction::Finished);
        assert_eq!(nav.index(), 1);

        assert_eq!(nav.advance_on_end(EndOfPlaylist::Loop), EndAction::Wrapped);
        assert_eq!(nav.index(), 0);
    }
}
