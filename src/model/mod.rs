//! Core data models for a playback session.
//!
//! Defines [`Payload`] (an opaque binary input), [`Track`] and [`Playlist`].
//! A playlist is built once from the user's selection and is read-only after
//! that; track identity is positional.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// User-supplied binary input: a file on disk or bytes already in memory.
#[derive(Debug, Clone)]
pub enum Payload {
    File(PathBuf),
    Memory { name: String, bytes: Arc<[u8]> },
}

impl Payload {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// File name including extension.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Memory { name, .. } => name.clone(),
        }
    }

    /// Base filename without extension, used for lyric pairing.
    pub fn stem(&self) -> Option<String> {
        let path = match self {
            Self::File(path) => path.as_path(),
            Self::Memory { name, .. } => Path::new(name),
        };
        path.file_stem().map(|s| s.to_string_lossy().into_owned())
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let path = match self {
            Self::File(path) => path.as_path(),
            Self::Memory { name, .. } => Path::new(name),
        };
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
    }

    /// Read the whole payload. Blocking for file payloads.
    pub fn read_bytes(&self) -> std::io::Result<Arc<[u8]>> {
        match self {
            Self::File(path) => std::fs::read(path).map(Arc::from),
            Self::Memory { bytes, .. } => Ok(Arc::clone(bytes)),
        }
    }

    /// Read the payload as UTF-8 text, replacing invalid sequences.
    pub fn read_text(&self) -> std::io::Result<String> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// On-disk location, if this payload is a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Memory { .. } => None,
        }
    }
}

/// One playlist entry.
#[derive(Debug, Clone)]
pub struct Track {
    pub audio: Payload,
    pub lyrics: Option<Payload>,
}

impl Track {
    pub fn new(audio: Payload, lyrics: Option<Payload>) -> Self {
        Self { audio, lyrics }
    }

    /// Name shown until metadata supplies a title.
    pub fn display_name(&self) -> String {
        self.audio.stem().unwrap_or_else(|| self.audio.name())
    }
}

/// Images that replace the embedded cover for every track.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cover: Option<Payload>,
    pub background: Option<Payload>,
}

/// Ordered, non-empty sequence of tracks. Insertion order is playback order.
#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
    overrides: Overrides,
}

impl Playlist {
    /// Returns `None` for an empty track list.
    pub fn new(tracks: Vec<Track>) -> Option<Self> {
        if tracks.is_empty() {
            return None;
        }
        Some(Self {
            tracks,
            overrides: Overrides::default(),
        })
    }

    /// Build a playlist from separate music and lyric selections.
    ///
    /// Each audio payload takes the first lyric payload whose base filename
    /// matches its own, ignoring case. Unmatched lyric files are ignored.
    pub fn pair(music: Vec<Payload>, lyrics: Vec<Payload>) -> Option<Self> {
        let tracks = music
            .into_iter()
            .map(|audio| {
                let paired = audio.stem().and_then(|stem| {
                    lyrics
                        .iter()
                        .find(|l| l.stem().is_some_and(|s| s.to_lowercase() == stem.to_lowercase()))
                        .cloned()
                });
                Track::new(audio, paired)
            })
            .collect();
        Self::new(tracks)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_by_base_name() {
        let music = vec![Payload::file("/music/a.mp3"), Payload::file("/music/b.mp3")];
        let lyrics = vec![Payload::file("/lyrics/a.lrc")];

        let playlist = Playlist::pair(music, lyrics).unwrap();

        assert_eq!(playlist.len(), 2);
        let a = playlist.get(0).unwrap();
        assert_eq!(a.audio.name(), "a.mp3");
        assert_eq!(a.lyrics.as_ref().map(|l| l.name()), Some("a.lrc".to_string()));
        let b = playlist.get(1).unwrap();
        assert_eq!(b.audio.name(), "b.mp3");
        assert!(b.lyrics.is_none());
    }

    #[test]
    fn test_pairing_ignores_case_and_keeps_order() {
        let music = vec![
            Payload::memory("Zebra.FLAC", vec![0u8; 4]),
            Payload::memory("alpha.mp3", vec![0u8; 4]),
        ];
        let lyrics = vec![
            Payload::memory("ALPHA.lrc", b"[00:01.00]hi".to_vec()),
            Payload::memory("zebra.lrc", b"[00:02.00]yo".to_vec()),
        ];

        let playlist = Playlist::pair(music, lyrics).unwrap();

        let names: Vec<_> = playlist.tracks().iter().map(|t| t.display_name()).collect();
        assert_eq!(names, vec!["Zebra", "alpha"]);
        assert_eq!(playlist.get(0).unwrap().lyrics.as_ref().unwrap().name(), "zebra.lrc");
        assert_eq!(playlist.get(1).unwrap().lyrics.as_ref().unwrap().name(), "ALPHA.lrc");
    }

    #[test]
    fn test_duplicate_audio_is_not_deduplicated() {
        let music = vec![Payload::file("x.mp3"), Payload::file("x.mp3")];
        let playlist = Playlist::pair(music, Vec::new()).unwrap();
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn test_empty_selection_has_no_playlist() {
        assert!(Playlist::pair(Vec::new(), vec![Payload::file("a.lrc")]).is_none());
        assert!(Playlist::new(Vec::new()).is_none());
    }

    #[test]
    fn test_memory_payload_text() {
        let payload = Payload::memory("song.lrc", b"[00:01.00]caf\xc3\xa9".to_vec());
        assert_eq!(payload.read_text().unwrap(), "[00:01.00]café");
        assert_eq!(payload.extension().as_deref(), Some("lrc"));
        assert!(payload.path().is_none());
    }
}
