//! Track selection: turn a directory into a playlist.
//!
//! The player falls back to this when it is started without files.

use crate::config::{LibraryConfig, LyricsConfig};
use crate::model::{Overrides, Payload, Playlist};
use crate::scanner;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Music and lyric files found under a root, each sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub music: Vec<PathBuf>,
    pub lyrics: Vec<PathBuf>,
}

impl Selection {
    /// Split explicit file arguments into music and lyrics by extension.
    /// Anything else is ignored.
    pub fn from_files(
        files: impl IntoIterator<Item = PathBuf>,
        library: &LibraryConfig,
        lyrics: &LyricsConfig,
    ) -> Self {
        let mut selection = Self::default();
        for path in files {
            match scanner::extension_of(&path) {
                Some(ext) if lyrics.extensions.contains(&ext) => selection.lyrics.push(path),
                Some(ext) if library.audio_extensions.contains(&ext) => {
                    selection.music.push(path)
                }
                _ => debug!(path = %path.display(), "ignoring unrecognised file"),
            }
        }
        selection
    }

    pub fn is_empty(&self) -> bool {
        self.music.is_empty()
    }

    /// Pair lyrics to music by base filename. `None` without music.
    pub fn into_playlist(self, overrides: Overrides) -> Option<Playlist> {
        let music = self.music.into_iter().map(Payload::file).collect();
        let lyrics = self.lyrics.into_iter().map(Payload::file).collect();
        Playlist::pair(music, lyrics).map(|p| p.with_overrides(overrides))
    }
}

/// Scan `root` recursively for music and lyric files.
pub async fn select(root: PathBuf, library: &LibraryConfig, lyrics: &LyricsConfig) -> Selection {
    let mut extensions: HashSet<String> = library.audio_extensions.iter().cloned().collect();
    extensions.extend(lyrics.extensions.iter().cloned());

    info!(root = %root.display(), "scanning for tracks");
    let found: Vec<PathBuf> = scanner::scan(root, extensions).collect().await;

    let mut selection = Selection::from_files(found, library, lyrics);
    selection.music.sort();
    selection.lyrics.sort();
    info!(
        music = selection.music.len(),
        lyrics = selection.lyrics.len(),
        "selection complete"
    );
    selection
}
