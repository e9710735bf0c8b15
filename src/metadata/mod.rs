//! Container metadata reading.
//!
//! Uses the lofty crate for format-independent tag access. Reads title,
//! artist, album, duration and the embedded cover from MP3, FLAC, OGG, M4A
//! and WAV, either from disk or from bytes already in memory.

use async_trait::async_trait;
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::io::Cursor;
use std::time::Duration;

use crate::cover::{CoverArt, extract_embedded_cover};
use crate::error::{Error, Result};
use crate::model::Payload;

/// Fields read from an audio container. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub cover: Option<CoverArt>,
}

/// Reads container metadata from an audio payload.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, audio: &Payload) -> Result<ContainerMetadata>;
}

/// [`MetadataExtractor`] backed by lofty, run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyExtractor;

#[async_trait]
impl MetadataExtractor for LoftyExtractor {
    async fn extract(&self, audio: &Payload) -> Result<ContainerMetadata> {
        let label = audio_label(audio);
        let audio = audio.clone();
        tokio::task::spawn_blocking(move || read(&audio))
            .await
            .map_err(|e| Error::metadata(label, e.to_string()))?
    }
}

/// Read metadata synchronously.
pub fn read(audio: &Payload) -> Result<ContainerMetadata> {
    let tagged_file = probe(audio).map_err(|e| Error::metadata(audio_label(audio), e))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let duration = tagged_file.properties().duration();

    Ok(ContainerMetadata {
        title: tag.and_then(|t| t.title().map(|s| s.to_string())),
        artist: tag.and_then(|t| t.artist().map(|s| s.to_string())),
        album: tag.and_then(|t| t.album().map(|s| s.to_string())),
        duration: (!duration.is_zero()).then_some(duration),
        cover: tag.and_then(extract_embedded_cover),
    })
}

fn probe(audio: &Payload) -> std::result::Result<TaggedFile, String> {
    match audio {
        Payload::File(path) => Probe::open(path)
            .map_err(|e| format!("Failed to open file for probing: {e}"))?
            .read()
            .map_err(|e| format!("Failed to read file metadata: {e}")),
        Payload::Memory { bytes, .. } => Probe::new(Cursor::new(&bytes[..]))
            .guess_file_type()
            .map_err(|e| format!("Failed to guess file type: {e}"))?
            .read()
            .map_err(|e| format!("Failed to read metadata: {e}")),
    }
}

fn audio_label(audio: &Payload) -> std::path::PathBuf {
    match audio {
        Payload::File(path) => path.clone(),
        Payload::Memory { name, .. } => name.into(),
    }
}
