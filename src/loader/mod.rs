//! Per-track asynchronous load pipeline.
//!
//! [`TrackLoader::load`] starts the work for one track and returns a
//! [`PipelineHandle`]. Two tasks run concurrently:
//!
//! - **presentation**: container metadata, then artwork, then the background
//!   image and the accent colour derived from it
//! - **lyrics**: read the lyric payload and parse it
//!
//! Every result is sent as a [`Tagged`] event carrying the [`LoadToken`] the
//! pipeline was started for. The receiver compares the token with the active
//! one and drops anything stale; transient resources inside a dropped event
//! are revoked by their guards. Failures inside a step are logged and degrade
//! to an empty value, they never abort the pipeline.

mod color;
mod resources;

pub use color::{AccentColor, ColorError, ColorExtractor, PaletteExtractor, light_muted_from_bytes};
pub use resources::{
    RegistryStats, ResourceId, ResourceKind, ResourceRegistry, TransientResource,
};

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cover::resolve_image;
use crate::lyrics::{self, LyricEvent, TimestampPrecision};
use crate::metadata::{ContainerMetadata, MetadataExtractor};
use crate::model::{Overrides, Payload, Track};
use crate::player::TrackInfo;

/// Identifies one activation of one track.
///
/// The generation is bumped on every activation, so navigating away from a
/// track and back produces a different token for the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken {
    pub index: usize,
    pub generation: u64,
}

/// A value tagged with the activation it was produced for.
#[derive(Debug)]
pub struct Tagged<T> {
    pub token: LoadToken,
    pub event: T,
}

/// One resolved pipeline step.
#[derive(Debug)]
pub enum LoadEvent {
    Metadata(TrackInfo),
    Artwork(Option<TransientResource>),
    Background(Option<TransientResource>),
    Accent(Option<AccentColor>),
    Lyrics(Vec<LyricEvent>),
}

impl LoadEvent {
    pub fn step(&self) -> LoadStep {
        match self {
            Self::Metadata(_) => LoadStep::Metadata,
            Self::Artwork(_) => LoadStep::Artwork,
            Self::Background(_) => LoadStep::Background,
            Self::Accent(_) => LoadStep::Accent,
            Self::Lyrics(_) => LoadStep::Lyrics,
        }
    }
}

/// Name of a pipeline step, for tracking what is still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    Metadata,
    Artwork,
    Background,
    Accent,
    Lyrics,
}

impl LoadStep {
    /// Steps a pipeline reports for a track.
    pub fn expected(has_lyrics: bool) -> Vec<LoadStep> {
        let mut steps = vec![Self::Metadata, Self::Artwork, Self::Background, Self::Accent];
        if has_lyrics {
            steps.push(Self::Lyrics);
        }
        steps
    }
}

/// Where tagged events are delivered.
pub type LoadSink = UnboundedSender<Tagged<LoadEvent>>;

/// Running pipeline of one track. Dropping it aborts the tasks.
#[derive(Debug)]
pub struct PipelineHandle {
    token: LoadToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn token(&self) -> LoadToken {
        self.token
    }

    /// Abort every task that has not finished yet.
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        debug!(index = self.token.index, generation = self.token.generation, "pipeline cancelled");
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Starts load pipelines. Cheap to clone.
#[derive(Clone)]
pub struct TrackLoader {
    metadata: Arc<dyn MetadataExtractor>,
    colors: Arc<dyn ColorExtractor>,
    registry: ResourceRegistry,
    precision: TimestampPrecision,
}

impl TrackLoader {
    pub fn new(
        metadata: Arc<dyn MetadataExtractor>,
        colors: Arc<dyn ColorExtractor>,
        registry: ResourceRegistry,
        precision: TimestampPrecision,
    ) -> Self {
        Self {
            metadata,
            colors,
            registry,
            precision,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Start loading `track`. Must be called within a tokio runtime.
    pub fn load(
        &self,
        track: &Track,
        overrides: &Overrides,
        token: LoadToken,
        sink: LoadSink,
    ) -> PipelineHandle {
        debug!(index = token.index, generation = token.generation, "pipeline started");

        let mut tasks = vec![tokio::spawn(present(
            Arc::clone(&self.metadata),
            Arc::clone(&self.colors),
            self.registry.clone(),
            track.audio.clone(),
            overrides.clone(),
            Emitter { token, sink: sink.clone() },
        ))];

        if let Some(lyrics) = &track.lyrics {
            tasks.push(tokio::spawn(read_lyrics(
                lyrics.clone(),
                self.precision,
                Emitter { token, sink },
            )));
        }

        PipelineHandle { token, tasks }
    }
}

struct Emitter {
    token: LoadToken,
    sink: LoadSink,
}

impl Emitter {
    /// Returns `false` once the receiver is gone.
    fn emit(&self, event: LoadEvent) -> bool {
        self.sink
            .send(Tagged {
                token: self.token,
                event,
            })
            .is_ok()
    }
}

async fn present(
    metadata: Arc<dyn MetadataExtractor>,
    colors: Arc<dyn ColorExtractor>,
    registry: ResourceRegistry,
    audio: Payload,
    overrides: Overrides,
    out: Emitter,
) {
    let meta = match metadata.extract(&audio).await {
        Ok(meta) => meta,
        Err(e) => {
            warn!(track = %audio.name(), error = %e, "metadata unavailable");
            ContainerMetadata::default()
        }
    };

    let info = TrackInfo {
        title: meta.title,
        artist: meta.artist,
        album: meta.album,
    };
    if !out.emit(LoadEvent::Metadata(info)) {
        return;
    }

    let artwork = resolve_image(overrides.cover.as_ref(), meta.cover.as_ref())
        .map(|img| registry.create(ResourceKind::Artwork, img.payload, img.mime_type));
    if !out.emit(LoadEvent::Artwork(artwork)) {
        return;
    }

    let background = resolve_image(overrides.background.as_ref(), meta.cover.as_ref());
    let accent_source = background.as_ref().map(|img| img.payload.clone());
    let background =
        background.map(|img| registry.create(ResourceKind::Background, img.payload, img.mime_type));
    if !out.emit(LoadEvent::Background(background)) {
        return;
    }

    let accent = match accent_source {
        Some(image) => match colors.extract(&image).await {
            Ok(color) => Some(color),
            Err(e) => {
                warn!(image = %image.name(), error = %e, "accent colour unavailable");
                None
            }
        },
        None => None,
    };
    out.emit(LoadEvent::Accent(accent));
}

async fn read_lyrics(payload: Payload, precision: TimestampPrecision, out: Emitter) {
    let name = payload.name();
    let text = tokio::task::spawn_blocking(move || payload.read_text()).await;

    let events = match text {
        Ok(Ok(text)) => lyrics::parse_with(&text, precision),
        Ok(Err(e)) => {
            warn!(lyrics = %name, error = %e, "failed to read lyrics");
            Vec::new()
        }
        Err(e) => {
            warn!(lyrics = %name, error = %e, "lyrics task failed");
            Vec::new()
        }
    };
    debug!(lyrics = %name, lines = events.len(), "lyrics parsed");
    out.emit(LoadEvent::Lyrics(events));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::CoverArt;
    use crate::test_utils::{FakeColors, FakeMetadata};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn loader(metadata: FakeMetadata, colors: FakeColors, registry: &ResourceRegistry) -> TrackLoader {
        TrackLoader::new(
            Arc::new(metadata),
            Arc::new(colors),
            registry.clone(),
            TimestampPrecision::WholeSeconds,
        )
    }

    fn token(index: usize) -> LoadToken {
        LoadToken { index, generation: 1 }
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<Tagged<LoadEvent>>, n: usize) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.push(rx.recv().await.unwrap().event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_pipeline_with_embedded_cover() {
        let registry = ResourceRegistry::new();
        let meta = ContainerMetadata {
            title: Some("Song".into()),
            artist: Some("Band".into()),
            cover: Some(CoverArt {
                data: vec![1u8, 2, 3].into(),
                mime_type: "image/png".into(),
            }),
            ..Default::default()
        };
        let loader = loader(
            FakeMetadata::new().with("song.mp3", meta),
            FakeColors::fixed(AccentColor::rgb(1, 2, 3)),
            &registry,
        );
        let track = Track::new(
            Payload::memory("song.mp3", vec![0u8]),
            Some(Payload::memory("song.lrc", b"[00:01.00]hi\n[00:01.50]salut".to_vec())),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _handle = loader.load(&track, &Overrides::default(), token(0), tx);
        let events = collect(&mut rx, 5).await;

        let steps: Vec<_> = events.iter().map(LoadEvent::step).collect();
        for step in LoadStep::expected(true) {
            assert!(steps.contains(&step), "missing {step:?}");
        }
        for event in &events {
            match event {
                LoadEvent::Metadata(info) => assert_eq!(info.title.as_deref(), Some("Song")),
                LoadEvent::Artwork(art) => {
                    assert_eq!(art.as_ref().unwrap().mime_type(), Some("image/png"))
                }
                LoadEvent::Background(bg) => assert!(bg.is_some()),
                LoadEvent::Accent(color) => assert_eq!(*color, Some(AccentColor::rgb(1, 2, 3))),
                LoadEvent::Lyrics(lines) => {
                    assert_eq!(lines.len(), 1);
                    assert_eq!(lines[0].secondary.as_deref(), Some("salut"));
                }
            }
        }
        assert_eq!(registry.stats().live, 2);
        drop(events);
        assert_eq!(registry.stats().live, 0);
    }

    #[tokio::test]
    async fn test_background_override_feeds_accent() {
        let registry = ResourceRegistry::new();
        let colors = FakeColors::fixed(AccentColor::rgb(9, 9, 9));
        let seen = colors.seen();
        let loader = loader(FakeMetadata::new(), colors, &registry);
        let overrides = Overrides {
            cover: None,
            background: Some(Payload::memory("bg.jpg", vec![7u8])),
        };
        let track = Track::new(Payload::memory("a.mp3", vec![0u8]), None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _handle = loader.load(&track, &overrides, token(0), tx);
        let events = collect(&mut rx, 4).await;

        assert!(matches!(events[1], LoadEvent::Artwork(None)));
        assert!(matches!(events[2], LoadEvent::Background(Some(_))));
        assert!(matches!(events[3], LoadEvent::Accent(Some(_))));
        assert_eq!(seen.lock().as_slice(), ["bg.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty_values() {
        let registry = ResourceRegistry::new();
        let loader = loader(
            FakeMetadata::failing(),
            FakeColors::failing(),
            &registry,
        );
        let overrides = Overrides {
            cover: Some(Payload::memory("c.png", vec![1u8])),
            background: Some(Payload::memory("b.png", vec![1u8])),
        };
        let track = Track::new(
            Payload::memory("a.mp3", vec![0u8]),
            Some(Payload::file("/nonexistent/a.lrc")),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _handle = loader.load(&track, &overrides, token(3), tx);
        let events = collect(&mut rx, 5).await;

        for event in &events {
            match event {
                LoadEvent::Metadata(info) => assert_eq!(*info, TrackInfo::default()),
                LoadEvent::Artwork(art) => assert!(art.is_some()),
                LoadEvent::Background(bg) => assert!(bg.is_some()),
                LoadEvent::Accent(color) => assert!(color.is_none()),
                LoadEvent::Lyrics(lines) => assert!(lines.is_empty()),
            }
        }
    }

    #[tokio::test]
    async fn test_events_carry_token() {
        let registry = ResourceRegistry::new();
        let loader = loader(FakeMetadata::new(), FakeColors::failing(), &registry);
        let track = Track::new(Payload::memory("a.mp3", vec![0u8]), None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tag = LoadToken { index: 4, generation: 17 };

        let _handle = loader.load(&track, &Overrides::default(), tag, tx);
        for _ in 0..4 {
            assert_eq!(rx.recv().await.unwrap().token, tag);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_slow_pipeline() {
        let registry = ResourceRegistry::new();
        let loader = loader(
            FakeMetadata::new().delayed("slow.mp3", Duration::from_secs(10)),
            FakeColors::failing(),
            &registry,
        );
        let track = Track::new(Payload::memory("slow.mp3", vec![0u8]), None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handle = loader.load(&track, &Overrides::default(), token(0), tx);
        tokio::task::yield_now().await;
        handle.cancel();

        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(registry.stats().created, 0);
    }

    #[tokio::test]
    async fn test_closed_sink_stops_pipeline() {
        let registry = ResourceRegistry::new();
        let loader = loader(FakeMetadata::new(), FakeColors::failing(), &registry);
        let overrides = Overrides {
            cover: Some(Payload::memory("c.png", vec![1u8])),
            background: None,
        };
        let track = Track::new(Payload::memory("a.mp3", vec![0u8]), None);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let handle = loader.load(&track, &overrides, token(0), tx);
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }

        let stats = registry.stats();
        assert_eq!(stats.created, stats.revoked);
        assert_eq!(stats.invalid_revokes, 0);
    }
}
