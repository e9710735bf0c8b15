//! Test doubles for the session's collaborators.
//!
//! Every trait seam of the player has a fake here: metadata and colour
//! extraction, the media transport and the render surface. The fakes record
//! what was asked of them so tests can assert on it.
//!
//! # Example
//!
//! ```ignore
//! let (transport, handle) = FakeTransport::new();
//! let (surface, recording) = RecordingSurface::shared();
//! // ... start a session with them
//! handle.emit(TransportEvent::Ended);
//! assert_eq!(recording.last().unwrap().index, 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::loader::{AccentColor, ColorError, ColorExtractor, ResourceId, TransientResource};
use crate::metadata::{ContainerMetadata, MetadataExtractor};
use crate::model::Payload;
use crate::player::{
    FrequencySnapshot, MediaTransport, SignalTap, TransportError, TransportEvent,
    TransportListener,
};
use crate::render::{NowPlaying, RenderSurface, SharedSurface};

/// Metadata keyed by payload name, with optional per-name delays.
#[derive(Debug, Clone, Default)]
pub struct FakeMetadata {
    entries: HashMap<String, ContainerMetadata>,
    delays: HashMap<String, Duration>,
    failing: bool,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every extraction fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, name: &str, metadata: ContainerMetadata) -> Self {
        self.entries.insert(name.to_string(), metadata);
        self
    }

    /// Sleep (on the tokio clock) before answering for `name`.
    pub fn delayed(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }
}

#[async_trait]
impl MetadataExtractor for FakeMetadata {
    async fn extract(&self, audio: &Payload) -> Result<ContainerMetadata> {
        let name = audio.name();
        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing {
            return Err(Error::metadata(name, "fake extraction failure"));
        }
        Ok(self.entries.get(&name).cloned().unwrap_or_default())
    }
}

/// Colour extractor returning a fixed answer and recording its inputs.
#[derive(Debug, Clone)]
pub struct FakeColors {
    color: Option<AccentColor>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl FakeColors {
    pub fn fixed(color: AccentColor) -> Self {
        Self {
            color: Some(color),
            seen: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            color: None,
            seen: Arc::default(),
        }
    }

    /// Names of the images extraction was asked for, in order.
    pub fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl ColorExtractor for FakeColors {
    async fn extract(&self, image: &Payload) -> std::result::Result<AccentColor, ColorError> {
        self.seen.lock().push(image.name());
        self.color.ok_or(ColorError::Empty)
    }
}

/// Calls made on a [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Bind(ResourceId),
    Unbind,
    Play,
    Pause,
    Seek(Duration),
}

#[derive(Debug, Default)]
struct FakeTransportState {
    listener: Option<TransportListener>,
    paused: bool,
    position: Duration,
    duration: Option<Duration>,
    calls: Vec<TransportCall>,
}

/// Transport that confirms play/pause/seek immediately through its listener.
pub struct FakeTransport {
    state: Arc<Mutex<FakeTransportState>>,
    tap: SignalTap,
}

/// Test-side view of a [`FakeTransport`] after it was handed to a session.
#[derive(Clone)]
pub struct FakeTransportHandle {
    state: Arc<Mutex<FakeTransportState>>,
}

impl FakeTransport {
    pub fn new() -> (Self, FakeTransportHandle) {
        let state = Arc::new(Mutex::new(FakeTransportState {
            paused: true,
            ..Default::default()
        }));
        let handle = FakeTransportHandle {
            state: Arc::clone(&state),
        };
        (
            Self {
                state,
                tap: SignalTap::new(4096),
            },
            handle,
        )
    }

    fn emit(state: &FakeTransportState, event: TransportEvent) {
        if let Some(listener) = &state.listener {
            listener.emit(event);
        }
    }
}

impl MediaTransport for FakeTransport {
    fn bind(
        &mut self,
        source: &TransientResource,
        listener: TransportListener,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Bind(source.id()));
        state.listener = Some(listener);
        state.paused = true;
        state.position = Duration::ZERO;
        state.duration = None;
        Ok(())
    }

    fn unbind(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Unbind);
        state.listener = None;
        state.paused = true;
    }

    fn play(&mut self) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.listener.is_none() {
            return Err(TransportError::NotBound);
        }
        state.calls.push(TransportCall::Play);
        state.paused = false;
        Self::emit(&state, TransportEvent::Play);
        Ok(())
    }

    fn pause(&mut self) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.listener.is_none() {
            return Err(TransportError::NotBound);
        }
        state.calls.push(TransportCall::Pause);
        state.paused = true;
        Self::emit(&state, TransportEvent::Pause);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn seek(&mut self, position: Duration) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.listener.is_none() {
            return Err(TransportError::NotBound);
        }
        state.calls.push(TransportCall::Seek(position));
        state.position = position;
        Self::emit(&state, TransportEvent::TimeUpdate(position));
        Ok(())
    }

    fn current_time(&self) -> Duration {
        self.state.lock().position
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }

    fn signal(&self) -> SignalTap {
        self.tap.clone()
    }
}

impl FakeTransportHandle {
    /// Emit an event for the current binding, as the real transport would.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let mut state = self.state.lock();
        match &event {
            TransportEvent::TimeUpdate(position) => state.position = *position,
            TransportEvent::DurationChanged(duration) => state.duration = Some(*duration),
            TransportEvent::Play => state.paused = false,
            TransportEvent::Pause | TransportEvent::Ended => state.paused = true,
        }
        state
            .listener
            .as_ref()
            .is_some_and(|listener| listener.emit(event))
    }

    /// The current listener. Keeping a clone simulates late events from a
    /// binding that has since been replaced.
    pub fn listener(&self) -> Option<TransportListener> {
        self.state.lock().listener.clone()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().listener.is_some()
    }
}

/// What a [`RecordingSurface`] was asked to draw.
#[derive(Clone, Default)]
pub struct Recording {
    views: Arc<Mutex<Vec<NowPlaying>>>,
    spectrum_frames: Arc<AtomicUsize>,
}

impl Recording {
    pub fn views(&self) -> Vec<NowPlaying> {
        self.views.lock().clone()
    }

    pub fn last(&self) -> Option<NowPlaying> {
        self.views.lock().last().cloned()
    }

    pub fn spectrum_frames(&self) -> usize {
        self.spectrum_frames.load(Ordering::SeqCst)
    }
}

pub struct RecordingSurface {
    recording: Recording,
}

impl RecordingSurface {
    pub fn shared() -> (SharedSurface, Recording) {
        let recording = Recording::default();
        let surface: SharedSurface = Arc::new(Mutex::new(RecordingSurface {
            recording: recording.clone(),
        }));
        (surface, recording)
    }
}

impl RenderSurface for RecordingSurface {
    fn present(&mut self, view: &NowPlaying) {
        self.recording.views.lock().push(view.clone());
    }

    fn draw_spectrum(&mut self, _snapshot: &FrequencySnapshot, _accent: AccentColor) {
        self.recording.spectrum_frames.fetch_add(1, Ordering::SeqCst);
    }
}
