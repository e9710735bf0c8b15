//! Playback session controller.
//!
//! A [`PlaybackSession`] owns the playlist position, the transport binding,
//! the active track's load pipeline and presentation, the frequency sampler
//! and the play/pause hotkey. All of its state changes happen on the task
//! that runs [`PlaybackSession::run`], in response to one of three inputs:
//!
//! - user [`Command`]s (keys, hotkeys)
//! - [`TransportNotice`]s tagged with the binding they came from
//! - load pipeline results tagged with the [`LoadToken`] they were started for
//!
//! Switching tracks always goes through `release_active` first: cancel the
//! old pipeline, stop the spectrum loop, unbind the transport, then drop the
//! old track record, which revokes its resources. Late results that still
//! arrive for the old track fail the tag check and are dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::hotkeys::{HotkeyGuard, Hotkeys, Key};
use super::navigator::{EndAction, EndOfPlaylist, Navigator};
use super::sampler::FrequencySampler;
use super::state::{PlaybackState, SessionPhase, TrackPresentation};
use super::transport::{
    BindingId, MediaTransport, TransportEvent, TransportListener, TransportNotice,
};
use crate::config::{Config, VisualizerConfig};
use crate::loader::{
    AccentColor, LoadEvent, LoadSink, LoadStep, LoadToken, PipelineHandle, ResourceKind, Tagged,
    TrackLoader, TransientResource,
};
use crate::lyrics::LyricCursor;
use crate::model::Playlist;
use crate::render::{ArtworkView, LyricLine, NowPlaying, SharedSurface};

/// User-level requests to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TogglePlayback,
    Next,
    Previous,
    Seek(Duration),
    SeekForward(Duration),
    SeekBackward(Duration),
    Quit,
}

/// Behaviour knobs, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub end_of_playlist: EndOfPlaylist,
    pub autoplay: bool,
    /// Accent used until the first colour has been extracted
    pub fallback_accent: AccentColor,
    pub visualizer: VisualizerConfig,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let fallback_accent = match config.appearance.fallback_accent.parse() {
            Ok(color) => color,
            Err(e) => {
                warn!(
                    value = %config.appearance.fallback_accent,
                    error = %e,
                    "invalid fallback accent, using white"
                );
                AccentColor::WHITE
            }
        };
        Self {
            end_of_playlist: config.playback.end_of_playlist,
            autoplay: config.playback.autoplay,
            fallback_accent,
            visualizer: config.visualizer.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Collaborators the session drives.
pub struct SessionDeps {
    pub transport: Box<dyn MediaTransport>,
    pub loader: TrackLoader,
    pub surface: SharedSurface,
    pub hotkeys: Hotkeys,
}

/// Result of [`PlaybackSession::start`].
pub enum SessionStart {
    Ready(Box<PlaybackSession>),
    /// No playlist was supplied. The collaborators are handed back untouched
    /// so the caller can run track selection and try again.
    Redirect(SessionDeps),
}

/// Everything that belongs to the currently active track.
struct ActiveTrack {
    token: LoadToken,
    binding: BindingId,
    name: String,
    presentation: TrackPresentation,
    cursor: LyricCursor,
    /// Pipeline steps that have not reported yet
    pending: HashSet<LoadStep>,
    pipeline: PipelineHandle,
    /// Revoked when the track is released
    _audio: TransientResource,
}

enum Input {
    Command(Command),
    Transport(TransportNotice),
    Load(Tagged<LoadEvent>),
}

struct Inbox {
    commands: UnboundedReceiver<Command>,
    notices: UnboundedReceiver<TransportNotice>,
    loads: UnboundedReceiver<Tagged<LoadEvent>>,
}

impl Inbox {
    async fn next(&mut self) -> Option<Input> {
        tokio::select! {
            biased;
            Some(command) = self.commands.recv() => Some(Input::Command(command)),
            Some(notice) = self.notices.recv() => Some(Input::Transport(notice)),
            Some(load) = self.loads.recv() => Some(Input::Load(load)),
            else => None,
        }
    }

    fn try_next(&mut self) -> Option<Input> {
        if let Ok(command) = self.commands.try_recv() {
            return Some(Input::Command(command));
        }
        if let Ok(notice) = self.notices.try_recv() {
            return Some(Input::Transport(notice));
        }
        self.loads.try_recv().ok().map(Input::Load)
    }
}

pub struct PlaybackSession {
    playlist: Playlist,
    navigator: Navigator,
    state: PlaybackState,
    settings: SessionSettings,

    transport: Box<dyn MediaTransport>,
    loader: TrackLoader,
    surface: SharedSurface,
    sampler: Option<FrequencySampler>,
    hotkey: Option<HotkeyGuard>,

    active: Option<ActiveTrack>,
    /// Last extracted accent, kept across tracks
    accent: Option<AccentColor>,
    generation: u64,
    closed: bool,

    commands_tx: UnboundedSender<Command>,
    notices_tx: UnboundedSender<TransportNotice>,
    loads_tx: LoadSink,
    inbox: Inbox,
}

impl PlaybackSession {
    /// Bind the hotkey, attach the analyser and activate the first track.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        playlist: Option<Playlist>,
        deps: SessionDeps,
        settings: SessionSettings,
    ) -> SessionStart {
        let Some((playlist, navigator)) =
            playlist.and_then(|p| Navigator::new(p.len()).map(|n| (p, n)))
        else {
            info!("no playlist supplied, redirecting to track selection");
            return SessionStart::Redirect(deps);
        };

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (notices_tx, notices) = mpsc::unbounded_channel();
        let (loads_tx, loads) = mpsc::unbounded_channel();

        let hotkey = match deps
            .hotkeys
            .bind(Key::Space, Command::TogglePlayback, commands_tx.clone())
        {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "play/pause hotkey unavailable");
                None
            }
        };

        let sampler = if settings.visualizer.enabled {
            match FrequencySampler::attach(&deps.transport.signal(), &settings.visualizer) {
                Ok(sampler) => Some(sampler),
                Err(e) => {
                    warn!(error = %e, "spectrum disabled");
                    None
                }
            }
        } else {
            None
        };

        let state = PlaybackState {
            is_playing: settings.autoplay,
            ..PlaybackState::default()
        };

        info!(tracks = playlist.len(), "playback session started");
        let mut session = Self {
            playlist,
            navigator,
            state,
            settings,
            transport: deps.transport,
            loader: deps.loader,
            surface: deps.surface,
            sampler,
            hotkey,
            active: None,
            accent: None,
            generation: 0,
            closed: false,
            commands_tx,
            notices_tx,
            loads_tx,
            inbox: Inbox {
                commands,
                notices,
                loads,
            },
        };
        session.activate(0);
        SessionStart::Ready(Box::new(session))
    }

    /// Sender for user commands. Stays valid for the life of the session.
    pub fn commands(&self) -> UnboundedSender<Command> {
        self.commands_tx.clone()
    }

    /// Process inputs until [`Command::Quit`], then tear down.
    pub async fn run(mut self) {
        while let Some(input) = self.inbox.next().await {
            if !self.dispatch(input) {
                break;
            }
        }
        self.teardown();
    }

    /// Returns `false` when the session should stop.
    fn dispatch(&mut self, input: Input) -> bool {
        match input {
            Input::Command(command) => return self.handle_command(command),
            Input::Transport(notice) => self.handle_transport(notice),
            Input::Load(tagged) => self.handle_load(tagged),
        }
        true
    }

    fn handle_command(&mut self, command: Command) -> bool {
        if self.closed {
            return false;
        }
        debug!(?command, "command");
        match command {
            Command::TogglePlayback => self.toggle_playback(),
            Command::Next => self.next(),
            Command::Previous => self.prev(),
            Command::Seek(target) => self.seek(target),
            Command::SeekForward(by) => self.seek(self.state.position + by),
            Command::SeekBackward(by) => self.seek(self.state.position.saturating_sub(by)),
            Command::Quit => return false,
        }
        true
    }

    pub fn toggle_playback(&mut self) {
        if self.active.is_none() {
            return;
        }
        let result = if self.transport.is_paused() {
            self.transport.play()
        } else {
            self.transport.pause()
        };
        if let Err(e) = result {
            warn!(error = %e, "play/pause failed");
        }
    }

    /// Go to the following track. Ignored on the last one.
    pub fn next(&mut self) {
        if self.closed {
            return;
        }
        if self.navigator.next() {
            self.activate(self.navigator.index());
        } else {
            debug!("already at the last track");
        }
    }

    /// Go to the preceding track. Ignored on the first one.
    pub fn prev(&mut self) {
        if self.closed {
            return;
        }
        if self.navigator.prev() {
            self.activate(self.navigator.index());
        } else {
            debug!("already at the first track");
        }
    }

    /// Move the playhead, clamped to the known duration.
    pub fn seek(&mut self, target: Duration) {
        if self.active.is_none() {
            return;
        }
        let target = self.state.clamp_position(target);
        if let Err(e) = self.transport.seek(target) {
            warn!(error = %e, "seek failed");
            return;
        }
        self.set_position(target);
        self.present();
    }

    fn activate(&mut self, index: usize) {
        self.release_active();

        let Some(track) = self.playlist.get(index) else {
            error!(index, "track index out of range");
            return;
        };
        self.generation += 1;
        let token = LoadToken {
            index,
            generation: self.generation,
        };
        let binding = BindingId(self.generation);
        let name = track.display_name();
        info!(index, track = %name, "track activated");

        self.state.index = index;
        self.state.position = Duration::ZERO;
        self.state.duration = None;

        let audio = self
            .loader
            .registry()
            .create(ResourceKind::Audio, track.audio.clone(), None);
        let listener = TransportListener::new(binding, self.notices_tx.clone());
        if let Err(e) = self.transport.bind(&audio, listener) {
            error!(track = %name, error = %e, "transport rejected track");
        }

        let pipeline = self.loader.load(
            track,
            self.playlist.overrides(),
            token,
            self.loads_tx.clone(),
        );
        let pending = LoadStep::expected(track.lyrics.is_some())
            .into_iter()
            .collect();

        self.active = Some(ActiveTrack {
            token,
            binding,
            name,
            presentation: TrackPresentation::default(),
            cursor: LyricCursor::empty(),
            pending,
            pipeline,
            _audio: audio,
        });

        if self.state.is_playing
            && let Err(e) = self.transport.play()
        {
            error!(error = %e, "failed to start playback");
        }
        self.present();
    }

    fn release_active(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.pipeline.cancel();
        if let Some(sampler) = self.sampler.as_mut() {
            sampler.stop();
        }
        self.transport.unbind();
        debug!(
            index = active.token.index,
            generation = active.token.generation,
            "track released"
        );
    }

    fn handle_load(&mut self, tagged: Tagged<LoadEvent>) {
        let Tagged { token, event } = tagged;
        let Some(active) = self.active.as_mut().filter(|a| a.token == token) else {
            debug!(
                index = token.index,
                generation = token.generation,
                step = ?event.step(),
                "stale load result dropped"
            );
            return;
        };

        let step = event.step();
        active.pending.remove(&step);
        debug!(index = token.index, ?step, "load step applied");

        let mut accent_changed = false;
        match event {
            LoadEvent::Metadata(info) => active.presentation.info = info,
            LoadEvent::Artwork(artwork) => active.presentation.artwork = artwork,
            LoadEvent::Background(background) => active.presentation.background = background,
            LoadEvent::Accent(accent) => {
                active.presentation.accent = accent;
                if let Some(color) = accent {
                    accent_changed = self.accent != Some(color);
                    self.accent = Some(color);
                }
            }
            LoadEvent::Lyrics(events) => {
                active.cursor = LyricCursor::new(events);
                active.cursor.update(self.state.position);
            }
        }

        if accent_changed && self.sampler.as_ref().is_some_and(|s| s.is_running()) {
            self.start_spectrum();
        }
        self.present();
    }

    fn handle_transport(&mut self, notice: TransportNotice) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if notice.binding != active.binding {
            debug!(binding = notice.binding.0, event = ?notice.event, "stale transport event dropped");
            return;
        }

        match notice.event {
            TransportEvent::TimeUpdate(position) => {
                let position = self.state.clamp_position(position);
                self.set_position(position);
            }
            TransportEvent::DurationChanged(duration) => {
                self.state.duration = Some(duration);
            }
            TransportEvent::Play => {
                self.state.is_playing = true;
                self.start_spectrum();
            }
            TransportEvent::Pause => {
                self.state.is_playing = false;
                if let Some(sampler) = self.sampler.as_mut() {
                    sampler.stop();
                }
            }
            TransportEvent::Ended => {
                self.on_ended();
                return;
            }
        }
        self.present();
    }

    fn on_ended(&mut self) {
        match self.navigator.advance_on_end(self.settings.end_of_playlist) {
            EndAction::Advanced | EndAction::Wrapped => {
                self.state.is_playing = true;
                self.activate(self.navigator.index());
            }
            EndAction::Finished => {
                info!("end of playlist");
                self.state.is_playing = false;
                if let Some(sampler) = self.sampler.as_mut() {
                    sampler.stop();
                }
                if let Err(e) = self.transport.seek(Duration::ZERO) {
                    warn!(error = %e, "failed to rewind last track");
                }
                self.set_position(Duration::ZERO);
                self.present();
            }
        }
    }

    fn set_position(&mut self, position: Duration) {
        self.state.position = position;
        if let Some(active) = self.active.as_mut() {
            active.cursor.update(position);
        }
    }

    fn start_spectrum(&mut self) {
        let accent = self.accent();
        let Some(sampler) = self.sampler.as_mut() else {
            return;
        };
        let surface = Arc::clone(&self.surface);
        sampler.start(move |snapshot| surface.lock().draw_spectrum(&snapshot, accent));
    }

    fn present(&self) {
        if let Some(view) = self.now_playing() {
            self.surface.lock().present(&view);
        }
    }

    /// Current view of the active track.
    pub fn now_playing(&self) -> Option<NowPlaying> {
        let active = self.active.as_ref()?;
        let info = &active.presentation.info;
        Some(NowPlaying {
            index: self.state.index,
            total: self.playlist.len(),
            title: info.title.clone().unwrap_or_else(|| active.name.clone()),
            artist: info.artist.clone(),
            album: info.album.clone(),
            position: self.state.position,
            duration: self.state.duration,
            lyric: active.cursor.current().map(|event| LyricLine {
                primary: event.primary.clone(),
                secondary: event.secondary.clone(),
            }),
            accent: self.accent(),
            is_playing: self.state.is_playing,
            phase: self.phase(),
            artwork: active.presentation.artwork.as_ref().map(|art| ArtworkView {
                id: art.id(),
                payload: art.payload().clone(),
            }),
        })
    }

    pub fn phase(&self) -> SessionPhase {
        if self.closed {
            return SessionPhase::Closed;
        }
        match &self.active {
            None => SessionPhase::Idle,
            Some(active) if !active.pending.is_empty() => SessionPhase::Loading,
            Some(_) if self.state.is_playing => SessionPhase::Playing,
            Some(_) => SessionPhase::Paused,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn presentation(&self) -> Option<&TrackPresentation> {
        self.active.as_ref().map(|a| &a.presentation)
    }

    /// Accent in effect: the last extracted one, or the configured fallback.
    pub fn accent(&self) -> AccentColor {
        self.accent.unwrap_or(self.settings.fallback_accent)
    }

    /// Release the active track, the spectrum loop and the hotkey.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.release_active();
        self.sampler = None;
        self.hotkey = None;
        self.closed = true;
        info!("playback session closed");
    }

    /// Handle every input that is already queued. Returns how many were
    /// handled.
    #[cfg(test)]
    pub(crate) fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(input) = self.inbox.try_next() {
            self.dispatch(input);
            handled += 1;
        }
        handled
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
