//! The terminal player.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::library::{self, Selection};
use crate::loader::{PaletteExtractor, ResourceRegistry, TrackLoader};
use crate::metadata::LoftyExtractor;
use crate::model::{Overrides, Payload};
use crate::player::{
    AudioOutput, Command, Hotkeys, Key, PlaybackSession, SessionDeps, SessionSettings,
    SessionStart,
};
use crate::render::{SharedSurface, TerminalSurface};

/// Seek step for the arrow keys.
const SEEK_STEP: Duration = Duration::from_secs(5);
/// How long the input thread waits for a key before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Files picked on the command line.
#[derive(Debug, Clone, Default)]
pub struct PlayArgs {
    pub files: Vec<PathBuf>,
    pub lyrics: Vec<PathBuf>,
    pub cover: Option<PathBuf>,
    pub background: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

/// What a key press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Routed through the hotkey registry
    Hotkey(Key),
    Command(Command),
}

/// Map a terminal key press to an action.
pub fn key_action(key: KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let command = match key.code {
        KeyCode::Char(' ') => return Some(KeyAction::Hotkey(Key::Space)),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char('n') => Command::Next,
        KeyCode::Char('p') => Command::Previous,
        KeyCode::Right => Command::SeekForward(SEEK_STEP),
        KeyCode::Left => Command::SeekBackward(SEEK_STEP),
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Play the given files, or the selection from `--dir` when none were given.
pub fn cmd_play(rt: &Runtime, config: &Config, args: PlayArgs) -> anyhow::Result<()> {
    let dir = args.dir;
    let overrides = Overrides {
        cover: args.cover.map(Payload::file),
        background: args.background.map(Payload::file),
    };
    let selection = Selection::from_files(
        args.files.into_iter().chain(args.lyrics),
        &config.library,
        &config.lyrics,
    );
    let playlist = selection.into_playlist(overrides.clone());

    let transport = AudioOutput::new().context("failed to open audio output")?;
    let loader = TrackLoader::new(
        Arc::new(LoftyExtractor),
        Arc::new(PaletteExtractor),
        ResourceRegistry::new(),
        config.lyrics.precision(),
    );
    let hotkeys = Hotkeys::new();
    let settings = SessionSettings::from_config(config);

    rt.block_on(async move {
        let surface: SharedSurface = Arc::new(Mutex::new(
            TerminalSurface::new().context("failed to initialise terminal")?,
        ));
        let deps = SessionDeps {
            transport: Box::new(transport),
            loader,
            surface,
            hotkeys: hotkeys.clone(),
        };

        let session = match PlaybackSession::start(playlist, deps, settings.clone()) {
            SessionStart::Ready(session) => session,
            SessionStart::Redirect(deps) => {
                let root = dir.unwrap_or_else(|| PathBuf::from("."));
                let selection = library::select(root.clone(), &config.library, &config.lyrics).await;
                match PlaybackSession::start(selection.into_playlist(overrides), deps, settings) {
                    SessionStart::Ready(session) => session,
                    SessionStart::Redirect(_) => {
                        anyhow::bail!("no playable files found in {}", root.display())
                    }
                }
            }
        };

        let commands = session.commands();
        let quit = commands.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = quit.send(Command::Quit);
            }
        });

        let input = thread::Builder::new()
            .name("input".to_string())
            .spawn(move || input_loop(hotkeys, commands))
            .context("failed to start input thread")?;

        session.run().await;
        info!("session finished");

        if input.join().is_err() {
            warn!("input thread panicked");
        }
        Ok(())
    })
}

/// Forward key presses until the session drops its command receiver.
fn input_loop(hotkeys: Hotkeys, commands: UnboundedSender<Command>) {
    while !commands.is_closed() {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(error = %e, "terminal input unavailable");
                break;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "terminal input unavailable");
                break;
            }
        };
        match key_action(key) {
            Some(KeyAction::Hotkey(key)) => {
                if !hotkeys.dispatch(key) {
                    debug!(%key, "no binding for key");
                }
            }
            Some(KeyAction::Command(command)) => {
                if commands.send(command).is_err() {
                    break;
                }
            }
            None => {}
        }
    }
    debug!("input thread exiting");
}
