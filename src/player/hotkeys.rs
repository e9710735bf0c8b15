//! Process-wide key bindings with scoped ownership.
//!
//! The input thread calls [`Hotkeys::dispatch`] for every key press; a bound
//! key forwards its [`Command`] to the owner's channel. A binding lives only
//! as long as the [`HotkeyGuard`] returned by [`Hotkeys::bind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::session::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Space => write!(f, "Space"),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("Key {0} is already bound")]
    AlreadyBound(Key),
}

struct Binding {
    id: u64,
    command: Command,
    sink: UnboundedSender<Command>,
}

/// Shared key binding table. Cloning shares the table.
#[derive(Clone, Default)]
pub struct Hotkeys {
    bindings: Arc<Mutex<HashMap<Key, Binding>>>,
    next_id: Arc<AtomicU64>,
}

impl Hotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to send `command` to `sink`. Only one owner per key.
    pub fn bind(
        &self,
        key: Key,
        command: Command,
        sink: UnboundedSender<Command>,
    ) -> Result<HotkeyGuard, HotkeyError> {
        let mut bindings = self.bindings.lock();
        if bindings.contains_key(&key) {
            return Err(HotkeyError::AlreadyBound(key));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        bindings.insert(key, Binding { id, command, sink });
        debug!(%key, "hotkey bound");

        Ok(HotkeyGuard {
            hotkeys: self.clone(),
            key,
            id,
        })
    }

    /// Forward a key press. Returns `true` if the key was bound and its
    /// owner is still listening.
    pub fn dispatch(&self, key: Key) -> bool {
        let bindings = self.bindings.lock();
        match bindings.get(&key) {
            Some(binding) => binding.sink.send(binding.command.clone()).is_ok(),
            None => false,
        }
    }

    pub fn is_bound(&self, key: Key) -> bool {
        self.bindings.lock().contains_key(&key)
    }

    fn release(&self, key: Key, id: u64) {
        let mut bindings = self.bindings.lock();
        if bindings.get(&key).is_some_and(|b| b.id == id) {
            bindings.remove(&key);
            debug!(%key, "hotkey released");
        }
    }
}

/// Owns one key binding; dropping it removes the binding.
pub struct HotkeyGuard {
    hotkeys: Hotkeys,
    key: Key,
    id: u64,
}

impl HotkeyGuard {
    pub fn key(&self) -> Key {
        self.key
    }
}

impl fmt::Debug for HotkeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotkeyGuard").field("key", &self.key).finish()
    }
}

impl Drop for HotkeyGuard {
    fn drop(&mut self) {
        self.hotkeys.release(self.key, self.id);
    }
}
