//! The media transport seam.
//!
//! A transport plays one bound source at a time and reports what happens to
//! it through a [`TransportListener`]. Every notification carries the
//! [`BindingId`] it was bound with, so notifications from a previous binding
//! that were already in flight when the track changed can be told apart and
//! dropped.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use super::visualization::SignalTap;
use crate::loader::TransientResource;

/// Identifies one bind of a source to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub u64);

/// Notifications a transport emits for its bound source.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Playback position moved (periodic while playing, and after a seek)
    TimeUpdate(Duration),
    /// Duration became known
    DurationChanged(Duration),
    Play,
    Pause,
    /// Reached the end of the source
    Ended,
}

/// A [`TransportEvent`] tagged with its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportNotice {
    pub binding: BindingId,
    pub event: TransportEvent,
}

/// Delivery end for one binding's notifications.
#[derive(Debug, Clone)]
pub struct TransportListener {
    binding: BindingId,
    tx: UnboundedSender<TransportNotice>,
}

impl TransportListener {
    pub fn new(binding: BindingId, tx: UnboundedSender<TransportNotice>) -> Self {
        Self { binding, tx }
    }

    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// Returns `false` once nobody is listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TransportNotice {
                binding: self.binding,
                event,
            })
            .is_ok()
    }
}

/// Audio playback primitive driven by the session controller.
///
/// `play`/`pause` only request a state change; the transport confirms it by
/// emitting [`TransportEvent::Play`] or [`TransportEvent::Pause`].
pub trait MediaTransport {
    /// Point the transport at a new source. Replaces any previous binding.
    fn bind(
        &mut self,
        source: &TransientResource,
        listener: TransportListener,
    ) -> Result<(), TransportError>;

    /// Drop the current source and listener. No notification for the old
    /// binding is emitted after this returns.
    fn unbind(&mut self);

    fn play(&mut self) -> Result<(), TransportError>;

    fn pause(&mut self) -> Result<(), TransportError>;

    fn is_paused(&self) -> bool;

    fn seek(&mut self, position: Duration) -> Result<(), TransportError>;

    fn current_time(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    /// The signal source frequency analysis attaches to. The same tap is
    /// returned for the whole lifetime of the transport.
    fn signal(&self) -> SignalTap;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Audio initialization failed: {0}")]
    AudioInit(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Audio thread is gone")]
    ChannelClosed,

    #[error("No source is bound")]
    NotBound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_listener_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = TransportListener::new(BindingId(7), tx);

        assert!(listener.emit(TransportEvent::Play));
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.binding, BindingId(7));
        assert_eq!(notice.event, TransportEvent::Play);
    }

    #[test]
    fn test_listener_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = TransportListener::new(BindingId(1), tx);
        drop(rx);
        assert!(!listener.emit(TransportEvent::Ended));
    }
}
