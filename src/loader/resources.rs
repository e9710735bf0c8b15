//! Transient display resources with create/revoke accounting.
//!
//! Every resource handed out by [`ResourceRegistry::create`] is a
//! [`TransientResource`] guard. The guard is not `Clone` and revokes itself
//! on drop, so each create is paired with exactly one revoke no matter which
//! path (supersession, stale drop, teardown, failed channel send) releases it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::Payload;

/// Identifier of a live resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// What a resource is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The playable audio handle bound to the transport
    Audio,
    /// Cover shown in the paused view
    Artwork,
    /// Background image the accent colour is derived from
    Background,
}

/// Counters for observing the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub created: u64,
    pub revoked: u64,
    pub live: usize,
    /// Revokes of ids that were not live (double revoke or foreign id)
    pub invalid_revokes: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<ResourceId, ResourceKind>,
    created: u64,
    revoked: u64,
    invalid_revokes: u64,
}

/// Create/revoke primitive for turning payloads into display handles.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and hand back its guard.
    pub fn create(
        &self,
        kind: ResourceKind,
        payload: Payload,
        mime_type: Option<String>,
    ) -> TransientResource {
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = ResourceId(inner.next_id);
            inner.live.insert(id, kind);
            inner.created += 1;
            id
        };
        tracing::debug!(%id, ?kind, name = %payload.name(), "resource created");
        TransientResource {
            id,
            kind,
            payload,
            mime_type,
            registry: self.clone(),
        }
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.inner.lock().live.contains_key(&id)
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock();
        RegistryStats {
            created: inner.created,
            revoked: inner.revoked,
            live: inner.live.len(),
            invalid_revokes: inner.invalid_revokes,
        }
    }

    fn revoke(&self, id: ResourceId) {
        let mut inner = self.inner.lock();
        if inner.live.remove(&id).is_some() {
            inner.revoked += 1;
            tracing::debug!(%id, "resource revoked");
        } else {
            inner.invalid_revokes += 1;
            tracing::warn!(%id, "revoke of a resource that is not live");
        }
    }
}

/// A live display handle. Dropping it revokes it.
pub struct TransientResource {
    id: ResourceId,
    kind: ResourceKind,
    payload: Payload,
    mime_type: Option<String>,
    registry: ResourceRegistry,
}

impl TransientResource {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

impl fmt::Debug for TransientResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientResource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.payload.name())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl Drop for TransientResource {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        Payload::memory("cover.png", vec![1u8, 2, 3])
    }

    #[test]
    fn test_drop_revokes_once() {
        let registry = ResourceRegistry::new();
        let res = registry.create(ResourceKind::Artwork, payload(), Some("image/png".into()));
        let id = res.id();

        assert!(registry.is_live(id));
        assert_eq!(res.mime_type(), Some("image/png"));
        drop(res);

        assert!(!registry.is_live(id));
        let stats = registry.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.live, 0);
        assert_eq!(stats.invalid_revokes, 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = ResourceRegistry::new();
        let a = registry.create(ResourceKind::Audio, payload(), None);
        let b = registry.create(ResourceKind::Audio, payload(), None);
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.stats().live, 2);
    }

    #[test]
    fn test_foreign_revoke_is_recorded() {
        let registry = ResourceRegistry::new();
        let other = ResourceRegistry::new();
        let res = other.create(ResourceKind::Background, payload(), None);

        registry.revoke(res.id());
        assert_eq!(registry.stats().invalid_revokes, 1);
        drop(res);
        assert_eq!(other.stats().invalid_revokes, 0);
    }

    #[test]
    fn test_dropped_in_failed_send_is_revoked() {
        let registry = ResourceRegistry::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<TransientResource>();
        drop(rx);

        let res = registry.create(ResourceKind::Artwork, payload(), None);
        assert!(tx.send(res).is_err());

        assert_eq!(registry.stats().revoked, 1);
        assert_eq!(registry.stats().live, 0);
    }
}
