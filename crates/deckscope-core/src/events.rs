//! Identity change events and the bus that delivers them.
//!
//! Login and logout happen asynchronously relative to the study flow. The
//! [`IdentityBus`] holds the current identity and broadcasts an
//! [`IdentityEvent`] on every change; the controller consumes these events on
//! its own task, one at a time.

use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::models::Identity;
use crate::traits::IdentityProvider;

/// Identity changed. `identity: None` means the viewer logged out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityEvent {
    pub identity: Option<Identity>,
}

impl IdentityEvent {
    pub fn is_login(&self) -> bool {
        self.identity.is_some()
    }
}

/// In-process identity source with change notifications.
pub struct IdentityBus {
    current: RwLock<Option<Identity>>,
    tx: broadcast::Sender<IdentityEvent>,
}

impl IdentityBus {
    /// Create a bus with the given buffer capacity, starting anonymous.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            current: RwLock::new(None),
            tx,
        }
    }

    /// Create a bus that starts with a known identity (restored session).
    pub fn with_identity(capacity: usize, identity: Option<Identity>) -> Self {
        let bus = Self::new(capacity);
        if let Ok(mut current) = bus.current.write() {
            *current = identity;
        }
        bus
    }

    /// Replace the current identity and notify subscribers if it changed.
    pub fn set(&self, identity: Option<Identity>) {
        let changed = match self.current.write() {
            Ok(mut current) => {
                if *current == identity {
                    false
                } else {
                    *current = identity.clone();
                    true
                }
            }
            Err(poisoned) => {
                let mut current = poisoned.into_inner();
                *current = identity.clone();
                true
            }
        };

        if !changed {
            tracing::debug!("IdentityBus set: identity unchanged, no event");
            return;
        }

        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            login = identity.is_some(),
            subscriber_count,
            "IdentityBus emit"
        );
        // No subscribers is fine: the event is simply dropped.
        let _ = self.tx.send(IdentityEvent { identity });
    }

    pub fn login(&self, identity: Identity) {
        self.set(Some(identity));
    }

    pub fn logout(&self) {
        self.set(None);
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for IdentityBus {
    fn default() -> Self {
        Self::new(crate::defaults::IDENTITY_BUS_CAPACITY)
    }
}

impl IdentityProvider for IdentityBus {
    fn current(&self) -> Option<Identity> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), Some("learner@example.org".to_string()))
    }

    #[tokio::test]
    async fn test_login_emits_event() {
        let bus = IdentityBus::new(8);
        let mut rx = bus.subscribe();
        let who = identity();

        bus.login(who.clone());

        let event = rx.recv().await.unwrap();
        assert!(event.is_login());
        assert_eq!(event.identity, Some(who.clone()));
        assert_eq!(bus.current(), Some(who));
    }

    #[tokio::test]
    async fn test_logout_emits_none() {
        let bus = IdentityBus::with_identity(8, Some(identity()));
        let mut rx = bus.subscribe();

        bus.logout();

        let event = rx.recv().await.unwrap();
        assert!(!event.is_login());
        assert_eq!(bus.current(), None);
    }

    #[test]
    fn test_unchanged_identity_is_silent() {
        let bus = IdentityBus::new(8);
        let mut rx = bus.subscribe();
        bus.logout();
        assert!(rx.try_recv().is_err());

        let who = identity();
        bus.login(who.clone());
        bus.login(who);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = IdentityBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.login(identity());
        assert!(bus.current().is_some());
    }
}
