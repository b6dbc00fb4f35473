//! Session lifecycle notifications
//!
//! The client never navigates or renders anything itself. Instead it publishes
//! events that the hosting application subscribes to, e.g. to route the user
//! back to the login entry point once the session cannot be recovered.

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Notification published by the session client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server handed out new tokens and they were stored
    TokensRotated,
    /// Refresh failed; credentials were cleared and the user must log in again
    SessionExpired { login_path: String },
    /// The server answered 403
    PermissionDenied { path: String },
    /// The server answered with a 5xx status
    ServerError { status: u16, path: String },
    /// Credentials were cleared by an explicit logout
    LoggedOut,
}

/// Broadcast channel of [`SessionEvent`]s
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: SessionEvent) {
        trace!("session event: {:?}", event);
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let events = SessionEvents::new();
        events.emit(SessionEvent::LoggedOut);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = SessionEvents::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        events.emit(SessionEvent::SessionExpired {
            login_path: "/login".into(),
        });

        let expected = SessionEvent::SessionExpired {
            login_path: "/login".into(),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }
}
