use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::session::messages::Envelope;

/// How messages reach a party
#[derive(Debug)]
pub enum Transport {
    /// Live socket drained by a writer task
    WebSocket { outbound: mpsc::Sender<Envelope> },
    /// One request, one response. Nothing can be pushed.
    Http1,
}

/// One party of a session, independent of its transport
#[derive(Debug)]
pub struct SessionClient {
    id: Uuid,
    transport: Transport,
    session: Mutex<Option<Uuid>>,
    dropped: AtomicU64,
}

impl SessionClient {
    pub fn websocket(outbound: mpsc::Sender<Envelope>) -> Self {
        Self::with_transport(Transport::WebSocket { outbound })
    }

    /// A per-request adapter for a stateless HTTP call
    pub fn http1() -> Self {
        Self::with_transport(Transport::Http1)
    }

    fn with_transport(transport: Transport) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            session: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn can_push(&self) -> bool {
        matches!(self.transport, Transport::WebSocket { .. })
    }

    /// Session this party has joined, if any
    pub fn session_id(&self) -> Option<Uuid> {
        *self.session.lock()
    }

    pub fn bind(&self, session_id: Uuid) {
        *self.session.lock() = Some(session_id);
    }

    pub fn unbind(&self) -> Option<Uuid> {
        self.session.lock().take()
    }

    /// Best-effort push. Returns false when the message was dropped.
    pub fn send(&self, envelope: Envelope) -> bool {
        let Transport::WebSocket { outbound } = &self.transport else {
            return false;
        };
        match outbound.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(client = %self.id, dropped, "Send queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client = %self.id, "Send queue closed, dropping message");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::messages::Message;

    #[test]
    fn test_http_client_cannot_push() {
        let client = SessionClient::http1();
        assert!(!client.can_push());
        assert!(!client.send(Envelope::new("abc", Message::SessionCloseResponse)));
        assert_eq!(client.dropped(), 0);
    }

    #[tokio::test]
    async fn test_websocket_send_and_overflow() {
        let (tx, mut rx) = mpsc::channel(1);
        let client = SessionClient::websocket(tx);
        assert!(client.can_push());

        assert!(client.send(Envelope::new("a", Message::SessionCloseResponse)));
        assert!(!client.send(Envelope::new("b", Message::SessionCloseResponse)));
        assert_eq!(client.dropped(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, "a");

        drop(rx);
        assert!(!client.send(Envelope::new("c", Message::SessionCloseResponse)));
    }

    #[test]
    fn test_binding() {
        let client = SessionClient::http1();
        assert_eq!(client.session_id(), None);
        let id = Uuid::new_v4();
        client.bind(id);
        assert_eq!(client.session_id(), Some(id));
        assert_eq!(client.unbind(), Some(id));
        assert_eq!(client.session_id(), None);
    }
}
