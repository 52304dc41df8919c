use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::session::client::SessionClient;
use crate::session::errors::SessionError;
use crate::session::flow::AuthFlow;
use crate::session::messages::{Envelope, SessionType};

/// A session pairs at most two parties
pub const MAX_PARTIES: usize = 2;

#[derive(Debug)]
struct SessionInner {
    closed: bool,
    parties: Vec<Arc<SessionClient>>,
    flow: AuthFlow,
    last_activity: Instant,
}

/// A short-lived pairing context with its authentication flow.
///
/// All state sits behind one lock, so joins, relays and close are serialized per session.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    session_type: SessionType,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: Uuid, session_type: SessionType, flow: AuthFlow) -> Self {
        Self {
            id,
            session_type,
            inner: Mutex::new(SessionInner {
                closed: false,
                parties: Vec::with_capacity(MAX_PARTIES),
                flow,
                last_activity: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn party_count(&self) -> usize {
        self.inner.lock().parties.len()
    }

    pub fn is_paired(&self) -> bool {
        self.party_count() >= MAX_PARTIES
    }

    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }

    /// Takes the next free slot
    pub fn join(&self, client: Arc<SessionClient>) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        if inner.parties.iter().any(|p| p.id() == client.id()) {
            return Err(SessionError::SameClientTwice);
        }
        if inner.parties.len() >= MAX_PARTIES {
            return Err(SessionError::Full);
        }
        inner.parties.push(client);
        inner.last_activity = Instant::now();
        Ok(())
    }

    /// Removes a party and returns its peer, if one was paired
    pub fn leave(&self, client_id: Uuid) -> Option<Arc<SessionClient>> {
        let mut inner = self.inner.lock();
        let before = inner.parties.len();
        inner.parties.retain(|p| p.id() != client_id);
        if inner.parties.len() == before {
            return None;
        }
        inner.parties.first().cloned()
    }

    /// Pushes `envelope` to every party except `from` that can receive pushes.
    /// Returns how many deliveries were accepted.
    pub fn relay(&self, from: Uuid, envelope: &Envelope) -> usize {
        let targets: Vec<_> = {
            let inner = self.inner.lock();
            inner
                .parties
                .iter()
                .filter(|p| p.id() != from && p.can_push())
                .cloned()
                .collect()
        };
        targets
            .iter()
            .filter(|peer| peer.send(envelope.clone()))
            .count()
    }

    /// Runs `f` on the flow of an open session
    pub fn with_flow<R>(
        &self,
        f: impl FnOnce(&mut AuthFlow) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        inner.last_activity = Instant::now();
        f(&mut inner.flow)
    }

    /// Marks the session closed. Returns false if it already was.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        let was_open = !inner.closed;
        inner.closed = true;
        inner.last_activity = Instant::now();
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::messages::Message;
    use tokio::sync::mpsc;

    fn session() -> Session {
        Session::new(
            Uuid::new_v4(),
            SessionType::Auth,
            AuthFlow::new("web", "https://app.example.com", vec!["api".into()]),
        )
    }

    #[test]
    fn test_join_caps_at_two() {
        let session = session();
        let first = Arc::new(SessionClient::http1());
        let second = Arc::new(SessionClient::http1());

        session.join(first.clone()).unwrap();
        assert_eq!(session.join(first), Err(SessionError::SameClientTwice));
        session.join(second).unwrap();
        assert!(session.is_paired());

        for _ in 0..3 {
            assert_eq!(
                session.join(Arc::new(SessionClient::http1())),
                Err(SessionError::Full)
            );
        }
        assert_eq!(session.party_count(), MAX_PARTIES);
    }

    #[test]
    fn test_closed_session_rejects_everything() {
        let session = session();
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(
            session.join(Arc::new(SessionClient::http1())),
            Err(SessionError::Closed)
        );
        assert_eq!(session.with_flow(|_| Ok(())), Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_relay_skips_sender_and_http_parties() {
        let session = session();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = Arc::new(SessionClient::websocket(tx_a));
        let b = Arc::new(SessionClient::websocket(tx_b));
        session.join(a.clone()).unwrap();
        session.join(b.clone()).unwrap();

        let envelope = Envelope::new(session.id().to_string(), Message::SessionCloseResponse);
        assert_eq!(session.relay(a.id(), &envelope), 1);
        assert_eq!(rx_b.recv().await.unwrap(), envelope);
        assert!(rx_a.try_recv().is_err());

        // a non-member sender reaches both parties
        assert_eq!(session.relay(Uuid::new_v4(), &envelope), 2);
    }

    #[test]
    fn test_leave_returns_peer() {
        let session = session();
        let a = Arc::new(SessionClient::http1());
        let b = Arc::new(SessionClient::http1());
        session.join(a.clone()).unwrap();
        assert!(session.leave(a.id()).is_none());

        session.join(a.clone()).unwrap();
        session.join(b.clone()).unwrap();
        let peer = session.leave(a.id()).unwrap();
        assert_eq!(peer.id(), b.id());
        assert_eq!(session.party_count(), 1);
        assert!(session.leave(a.id()).is_none());
    }
}
