use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::session::ExpiredDeletion;
use crate::session::client::SessionClient;
use crate::session::errors::SessionError;
use crate::session::flow::AuthFlow;
use crate::session::messages::SessionType;
use crate::session::pairing::Session;

pub(crate) const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const MAX_ATTEMPTS: usize = 5;

/// Process-wide index of live sessions and connected sockets
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    clients: Mutex<HashMap<Uuid, Arc<SessionClient>>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry. Sessions idle for 15 minutes are reaped by default;
    /// use [with_idle_timeout][wit] to change it.
    ///
    /// [wit]: Self::with_idle_timeout
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Registers a new session under a fresh random identifier
    pub fn create_session(
        &self,
        session_type: SessionType,
        flow: AuthFlow,
    ) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.sessions.lock();
        for _ in 0..MAX_ATTEMPTS {
            let id = Uuid::new_v4();
            if sessions.contains_key(&id) {
                debug!(%id, "Session ID collision, regenerating");
                continue;
            }
            let session = Arc::new(Session::new(id, session_type, flow));
            sessions.insert(id, session.clone());
            info!(session = %id, "Session created");
            return Ok(session);
        }
        error!("Failed to generate unique session ID after {MAX_ATTEMPTS} attempts");
        Err(SessionError::Unexpected)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().get(id).cloned()
    }

    /// Resolves the session addressed by a message and checks it can be operated on.
    ///
    /// Fails on a missing or invalid id, an unknown session, a closed session, and,
    /// when `require_open_slot` is set, a session that is already paired.
    pub fn session_for(
        &self,
        raw_id: &str,
        require_open_slot: bool,
    ) -> Result<Arc<Session>, SessionError> {
        if raw_id.is_empty() {
            return Err(SessionError::WrongSessionId("session id is empty".into()));
        }
        let id = Uuid::parse_str(raw_id)
            .map_err(|e| SessionError::WrongSessionId(e.to_string()))?;
        let session = self.get(&id).ok_or(SessionError::NotFound)?;
        if session.is_closed() {
            return Err(SessionError::Closed);
        }
        if require_open_slot && session.is_paired() {
            return Err(SessionError::Full);
        }
        Ok(session)
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn register_client(&self, client: Arc<SessionClient>) {
        self.clients.lock().insert(client.id(), client);
    }

    /// Forgets a socket and removes it from its session. Returns the peer left behind.
    pub fn unregister_client(&self, client_id: Uuid) -> Option<Arc<SessionClient>> {
        let client = self.clients.lock().remove(&client_id)?;
        let session_id = client.unbind()?;
        let session = self.get(&session_id)?;
        session.leave(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }
}

impl ExpiredDeletion for SessionRegistry {
    /// Drops sessions without activity for longer than the idle timeout.
    /// Closing counts as activity, so a closed session keeps answering "closed" until then.
    fn delete_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for() < self.idle_timeout);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> AuthFlow {
        AuthFlow::new("web", "https://app.example.com", vec!["api".into()])
    }

    #[test]
    fn test_create_and_lookup() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(SessionType::Auth, flow()).unwrap();
        assert_eq!(registry.len(), 1);

        let found = registry
            .session_for(&session.id().to_string(), false)
            .unwrap();
        assert_eq!(found.id(), session.id());
    }

    #[test]
    fn test_session_for_errors() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.session_for("", false),
            Err(SessionError::WrongSessionId(_))
        ));
        assert!(matches!(
            registry.session_for("not-a-uuid", false),
            Err(SessionError::WrongSessionId(_))
        ));
        assert_eq!(
            registry
                .session_for(&Uuid::new_v4().to_string(), false)
                .unwrap_err(),
            SessionError::NotFound
        );
    }

    #[test]
    fn test_closed_checked_before_full() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(SessionType::Auth, flow()).unwrap();
        let id = session.id().to_string();
        session.join(Arc::new(SessionClient::http1())).unwrap();
        session.join(Arc::new(SessionClient::http1())).unwrap();

        assert_eq!(registry.session_for(&id, true).unwrap_err(), SessionError::Full);
        assert!(registry.session_for(&id, false).is_ok());

        session.close();
        assert_eq!(registry.session_for(&id, true).unwrap_err(), SessionError::Closed);
        assert_eq!(registry.session_for(&id, false).unwrap_err(), SessionError::Closed);
    }

    #[test]
    fn test_unregister_client_leaves_session() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(SessionType::Auth, flow()).unwrap();
        let (tx_a, _rx_a) = tokio::sync::mpsc::channel(1);
        let (tx_b, _rx_b) = tokio::sync::mpsc::channel(1);
        let a = Arc::new(SessionClient::websocket(tx_a));
        let b = Arc::new(SessionClient::websocket(tx_b));
        for client in [&a, &b] {
            registry.register_client(client.clone());
            session.join(client.clone()).unwrap();
            client.bind(session.id());
        }
        assert_eq!(registry.client_count(), 2);

        let peer = registry.unregister_client(a.id()).unwrap();
        assert_eq!(peer.id(), b.id());
        assert_eq!(registry.client_count(), 1);
        assert_eq!(session.party_count(), 1);
        assert!(registry.unregister_client(a.id()).is_none());
    }

    #[test]
    fn test_delete_expired() {
        let registry = SessionRegistry::new().with_idle_timeout(Duration::from_secs(3600));
        let open = registry.create_session(SessionType::Auth, flow()).unwrap();
        let closed = registry.create_session(SessionType::Auth, flow()).unwrap();
        closed.close();

        assert_eq!(registry.delete_expired(), 0);
        assert!(registry.get(&open.id()).is_some());
        assert_eq!(
            registry
                .session_for(&closed.id().to_string(), false)
                .unwrap_err(),
            SessionError::Closed
        );

        let registry = SessionRegistry::new().with_idle_timeout(Duration::ZERO);
        registry.create_session(SessionType::Auth, flow()).unwrap();
        registry
            .create_session(SessionType::Auth, flow())
            .unwrap()
            .close();
        assert_eq!(registry.delete_expired(), 2);
        assert!(registry.is_empty());
    }
}
