use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::crypto::Address;
use crate::domain::models::{Role, TokenGrant};
use crate::domain::ports::{AccountStore, ClientDirectory, SiweService, TokenIssuer, WalletAuthority};
use crate::session::client::SessionClient;
use crate::session::errors::SessionError;
use crate::session::flow::{AuthFlow, FlowState};
use crate::session::messages::{
    AuthState, ConnectWithAccount, CreateSession, Envelope, EthSignResponse, Inbound, Message,
    PingTokenResponse, Rejected, Request, SessionCreated, SignatureRequest,
};
use crate::session::pairing::Session;
use crate::session::registry::SessionRegistry;
use crate::siwe::ChallengeRequest;

/// Path of the deep link rendered as a pairing QR code
const DEEP_LINK_PATH: &str = "/api/v1/auth/session";

type Result<T> = std::result::Result<T, SessionError>;

/// External services the protocol delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub siwe: Arc<dyn SiweService>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub accounts: Arc<dyn AccountStore>,
    pub wallets: Arc<dyn WalletAuthority>,
    pub clients: Arc<dyn ClientDirectory>,
}

/// Protocol entry point shared by the HTTP and WebSocket transports.
///
/// Every outcome, including failures, is returned as an envelope.
pub struct SessionController {
    registry: Arc<SessionRegistry>,
    services: Collaborators,
    chain_id: String,
    public_url: String,
}

impl SessionController {
    pub fn new(
        registry: Arc<SessionRegistry>,
        services: Collaborators,
        chain_id: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            services,
            chain_id: chain_id.into(),
            public_url: public_url.into(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one stateless HTTP exchange
    pub async fn handle_http(&self, body: &[u8]) -> Envelope {
        let client = Arc::new(SessionClient::http1());
        self.handle(&client, body).await
    }

    /// Handles one frame received on a socket
    pub async fn handle_socket(&self, client: &Arc<SessionClient>, frame: &[u8]) -> Envelope {
        self.handle(client, frame).await
    }

    #[instrument(skip_all, fields(client = %client.id()))]
    async fn handle(&self, client: &Arc<SessionClient>, bytes: &[u8]) -> Envelope {
        let inbound = match Inbound::decode(bytes) {
            Ok(inbound) => inbound,
            Err(Rejected { session_id, error }) => {
                debug!(code = error.code(), details = %error.details(), "Rejected envelope");
                return Envelope::error(session_id, &error);
            }
        };

        let session_id = inbound.session_id.clone();
        debug!(
            message_type = inbound.request.message_type(),
            session = %session_id,
            "Dispatching message"
        );
        match self.dispatch(client, inbound).await {
            Ok(envelope) => envelope,
            Err(error) => {
                debug!(code = error.code(), %error, details = %error.details(), "Request failed");
                Envelope::error(session_id, &error)
            }
        }
    }

    async fn dispatch(&self, client: &Arc<SessionClient>, inbound: Inbound) -> Result<Envelope> {
        let Inbound {
            session_id,
            request,
        } = inbound;
        match request {
            Request::CreateSession(payload) => self.create_session(client, &session_id, payload),
            Request::ConnectWithAccount(payload) => {
                self.connect_with_account(client, &session_id, payload)
            }
            Request::EthSignResponse(payload) => {
                self.submit_signature(client, &session_id, payload).await
            }
            Request::PingToken => self.ping_token(&session_id),
            Request::SessionClose => self.close_session(client, &session_id),
        }
    }

    fn session_created(&self, session: &Session, client_id: &str) -> Envelope {
        let id = session.id().to_string();
        let flow = session.session_type().as_str();
        let qr_code_content = format!(
            "{}{DEEP_LINK_PATH}?sid={}&cid={}&flow={}&chainId={}",
            self.public_url.trim_end_matches('/'),
            urlencoding::encode(&id),
            urlencoding::encode(client_id),
            urlencoding::encode(flow),
            urlencoding::encode(&self.chain_id),
        );
        Envelope::new(
            id.clone(),
            Message::SessionCreated(SessionCreated {
                session_id: id,
                session_type: session.session_type(),
                client_id: client_id.to_string(),
                qr_code_content,
            }),
        )
    }

    /// Opens a new session, or for a socket carrying a session id, joins it as second party.
    fn create_session(
        &self,
        client: &Arc<SessionClient>,
        session_id: &str,
        payload: CreateSession,
    ) -> Result<Envelope> {
        if let Some(current) = client.session_id() {
            return Err(SessionError::UnexpectedMessage(format!(
                "already joined session {current}"
            )));
        }
        if client.can_push() && !session_id.is_empty() {
            return self.join_session(client, session_id, payload);
        }

        let info = self
            .services
            .clients
            .client(&payload.client_id)
            .ok_or_else(|| {
                SessionError::UnknownClient(format!("client {} is not registered", payload.client_id))
            })?;
        if info.audiences.is_empty() {
            return Err(SessionError::NoAudiences(format!(
                "client {} has no audiences",
                info.id
            )));
        }

        let flow = AuthFlow::new(info.id.clone(), info.domain, info.audiences);
        let session = self.registry.create_session(payload.session_type, flow)?;
        session.join(client.clone())?;
        if client.can_push() {
            client.bind(session.id());
        }
        Ok(self.session_created(&session, &info.id))
    }

    fn join_session(
        &self,
        client: &Arc<SessionClient>,
        session_id: &str,
        payload: CreateSession,
    ) -> Result<Envelope> {
        let session = self.registry.session_for(session_id, true)?;
        if session.session_type() != payload.session_type {
            return Err(SessionError::BadRequest("session type does not match".into()));
        }
        let client_id = session.with_flow(|flow| Ok(flow.client_id().to_string()))?;
        if client_id != payload.client_id {
            return Err(SessionError::UnknownClient(format!(
                "client {} does not own this session",
                payload.client_id
            )));
        }

        session.join(client.clone())?;
        client.bind(session.id());
        info!(session = %session.id(), "Second party joined");
        Ok(self.session_created(&session, &client_id))
    }

    /// Created -> Connected. Replies with the SIWE challenge, also pushed to the peer.
    fn connect_with_account(
        &self,
        client: &Arc<SessionClient>,
        session_id: &str,
        payload: ConnectWithAccount,
    ) -> Result<Envelope> {
        let session = self.registry.session_for(session_id, false)?;
        let challenge = session.with_flow(|flow| {
            flow.expect(FlowState::Created)?;
            if payload.chain_id != self.chain_id {
                return Err(SessionError::WrongChainId(format!(
                    "expected {}, got {}",
                    self.chain_id, payload.chain_id
                )));
            }
            let challenge = self
                .services
                .siwe
                .challenge(&ChallengeRequest {
                    domain: flow.domain().to_string(),
                    address: payload.eoa.clone(),
                    chain_id: payload.chain_id.clone(),
                })
                .map_err(|e| SessionError::Challenge(e.to_string()))?;
            flow.connect(
                payload.eoa.clone(),
                payload.sly_wallet_address.clone(),
                challenge.challenge.clone(),
            )?;
            Ok(challenge.challenge)
        })?;
        info!(session = %session.id(), eoa = %payload.eoa, "Account connected");

        let envelope = Envelope::new(
            session.id().to_string(),
            Message::EthSign(SignatureRequest {
                eoa: payload.eoa,
                message: challenge,
            }),
        );
        session.relay(client.id(), &envelope);
        Ok(envelope)
    }

    /// Connected -> Verified. Any failure leaves the flow connected so the wallet can retry.
    async fn submit_signature(
        &self,
        client: &Arc<SessionClient>,
        session_id: &str,
        payload: EthSignResponse,
    ) -> Result<Envelope> {
        let session = self.registry.session_for(session_id, false)?;
        let pending = session.with_flow(|flow| flow.pending_verification())?;

        if payload.message != pending.challenge {
            return Err(SessionError::WrongSignature(
                "message does not match the issued challenge".into(),
            ));
        }
        let verification = self
            .services
            .siwe
            .verify(&payload.message, &payload.signature)
            .map_err(|e| SessionError::WrongSignature(e.to_string()))?;

        if let Some(wallet) = &pending.smart_wallet {
            let controller = pending
                .eoa
                .parse::<Address>()
                .map_err(|e| SessionError::BadRequest(e.to_string()))?;
            let contract = wallet
                .parse::<Address>()
                .map_err(|e| SessionError::BadRequest(e.to_string()))?;
            let outcome = self.services.wallets.authorize(&controller, &contract).await;
            if let Some(error) = SessionError::from_authorization(outcome, &pending.eoa, wallet) {
                warn!(session = %session.id(), %error, details = %error.details(), "Wallet authorization failed");
                return Err(error);
            }
        }

        let account = self
            .services
            .accounts
            .get_or_create_by_eoa(&pending.eoa)
            .await
            .map_err(|e| SessionError::Account(e.to_string()))?;
        let account = self
            .services
            .accounts
            .get_account(account.id)
            .await
            .map_err(|e| SessionError::Account(e.to_string()))?
            .ok_or_else(|| SessionError::Account(format!("account {} vanished", account.id)))?;

        session.with_flow(|flow| flow.verify(account.id.to_string()))?;
        info!(session = %session.id(), account = %account.id, "Session verified");

        let envelope = Envelope::new(
            session.id().to_string(),
            Message::EthSignVerificationResponse(verification),
        );
        session.relay(client.id(), &envelope);
        Ok(envelope)
    }

    /// Polls for the token: pending until verified, then a fresh token pair.
    fn ping_token(&self, session_id: &str) -> Result<Envelope> {
        let session = self.registry.session_for(session_id, false)?;
        let identity = session.with_flow(|flow| Ok(flow.identity()))?;

        let response = match identity {
            None => PingTokenResponse {
                auth_state: AuthState::Pending,
                token: None,
            },
            Some(identity) => {
                let token = self
                    .services
                    .tokens
                    .create_token(&TokenGrant {
                        audiences: identity.audiences,
                        account_id: identity.account_id,
                        ecdsa_address: identity.eoa,
                        smart_wallet_address: identity.smart_wallet,
                        role: Role::Basic,
                    })
                    .map_err(|e| SessionError::Token(e.to_string()))?;
                PingTokenResponse {
                    auth_state: AuthState::Success,
                    token: Some(token),
                }
            }
        };
        Ok(Envelope::new(
            session.id().to_string(),
            Message::PingTokenResponse(response),
        ))
    }

    fn close_session(&self, client: &Arc<SessionClient>, session_id: &str) -> Result<Envelope> {
        let session = self.registry.session_for(session_id, false)?;
        if !session.close() {
            return Err(SessionError::Closed);
        }
        info!(session = %session.id(), "Session closed");

        let envelope = Envelope::new(session.id().to_string(), Message::SessionCloseResponse);
        session.relay(client.id(), &envelope);
        Ok(envelope)
    }

    /// Cleans up after a socket went away and tells its peer
    pub fn disconnect(&self, client: &SessionClient) {
        let session_id = client.session_id();
        if let Some(peer) = self.registry.unregister_client(client.id()) {
            let session_id = session_id.map(|id| id.to_string()).unwrap_or_default();
            debug!(session = %session_id, peer = %peer.id(), "Notifying peer of disconnect");
            peer.send(Envelope::error(session_id, &SessionError::PeerDisconnected));
        }
    }
}
