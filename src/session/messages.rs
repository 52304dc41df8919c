//! Wire format shared by the WebSocket and HTTP transports.
//!
//! Every exchange is a JSON object `{messageType, sessionId, payload}`. Inbound
//! envelopes are decoded once into [`Request`], whose variant fixes the payload
//! schema. Outbound envelopes are built from [`Message`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::crypto::Address;
use crate::domain::models::Token;
use crate::session::errors::{ErrorPayload, SessionError};
use crate::siwe::Verification;

const PAYLOAD_MISMATCH: &str = "payload is not according to message type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "auth_session")]
    Auth,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Auth => "auth_session",
        }
    }
}

/// Progress reported by `ping_token_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Pending,
    Success,
    Failed,
}

pub(crate) fn validate_address(value: &str) -> Result<(), ValidationError> {
    if Address::is_valid(value) {
        Ok(())
    } else {
        Err(ValidationError::new("eth_address"))
    }
}

/// `create_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    #[validate(length(min = 1))]
    pub client_id: String,
    pub session_type: SessionType,
}

/// `connect_with_account`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWithAccount {
    #[validate(custom(function = "validate_address"))]
    pub eoa: String,
    #[serde(default)]
    #[validate(custom(function = "validate_address"))]
    pub sly_wallet_address: Option<String>,
    #[validate(length(min = 1))]
    pub chain_id: String,
}

/// `eth_sign_response`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EthSignResponse {
    #[validate(length(min = 1))]
    pub message: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateSession(CreateSession),
    ConnectWithAccount(ConnectWithAccount),
    EthSignResponse(EthSignResponse),
    PingToken,
    SessionClose,
}

impl Request {
    pub fn message_type(&self) -> &'static str {
        match self {
            Request::CreateSession(_) => "create_session",
            Request::ConnectWithAccount(_) => "connect_with_account",
            Request::EthSignResponse(_) => "eth_sign_response",
            Request::PingToken => "ping_token",
            Request::SessionClose => "session_close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(rename = "sessionId", default)]
    session_id: String,
    #[serde(default)]
    payload: Value,
}

/// An inbound envelope with its payload decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub session_id: String,
    pub request: Request,
}

/// A decode failure, with whatever session id could be read for the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub session_id: String,
    pub error: SessionError,
}

fn payload<T>(value: Value) -> Result<T, SessionError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let payload: T =
        serde_json::from_value(value).map_err(|_| SessionError::BadRequest(PAYLOAD_MISMATCH.into()))?;
    payload
        .validate()
        .map_err(|e| SessionError::BadRequest(e.to_string()))?;
    Ok(payload)
}

impl Inbound {
    pub fn decode(bytes: &[u8]) -> Result<Self, Rejected> {
        let raw: RawEnvelope = serde_json::from_slice(bytes).map_err(|e| Rejected {
            session_id: String::new(),
            error: SessionError::BadRequest(e.to_string()),
        })?;

        let RawEnvelope {
            message_type,
            session_id,
            payload: body,
        } = raw;

        let request = match message_type.as_str() {
            "create_session" => payload(body).map(Request::CreateSession),
            "connect_with_account" => payload(body).map(Request::ConnectWithAccount),
            "eth_sign_response" => payload(body).map(Request::EthSignResponse),
            "ping_token" => Ok(Request::PingToken),
            "session_close" => Ok(Request::SessionClose),
            other => Err(SessionError::UnknownMessageType(format!(
                "type {other} is not known"
            ))),
        };

        match request {
            Ok(request) => Ok(Self {
                session_id,
                request,
            }),
            Err(error) => Err(Rejected { session_id, error }),
        }
    }
}

/// `session_created`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub session_type: SessionType,
    pub client_id: String,
    pub qr_code_content: String,
}

/// `eth_sign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureRequest {
    pub eoa: String,
    pub message: String,
}

/// `ping_token_response`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingTokenResponse {
    pub auth_state: AuthState,
    pub token: Option<Token>,
}

/// Outbound message types and their payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "messageType", content = "payload", rename_all = "snake_case")]
pub enum Message {
    SessionCreated(SessionCreated),
    SessionError(ErrorPayload),
    EthSign(SignatureRequest),
    EthSignVerificationResponse(Verification),
    PingTokenResponse(PingTokenResponse),
    SessionCloseResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl Envelope {
    pub fn new(session_id: impl Into<String>, message: Message) -> Self {
        Self {
            message,
            session_id: session_id.into(),
        }
    }

    pub fn error(session_id: impl Into<String>, error: &SessionError) -> Self {
        Self::new(session_id, Message::SessionError(error.into()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.message, Message::SessionError(_))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
