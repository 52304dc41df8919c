use serde::Serialize;

use crate::domain::models::WalletAuthorization;

// Stable error codes carried in `session_error` payloads
mod code {
    pub const BAD_REQUEST: &str = "600000";
    pub const SESSION_CLOSED: &str = "600001";
    pub const SESSION_NOT_FOUND: &str = "600002";
    pub const SESSION_FULL: &str = "600003";
    pub const WRONG_SESSION_ID: &str = "600004";
    pub const UNKNOWN_MESSAGE_TYPE: &str = "600005";
    pub const UNEXPECTED_MESSAGE: &str = "600006";
    pub const WRONG_CHAIN_ID: &str = "600008";
    pub const CHALLENGE: &str = "600009";
    pub const WRONG_SIGNATURE: &str = "600010";
    pub const ACCOUNT: &str = "600011";
    pub const TOKEN: &str = "600012";
    pub const UNKNOWN_CLIENT: &str = "600013";
    pub const NO_AUDIENCES: &str = "600014";
    pub const SAME_CLIENT_TWICE: &str = "600015";
    pub const PEER_DISCONNECTED: &str = "600016";
    pub const NO_CONTRACT: &str = "600020";
    pub const NOT_CONTROLLER: &str = "600021";
    pub const WALLET_RPC: &str = "600022";
    pub const UNEXPECTED: &str = "600099";
}

/// Protocol-level failures, reported in-band as `session_error` envelopes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Undecodable envelope or payload that fails validation
    #[error("bad session request")]
    BadRequest(String),

    #[error("session closed")]
    Closed,

    #[error("session not found")]
    NotFound,

    #[error("the session is full")]
    Full,

    #[error("wrong session id")]
    WrongSessionId(String),

    #[error("unknown message type")]
    UnknownMessageType(String),

    #[error("not expecting this message")]
    UnexpectedMessage(String),

    #[error("wrong chain id")]
    WrongChainId(String),

    #[error("cannot create SIWE message")]
    Challenge(String),

    #[error("wrong signature")]
    WrongSignature(String),

    #[error("error getting or creating account")]
    Account(String),

    #[error("cant create token")]
    Token(String),

    #[error("client id does not exist")]
    UnknownClient(String),

    #[error("no audiences found for client")]
    NoAudiences(String),

    #[error("cannot connect the same client twice")]
    SameClientTwice,

    #[error("peer disconnected")]
    PeerDisconnected,

    #[error("no contract at given address")]
    NoContract(String),

    #[error("key is not a controller of the wallet")]
    NotController(String),

    #[error("wallet lookup failed")]
    WalletRpc(String),

    /// Internal failure; details are logged, never returned
    #[error("unexpected error")]
    Unexpected,
}

impl SessionError {
    /// Convenience function to log an internal failure and hide it from the caller
    pub fn unexpected<E: std::fmt::Debug>(e: E) -> Self {
        tracing::error!("Session failure: {e:?}");
        SessionError::Unexpected
    }

    /// Maps a non-authorized wallet lookup onto an error. `Authorized` yields `None`.
    pub fn from_authorization(
        outcome: WalletAuthorization,
        eoa: &str,
        wallet: &str,
    ) -> Option<Self> {
        match outcome {
            WalletAuthorization::Authorized => None,
            WalletAuthorization::NoContract => Some(SessionError::NoContract(format!(
                "no contract at {wallet}"
            ))),
            WalletAuthorization::NotController => Some(SessionError::NotController(format!(
                "{eoa} is not a controller key of {wallet}"
            ))),
            WalletAuthorization::Rpc(e) => Some(SessionError::WalletRpc(e)),
        }
    }

    pub fn code(&self) -> &'static str {
        use SessionError::*;

        match self {
            BadRequest(_) => code::BAD_REQUEST,
            Closed => code::SESSION_CLOSED,
            NotFound => code::SESSION_NOT_FOUND,
            Full => code::SESSION_FULL,
            WrongSessionId(_) => code::WRONG_SESSION_ID,
            UnknownMessageType(_) => code::UNKNOWN_MESSAGE_TYPE,
            UnexpectedMessage(_) => code::UNEXPECTED_MESSAGE,
            WrongChainId(_) => code::WRONG_CHAIN_ID,
            Challenge(_) => code::CHALLENGE,
            WrongSignature(_) => code::WRONG_SIGNATURE,
            Account(_) => code::ACCOUNT,
            Token(_) => code::TOKEN,
            UnknownClient(_) => code::UNKNOWN_CLIENT,
            NoAudiences(_) => code::NO_AUDIENCES,
            SameClientTwice => code::SAME_CLIENT_TWICE,
            PeerDisconnected => code::PEER_DISCONNECTED,
            NoContract(_) => code::NO_CONTRACT,
            NotController(_) => code::NOT_CONTROLLER,
            WalletRpc(_) => code::WALLET_RPC,
            Unexpected => code::UNEXPECTED,
        }
    }

    pub fn details(&self) -> String {
        use SessionError::*;

        match self {
            BadRequest(d) | WrongSessionId(d) | UnknownMessageType(d) | UnexpectedMessage(d)
            | WrongChainId(d) | Challenge(d) | WrongSignature(d) | Account(d) | Token(d)
            | UnknownClient(d) | NoAudiences(d) | NoContract(d) | NotController(d)
            | WalletRpc(d) => d.clone(),
            Closed | NotFound | Full | SameClientTwice | PeerDisconnected | Unexpected => {
                String::new()
            }
        }
    }
}

/// Payload of a `session_error` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: String,
}

impl From<&SessionError> for ErrorPayload {
    fn from(error: &SessionError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_payload() {
        let payload = ErrorPayload::from(&SessionError::Closed);
        assert_eq!(payload.code, "600001");
        assert_eq!(payload.message, "session closed");
        assert_eq!(payload.details, "");
    }

    #[test]
    fn test_authorization_mapping() {
        assert_eq!(
            SessionError::from_authorization(WalletAuthorization::Authorized, "0xa", "0xb"),
            None
        );
        let error =
            SessionError::from_authorization(WalletAuthorization::NoContract, "0xa", "0xb").unwrap();
        assert_eq!(error.code(), "600020");
        assert_eq!(error.details(), "no contract at 0xb");

        let error =
            SessionError::from_authorization(WalletAuthorization::NotController, "0xa", "0xb")
                .unwrap();
        assert_eq!(error.code(), "600021");

        let error = SessionError::from_authorization(
            WalletAuthorization::Rpc("timeout".into()),
            "0xa",
            "0xb",
        )
        .unwrap();
        assert_eq!(error.code(), "600022");
        assert_eq!(error.details(), "timeout");
    }
}
