//! Authentication progress of a single pairing.
//!
//! ```text
//! Created --connect_with_account--> Connected --eth_sign_response--> Verified
//! ```
//!
//! Transitions only move forward. A guard failure never mutates the flow, so a
//! rejected submission can be retried.

use crate::session::errors::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Created,
    Connected,
    Verified,
}

impl FlowState {
    pub fn can_transition_to(&self, next: FlowState) -> bool {
        matches!(
            (self, next),
            (FlowState::Created, FlowState::Connected) | (FlowState::Connected, FlowState::Verified)
        )
    }
}

/// What is needed to check a signature submission, copied out of the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub eoa: String,
    pub smart_wallet: Option<String>,
    pub challenge: String,
}

/// Token claims available once the flow is verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub account_id: String,
    pub eoa: String,
    pub smart_wallet: Option<String>,
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthFlow {
    state: FlowState,
    client_id: String,
    domain: String,
    audiences: Vec<String>,
    eoa: Option<String>,
    smart_wallet: Option<String>,
    challenge: Option<String>,
    account_id: Option<String>,
}

impl AuthFlow {
    pub fn new(client_id: impl Into<String>, domain: impl Into<String>, audiences: Vec<String>) -> Self {
        Self {
            state: FlowState::Created,
            client_id: client_id.into(),
            domain: domain.into(),
            audiences,
            eoa: None,
            smart_wallet: None,
            challenge: None,
            account_id: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Fails unless the flow is exactly in `state`
    pub fn expect(&self, state: FlowState) -> Result<(), SessionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::UnexpectedMessage(format!(
                "flow is {:?}, expected {state:?}",
                self.state
            )))
        }
    }

    fn advance(&mut self, next: FlowState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::UnexpectedMessage(format!(
                "cannot move from {:?} to {next:?}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Created -> Connected, binding the wallet and the challenge it must sign
    pub fn connect(
        &mut self,
        eoa: String,
        smart_wallet: Option<String>,
        challenge: String,
    ) -> Result<(), SessionError> {
        self.advance(FlowState::Connected)?;
        self.eoa = Some(eoa);
        self.smart_wallet = smart_wallet;
        self.challenge = Some(challenge);
        Ok(())
    }

    pub fn pending_verification(&self) -> Result<PendingVerification, SessionError> {
        self.expect(FlowState::Connected)?;
        match (&self.eoa, &self.challenge) {
            (Some(eoa), Some(challenge)) => Ok(PendingVerification {
                eoa: eoa.clone(),
                smart_wallet: self.smart_wallet.clone(),
                challenge: challenge.clone(),
            }),
            _ => Err(SessionError::unexpected("connected flow without challenge")),
        }
    }

    /// Connected -> Verified
    pub fn verify(&mut self, account_id: String) -> Result<(), SessionError> {
        self.advance(FlowState::Verified)?;
        self.account_id = Some(account_id);
        Ok(())
    }

    /// `None` until the flow is verified
    pub fn identity(&self) -> Option<VerifiedIdentity> {
        if self.state != FlowState::Verified {
            return None;
        }
        Some(VerifiedIdentity {
            account_id: self.account_id.clone()?,
            eoa: self.eoa.clone()?,
            smart_wallet: self.smart_wallet.clone(),
            audiences: self.audiences.clone(),
        })
    }
}
