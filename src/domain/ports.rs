//! Interfaces the session and PIN flows consume.

use async_trait::async_trait;
use uuid::Uuid;

use crate::crypto::Address;
use crate::domain::StoreError;
use crate::domain::models::{Account, ClientInfo, Principal, Token, TokenGrant, WalletAuthorization};
use crate::siwe::{Challenge, ChallengeRequest, SiweError, Verification};
use crate::token::TokenError;

/// Sign-In-With-Ethereum message creation and verification
pub trait SiweService: Send + Sync {
    fn challenge(&self, request: &ChallengeRequest) -> Result<Challenge, SiweError>;

    /// Parses `message`, recovers the signer of `signature` and checks it against the message address.
    fn verify(&self, message: &str, signature: &str) -> Result<Verification, SiweError>;
}

pub trait TokenIssuer: Send + Sync {
    fn create_token(&self, grant: &TokenGrant) -> Result<Token, TokenError>;

    fn verify_token(&self, token: &str) -> Result<Principal, TokenError>;

    /// Issues a fresh pair from a valid refresh token
    fn refresh_token(&self, refresh_token: &str) -> Result<Token, TokenError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_or_create_by_eoa(&self, eoa: &str) -> Result<Account, StoreError>;

    async fn get_or_create_by_email(&self, email: &str) -> Result<Account, StoreError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Registers a device key on the account. Returns `false` if it was already known.
    async fn register_device(&self, id: Uuid, key: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait WalletAuthority: Send + Sync {
    async fn authorize(&self, controller: &Address, wallet: &Address) -> WalletAuthorization;
}

pub trait ClientDirectory: Send + Sync {
    fn client(&self, client_id: &str) -> Option<ClientInfo>;

    /// True when every audience in `audiences` is registered
    fn audiences_exist(&self, audiences: &[String]) -> bool;
}
