use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persistent user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eoa: Option<String>,
    /// ECDSA device keys registered through PIN redemption
    #[serde(default)]
    pub devices: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: None,
            eoa: None,
            devices: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered relying party that may open pairing sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    /// Origin used as the SIWE domain, e.g. `https://app.example.com`
    pub domain: String,
    pub label: String,
    /// Audiences this client may request tokens for
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Basic,
    Admin,
}

/// Everything the token issuer needs to mint a token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub audiences: Vec<String>,
    pub account_id: String,
    pub ecdsa_address: String,
    pub smart_wallet_address: Option<String>,
    pub role: Role,
}

/// Access/refresh token pair handed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds
    pub expires_in: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Identity decoded from a verified access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub ecdsa_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sly_wallet_address: Option<String>,
    pub role: Role,
    pub scopes: Vec<String>,
    pub audiences: Vec<String>,
}

/// Outcome of asking the chain whether a key controls a smart wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletAuthorization {
    Authorized,
    /// No contract is deployed at the wallet address
    NoContract,
    /// The contract exists but the key has no controller role
    NotController,
    /// The node could not be queried
    Rpc(String),
}
