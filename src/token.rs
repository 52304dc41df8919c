//! HS256 access and refresh tokens.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::domain::ErrorKind;
use crate::domain::models::{Principal, Role, Token, TokenGrant};
use crate::domain::ports::TokenIssuer;

const TOKEN_TYPE: &str = "bearer";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unknown token")]
    Unknown,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Expired | TokenError::Malformed(_) | TokenError::Unknown => {
                ErrorKind::Unauthorized
            }
            TokenError::Signing(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_)
            | JwtErrorKind::MissingRequiredClaim(_) => TokenError::Malformed(error.to_string()),
            _ => TokenError::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    aud: Vec<String>,
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
    role: Role,
    ecdsa: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sly: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(rename = "use")]
    token_use: TokenUse,
}

/// Issues and verifies tokens signed with a shared secret
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    token_ttl: i64,
    refresh_ttl: i64,
}

impl JwtIssuer {
    pub fn new(secret: &SecretString, issuer: impl Into<String>) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            token_ttl: 3600,
            refresh_ttl: 86_400,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.secret, config.issuer.clone())
            .with_expiry(config.token_expiration_secs, config.refresh_token_expiration_secs)
    }

    /// Lifetimes in seconds of access and refresh tokens
    pub fn with_expiry(mut self, token_ttl: i64, refresh_ttl: i64) -> Self {
        self.token_ttl = token_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    fn sign(&self, grant: &TokenGrant, token_use: TokenUse, ttl: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: grant.account_id.clone(),
            aud: grant.audiences.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl,
            jti: Uuid::new_v4().to_string(),
            role: grant.role,
            ecdsa: grant.ecdsa_address.clone(),
            sly: grant.smart_wallet_address.clone(),
            scopes: Vec::new(),
            token_use,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn decode(&self, token: &str, expected: TokenUse) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.token_use != expected {
            return Err(TokenError::Malformed(format!(
                "expected {expected:?} token"
            )));
        }
        Ok(claims)
    }
}

impl TokenIssuer for JwtIssuer {
    fn create_token(&self, grant: &TokenGrant) -> Result<Token, TokenError> {
        Ok(Token {
            id_token: self.sign(grant, TokenUse::Access, self.token_ttl)?,
            refresh_token: self.sign(grant, TokenUse::Refresh, self.refresh_ttl)?,
            expires_in: self.token_ttl,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    fn verify_token(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self.decode(token, TokenUse::Access)?;
        Ok(Principal {
            id: claims.sub,
            ecdsa_address: claims.ecdsa,
            sly_wallet_address: claims.sly,
            role: claims.role,
            scopes: claims.scopes,
            audiences: claims.aud,
        })
    }

    fn refresh_token(&self, refresh_token: &str) -> Result<Token, TokenError> {
        let claims = self.decode(refresh_token, TokenUse::Refresh)?;
        let grant = TokenGrant {
            audiences: claims.aud,
            account_id: claims.sub,
            ecdsa_address: claims.ecdsa,
            smart_wallet_address: claims.sly,
            role: claims.role,
        };
        tracing::debug!(account = %grant.account_id, "Refreshing token pair");
        self.create_token(&grant)
    }
}
