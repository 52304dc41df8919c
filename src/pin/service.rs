use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::{Role, Token, TokenGrant};
use crate::domain::ports::{AccountStore, ClientDirectory, TokenIssuer};
use crate::pin::errors::PinError;
use crate::pin::pool::{Pin, PinPool};
use crate::session::messages::validate_address;

/// Body of `POST /api/v1/auth/pin`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_address"))]
    pub ecdsa_pub_key: String,
}

/// Reply to a PIN request. The code itself is only echoed when delivery is disabled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinIssued {
    pub account_id: Uuid,
    pub email: String,
    pub ecdsa_pub_key: String,
    pub expiration: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

/// Body of `POST /api/v1/auth/pin/redeem`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PinRedemption {
    #[validate(length(min = 1))]
    pub pin: String,
    #[validate(length(min = 1))]
    pub pin_signature: String,
    #[serde(default)]
    pub audiences: Vec<String>,
}

/// Out-of-band channel carrying the code to its owner
#[async_trait]
pub trait PinDelivery: Send + Sync {
    async fn deliver(&self, pin: &Pin) -> Result<(), PinError>;
}

/// Writes PINs to the log instead of mailing them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPinDelivery;

#[async_trait]
impl PinDelivery for LogPinDelivery {
    async fn deliver(&self, pin: &Pin) -> Result<(), PinError> {
        info!(email = %pin.email, expires_at = %pin.expires_at, "Delivering pin");
        debug!(code = %pin.code, "Pin code");
        Ok(())
    }
}

pub struct PinService {
    pool: Arc<PinPool>,
    accounts: Arc<dyn AccountStore>,
    clients: Arc<dyn ClientDirectory>,
    tokens: Arc<dyn TokenIssuer>,
    delivery: Arc<dyn PinDelivery>,
    expose_pin: bool,
}

impl PinService {
    pub fn new(
        pool: Arc<PinPool>,
        accounts: Arc<dyn AccountStore>,
        clients: Arc<dyn ClientDirectory>,
        tokens: Arc<dyn TokenIssuer>,
        delivery: Arc<dyn PinDelivery>,
    ) -> Self {
        Self {
            pool,
            accounts,
            clients,
            tokens,
            delivery,
            expose_pin: false,
        }
    }

    /// Return codes in the response instead of delivering them
    pub fn with_exposed_pin(mut self, expose_pin: bool) -> Self {
        self.expose_pin = expose_pin;
        self
    }

    pub fn pool(&self) -> &Arc<PinPool> {
        &self.pool
    }

    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn request_pin(&self, request: PinRequest) -> Result<PinIssued, PinError> {
        request
            .validate()
            .map_err(|e| PinError::InvalidRequest(e.to_string()))?;

        let account = self.accounts.get_or_create_by_email(&request.email).await?;
        let pin = self
            .pool
            .request(account.id, request.email, request.ecdsa_pub_key)?;

        if !self.expose_pin {
            if let Err(e) = self.delivery.deliver(&pin).await {
                self.pool.revoke(&pin.code);
                return Err(e);
            }
        }
        info!(account = %account.id, "Pin requested");

        Ok(PinIssued {
            account_id: pin.account_id,
            email: pin.email,
            ecdsa_pub_key: pin.ecdsa_pub_key,
            expiration: pin.expires_at,
            pin: self.expose_pin.then_some(pin.code),
        })
    }

    /// Redeems a PIN for a token scoped to `audiences`, registering the device key on first use.
    #[instrument(skip_all)]
    pub async fn redeem_pin(&self, redemption: PinRedemption) -> Result<Token, PinError> {
        redemption
            .validate()
            .map_err(|e| PinError::InvalidRequest(e.to_string()))?;
        if redemption.audiences.is_empty() {
            return Err(PinError::NoAudiences);
        }
        if !self.clients.audiences_exist(&redemption.audiences) {
            return Err(PinError::UnknownAudience(redemption.audiences));
        }

        let pin = self.pool.redeem(&redemption.pin, &redemption.pin_signature)?;
        if self
            .accounts
            .register_device(pin.account_id, &pin.ecdsa_pub_key)
            .await?
        {
            info!(account = %pin.account_id, device = %pin.ecdsa_pub_key, "Device registered");
        }

        let token = self.tokens.create_token(&TokenGrant {
            audiences: redemption.audiences,
            account_id: pin.account_id.to_string(),
            ecdsa_address: pin.ecdsa_pub_key,
            smart_wallet_address: None,
            role: Role::Basic,
        })?;
        info!(account = %pin.account_id, "Pin redeemed");
        Ok(token)
    }

    pub fn list_pins(&self) -> Vec<Pin> {
        self.pool.list()
    }
}
