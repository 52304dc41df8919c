use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::crypto::{Address, RecoveryMode, SignMethod, Signature, recover};
use crate::pin::errors::PinError;
use crate::session::ExpiredDeletion;

pub const PIN_LENGTH: usize = 6;
const PIN_SPACE: u32 = 1_000_000;
const MAX_ATTEMPTS: usize = 64;

/// A live PIN and what it was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub code: String,
    pub account_id: Uuid,
    pub email: String,
    pub ecdsa_pub_key: String,
    pub expires_at: DateTime<Utc>,
}

impl Pin {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Live PINs keyed by code, guarded by a single lock.
#[derive(Debug)]
pub struct PinPool {
    pins: Mutex<HashMap<String, Pin>>,
    ttl: Duration,
}

impl PinPool {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pins: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a code that collides with no live PIN. Expired entries are swept first.
    pub fn request(
        &self,
        account_id: Uuid,
        email: impl Into<String>,
        ecdsa_pub_key: impl Into<String>,
    ) -> Result<Pin, PinError> {
        let (email, ecdsa_pub_key) = (email.into(), ecdsa_pub_key.into());
        let now = Utc::now();
        let mut pins = self.pins.lock();
        pins.retain(|_, pin| !pin.is_expired_at(now));

        let mut rng = rand::rng();
        for _ in 0..MAX_ATTEMPTS {
            let code = format!("{:0width$}", rng.random_range(0..PIN_SPACE), width = PIN_LENGTH);
            if pins.contains_key(&code) {
                continue;
            }
            let pin = Pin {
                code: code.clone(),
                account_id,
                email,
                ecdsa_pub_key,
                expires_at: now + self.ttl,
            };
            pins.insert(code, pin.clone());
            debug!(account = %account_id, expires_at = %pin.expires_at, "Pin issued");
            return Ok(pin);
        }
        error!(live = pins.len(), "Could not find a free pin");
        Err(PinError::Exhausted(MAX_ATTEMPTS))
    }

    /// Consumes `code` if `signature` over it was made by the key the PIN is bound to.
    ///
    /// Only one of several concurrent redemptions of the same code succeeds.
    pub fn redeem(&self, code: &str, signature: &str) -> Result<Pin, PinError> {
        let pin = self
            .pins
            .lock()
            .get(code)
            .cloned()
            .ok_or(PinError::NotFound)?;
        if pin.is_expired_at(Utc::now()) {
            return Err(PinError::Expired);
        }

        let expected = pin
            .ecdsa_pub_key
            .parse::<Address>()
            .map_err(|e| PinError::InvalidSignature(e.to_string()))?;
        let signature = signature
            .parse::<Signature>()
            .map_err(|e| PinError::InvalidSignature(e.to_string()))?;
        let signer = recover(
            code,
            &signature,
            SignMethod::EthereumPrefix,
            RecoveryMode::Permissive,
        )
        .map_err(|e| PinError::InvalidSignature(e.to_string()))?;
        if signer != expected {
            return Err(PinError::InvalidSignature(format!(
                "signed by {signer}, expected {expected}"
            )));
        }

        self.pins.lock().remove(code).ok_or(PinError::NotFound)
    }

    /// Drops a PIN without redeeming it
    pub fn revoke(&self, code: &str) -> Option<Pin> {
        self.pins.lock().remove(code)
    }

    /// Snapshot of the PINs that have not expired
    pub fn list(&self) -> Vec<Pin> {
        let now = Utc::now();
        let mut pins: Vec<Pin> = self
            .pins
            .lock()
            .values()
            .filter(|pin| !pin.is_expired_at(now))
            .cloned()
            .collect();
        pins.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        pins
    }

    pub fn len(&self) -> usize {
        self.pins.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.lock().is_empty()
    }
}

impl ExpiredDeletion for PinPool {
    fn delete_expired(&self) -> usize {
        let now = Utc::now();
        let mut pins = self.pins.lock();
        let before = pins.len();
        pins.retain(|_, pin| !pin.is_expired_at(now));
        before - pins.len()
    }
}
