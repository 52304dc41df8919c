use std::{fmt, str::FromStr};

use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};

use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::{Address, SignMethod, generate_random_bytes, hex_to_bytes};

/// Offset added to the recovery id by web3 libraries
const WEB3_V_OFFSET: u8 = 27;

/// How strictly the trailing recovery byte `v` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Only `v` in {27, 28} is accepted
    Web3Strict,
    /// `v` in {0, 1} or {27, 28}
    #[default]
    Permissive,
}

/// A 65-byte recoverable secp256k1 signature `r || s || v`
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; 65] = bytes
            .try_into()
            .map_err(|_| Error::SignatureLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recovery id normalized to {0, 1}
    fn recovery_id(&self, mode: RecoveryMode) -> CryptoResult<RecoveryId> {
        let v = self.v();
        let normalized = match (mode, v) {
            (_, 27 | 28) => v - WEB3_V_OFFSET,
            (RecoveryMode::Permissive, 0 | 1) => v,
            _ => return Err(Error::RecoveryId(v)),
        };
        RecoveryId::from_byte(normalized).ok_or(Error::RecoveryId(v))
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&hex_to_bytes(s)?)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

/// A secp256k1 private key with its derived address
#[derive(Clone)]
pub struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = Address::from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// Generate a fresh random key
    pub fn random() -> CryptoResult<Self> {
        loop {
            // a 32-byte string is out of range with probability ~2^-128
            let bytes = generate_random_bytes(32)?;
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return Ok(Self::from_signing_key(key));
            }
        }
    }

    /// Load a key from its hex encoding, with or without `0x`
    pub fn from_hex(secret: &str) -> CryptoResult<Self> {
        let key = SigningKey::from_slice(&hex_to_bytes(secret)?)?;
        Ok(Self::from_signing_key(key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `message` and return a web3-style signature (`v` in {27, 28})
    pub fn sign(&self, message: impl AsRef<[u8]>, method: SignMethod) -> CryptoResult<Signature> {
        let digest = method.digest(message);
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(&digest)?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + WEB3_V_OFFSET;
        Ok(Signature(bytes))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Recover the address that produced `signature` over `message`
pub fn recover(
    message: impl AsRef<[u8]>,
    signature: &Signature,
    method: SignMethod,
    mode: RecoveryMode,
) -> CryptoResult<Address> {
    let digest = method.digest(message);
    let recovery_id = signature.recovery_id(mode)?;
    let sig = K256Signature::from_slice(&signature.0[..64])?;
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)?;
    Ok(Address::from_verifying_key(&key))
}
