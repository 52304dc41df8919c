use thiserror::Error;

pub(crate) type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data format or corrupted data
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// Signature is not 65 bytes long
    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    SignatureLength(usize),

    /// Recovery byte `v` is not accepted in the requested mode
    #[error("Invalid recovery id: {0}")]
    RecoveryId(u8),

    /// Internal secp256k1 error
    #[error("ECDSA error: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
