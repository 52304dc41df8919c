mod address;
pub mod ecdsa;
mod errors;
mod utils;

pub use address::Address;
pub use ecdsa::{RecoveryMode, Signature, Wallet, recover};
pub use errors::Error;
pub use utils::*;

use errors::CryptoResult;

const ETHEREUM_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// How a message is turned into the 32-byte digest that gets signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignMethod {
    /// keccak256("\x19Ethereum Signed Message:\n" || len || message), as used by wallets
    #[default]
    EthereumPrefix,
    /// keccak256(message)
    Raw,
}

impl SignMethod {
    /// Compute the digest of `message` according to this method
    pub fn digest(&self, message: impl AsRef<[u8]>) -> [u8; 32] {
        let message = message.as_ref();
        match self {
            SignMethod::EthereumPrefix => {
                let mut data = format!("{ETHEREUM_MESSAGE_PREFIX}{}", message.len()).into_bytes();
                data.extend_from_slice(message);
                keccak256(data)
            }
            SignMethod::Raw => keccak256(message),
        }
    }
}
