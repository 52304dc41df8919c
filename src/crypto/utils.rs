use crate::crypto::errors::CryptoResult;
use rand::{TryRngCore, rngs::OsRng};
use sha3::{Digest, Keccak256};

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(length: usize) -> CryptoResult<Vec<u8>> {
    let mut buf = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| crate::crypto::Error::Invalid(format!("OS random source failed: {e}")))?;
    Ok(buf)
}

/// Convert hex string to bytes, accepting an optional `0x` prefix
pub fn hex_to_bytes(hex_str: &str) -> CryptoResult<Vec<u8>> {
    let trimmed = hex_str.trim();
    let cleaned = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    Ok(hex::decode(cleaned)?)
}

/// Keccak-256 as used by Ethereum (not NIST SHA3-256)
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_bytes_prefixes() {
        assert_eq!(hex_to_bytes("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(hex_to_bytes("0Xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(hex_to_bytes(" dead ").unwrap(), vec![0xde, 0xad]);
        assert!(hex_to_bytes("0xzz").is_err());
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_random_bytes_length() {
        let bytes = generate_random_bytes(32).unwrap();
        assert_eq!(bytes.len(), 32);
    }
}
