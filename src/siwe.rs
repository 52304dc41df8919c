//! Sign-In-With-Ethereum (EIP-4361) challenges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::crypto::{self, Address, RecoveryMode, SignMethod, Signature};
use crate::domain::ports::SiweService;

const PREAMBLE: &str = " wants you to sign in with your Ethereum account:";
const VERSION: &str = "1";
const NONCE_LEN: usize = 16;

const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TAG: &str = "Expiration Time: ";

#[derive(Error, Debug)]
pub enum SiweError {
    #[error("invalid domain {0}")]
    InvalidDomain(String),

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("malformed SIWE message: {0}")]
    Malformed(String),

    #[error("signature error: {0}")]
    Signature(#[from] crypto::Error),

    #[error("recovered address not recognized [recovered: {recovered}, original: {original}]")]
    AddressMismatch { original: Address, recovered: Address },

    #[error("message expired at {0}")]
    Expired(String),
}

/// Input for building a challenge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Origin of the relying party, e.g. `https://app.example.com`
    pub domain: String,
    pub address: String,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub challenge: String,
    pub address: String,
    pub domain: String,
    pub chain_id: String,
}

/// Result of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub domain: String,
    pub uri: String,
    pub original_address: String,
    pub recovered_address: String,
}

/// A parsed EIP-4361 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: Address,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: String,
    pub nonce: String,
    pub issued_at: String,
    pub expiration_time: Option<String>,
}

impl SiweMessage {
    pub fn generate_nonce() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect()
    }

    fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), SiweError> {
        let Some(expiration) = &self.expiration_time else {
            return Ok(());
        };
        let at = DateTime::parse_from_rfc3339(expiration)
            .map_err(|e| SiweError::Malformed(format!("expiration time: {e}")))?;
        if at <= now {
            return Err(SiweError::Expired(expiration.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{PREAMBLE}", self.domain)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "{URI_TAG}{}", self.uri)?;
        writeln!(f, "{VERSION_TAG}{}", self.version)?;
        writeln!(f, "{CHAIN_TAG}{}", self.chain_id)?;
        writeln!(f, "{NONCE_TAG}{}", self.nonce)?;
        write!(f, "{ISSUED_AT_TAG}{}", self.issued_at)?;
        if let Some(expiration) = &self.expiration_time {
            write!(f, "\n{EXPIRATION_TAG}{expiration}")?;
        }
        Ok(())
    }
}

fn tagged<'a>(line: Option<&'a str>, tag: &str) -> Result<&'a str, SiweError> {
    line.and_then(|l| l.strip_prefix(tag))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SiweError::Malformed(format!("missing `{}`", tag.trim_end())))
}

impl FromStr for SiweMessage {
    type Err = SiweError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.split('\n').peekable();

        let domain = lines
            .next()
            .and_then(|l| l.strip_suffix(PREAMBLE))
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SiweError::Malformed("missing preamble".into()))?
            .to_string();

        let address_line = lines
            .next()
            .ok_or_else(|| SiweError::Malformed("missing address".into()))?;
        let address = address_line
            .parse()
            .map_err(|_| SiweError::InvalidAddress(address_line.to_string()))?;

        if lines.next() != Some("") {
            return Err(SiweError::Malformed("expected blank line after address".into()));
        }
        let statement = match lines.next() {
            Some("") => None,
            Some(statement) => {
                if lines.next() != Some("") {
                    return Err(SiweError::Malformed("expected blank line after statement".into()));
                }
                Some(statement.to_string())
            }
            None => return Err(SiweError::Malformed("truncated message".into())),
        };

        let uri = tagged(lines.next(), URI_TAG)?.to_string();
        let version = tagged(lines.next(), VERSION_TAG)?.to_string();
        if version != VERSION {
            return Err(SiweError::Malformed(format!("unsupported version {version}")));
        }
        let chain_id = tagged(lines.next(), CHAIN_TAG)?.to_string();
        let nonce = tagged(lines.next(), NONCE_TAG)?.to_string();
        let issued_at = tagged(lines.next(), ISSUED_AT_TAG)?.to_string();
        let expiration_time = match lines.peek() {
            Some(line) if line.starts_with(EXPIRATION_TAG) => {
                Some(tagged(lines.next(), EXPIRATION_TAG)?.to_string())
            }
            _ => None,
        };

        if lines.next().is_some() {
            return Err(SiweError::Malformed("unexpected trailing content".into()));
        }

        Ok(Self {
            domain,
            address,
            statement,
            uri,
            version,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
        })
    }
}

/// Builds and verifies SIWE messages signed with `personal_sign`
#[derive(Debug, Clone, Default)]
pub struct Siwe {
    statement: Option<String>,
}

impl Siwe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Human readable statement included in every challenge
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

impl SiweService for Siwe {
    fn challenge(&self, request: &ChallengeRequest) -> Result<Challenge, SiweError> {
        let url = Url::parse(&request.domain)
            .map_err(|_| SiweError::InvalidDomain(request.domain.clone()))?;
        let host = url
            .host_str()
            .ok_or_else(|| SiweError::InvalidDomain(request.domain.clone()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let address: Address = request
            .address
            .parse()
            .map_err(|_| SiweError::InvalidAddress(request.address.clone()))?;

        let message = SiweMessage {
            domain: authority,
            address,
            statement: self.statement.clone(),
            uri: request.domain.clone(),
            version: VERSION.to_string(),
            chain_id: request.chain_id.clone(),
            nonce: SiweMessage::generate_nonce(),
            issued_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            expiration_time: None,
        };

        Ok(Challenge {
            challenge: message.to_string(),
            address: request.address.clone(),
            domain: request.domain.clone(),
            chain_id: request.chain_id.clone(),
        })
    }

    fn verify(&self, message: &str, signature: &str) -> Result<Verification, SiweError> {
        let parsed: SiweMessage = message.parse()?;
        parsed.check_expiry(Utc::now())?;

        let signature: Signature = signature.parse()?;
        let recovered = crypto::recover(
            message,
            &signature,
            SignMethod::EthereumPrefix,
            RecoveryMode::Permissive,
        )?;
        if recovered != parsed.address {
            return Err(SiweError::AddressMismatch {
                original: parsed.address,
                recovered,
            });
        }

        Ok(Verification {
            domain: parsed.domain,
            uri: parsed.uri,
            original_address: parsed.address.to_string(),
            recovered_address: recovered.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Wallet;

    fn request(wallet: &Wallet) -> ChallengeRequest {
        ChallengeRequest {
            domain: "https://app.example.com".into(),
            address: wallet.address().to_string(),
            chain_id: "11155111".into(),
        }
    }

    #[test]
    fn test_challenge_format() {
        let wallet = Wallet::random().unwrap();
        let challenge = Siwe::new().challenge(&request(&wallet)).unwrap();

        let lines: Vec<&str> = challenge.challenge.lines().collect();
        assert_eq!(
            lines[0],
            "app.example.com wants you to sign in with your Ethereum account:"
        );
        assert_eq!(lines[1], wallet.address().to_string());
        assert!(challenge.challenge.contains("\nURI: https://app.example.com\n"));
        assert!(challenge.challenge.contains("\nChain ID: 11155111\n"));
        assert_eq!(challenge.chain_id, "11155111");
    }

    #[test]
    fn test_message_parse_round_trip() {
        let wallet = Wallet::random().unwrap();
        for siwe in [Siwe::new(), Siwe::new().with_statement("Sign in to Example")] {
            let challenge = siwe.challenge(&request(&wallet)).unwrap();
            let parsed: SiweMessage = challenge.challenge.parse().unwrap();
            assert_eq!(parsed.address, wallet.address());
            assert_eq!(parsed.statement, siwe.statement);
            assert_eq!(parsed.to_string(), challenge.challenge);
        }
    }

    #[test]
    fn test_challenge_keeps_port_in_domain() {
        let wallet = Wallet::random().unwrap();
        let mut req = request(&wallet);
        req.domain = "http://localhost:5173".into();
        let challenge = Siwe::new().challenge(&req).unwrap();
        assert!(challenge.challenge.starts_with("localhost:5173 wants you"));
    }

    #[test]
    fn test_challenge_rejects_bad_input() {
        let wallet = Wallet::random().unwrap();
        let mut req = request(&wallet);
        req.domain = "not a url".into();
        assert!(matches!(
            Siwe::new().challenge(&req),
            Err(SiweError::InvalidDomain(_))
        ));

        let mut req = request(&wallet);
        req.address = "0x1234".into();
        assert!(matches!(
            Siwe::new().challenge(&req),
            Err(SiweError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_verify_signed_challenge() {
        let wallet = Wallet::random().unwrap();
        let siwe = Siwe::new();
        let challenge = siwe.challenge(&request(&wallet)).unwrap();
        let signature = wallet
            .sign(&challenge.challenge, SignMethod::EthereumPrefix)
            .unwrap();

        let verification = siwe
            .verify(&challenge.challenge, &signature.to_string())
            .unwrap();
        assert_eq!(verification.original_address, verification.recovered_address);
        assert_eq!(verification.domain, "app.example.com");
        assert_eq!(verification.uri, "https://app.example.com");
    }

    #[test]
    fn test_verify_rejects_other_signer() {
        let wallet = Wallet::random().unwrap();
        let intruder = Wallet::random().unwrap();
        let siwe = Siwe::new();
        let challenge = siwe.challenge(&request(&wallet)).unwrap();
        let signature = intruder
            .sign(&challenge.challenge, SignMethod::EthereumPrefix)
            .unwrap();

        assert!(matches!(
            siwe.verify(&challenge.challenge, &signature.to_string()),
            Err(SiweError::AddressMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_expired_message() {
        let wallet = Wallet::random().unwrap();
        let message = SiweMessage {
            domain: "app.example.com".into(),
            address: wallet.address(),
            statement: None,
            uri: "https://app.example.com".into(),
            version: VERSION.into(),
            chain_id: "1".into(),
            nonce: SiweMessage::generate_nonce(),
            issued_at: "2020-01-01T00:00:00Z".into(),
            expiration_time: Some("2020-01-02T00:00:00Z".into()),
        }
        .to_string();
        let signature = wallet.sign(&message, SignMethod::EthereumPrefix).unwrap();

        assert!(matches!(
            Siwe::new().verify(&message, &signature.to_string()),
            Err(SiweError::Expired(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "hello".parse::<SiweMessage>(),
            Err(SiweError::Malformed(_))
        ));
    }
}
