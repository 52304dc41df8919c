use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::crypto::Address;

/// Development-only signing secret, replaced through `APP_JWT__SECRET` in deployments
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub jwt: JwtConfig,
    pub pin: PinConfig,
    pub session: SessionConfig,
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub audiences: Vec<AudienceConfig>,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used for deep links
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Compared verbatim against the chain ID sent by wallets
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub secret: SecretString,
    pub token_expiration_secs: i64,
    pub refresh_token_expiration_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinConfig {
    pub expiration_minutes: i64,
    /// Return the code in the API response instead of delivering it out of band
    pub expose_pin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    pub write_wait_secs: u64,
    pub pong_wait_secs: u64,
    pub max_message_size: usize,
    pub send_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceConfig {
    pub id: String,
    #[serde(default)]
    pub url: String,
    /// Client IDs allowed to request this audience
    #[serde(default)]
    pub clients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub address: Address,
    #[serde(default)]
    pub controllers: Vec<Address>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("chain.id", "11155111")?
            .set_default("jwt.issuer", "pairing-server")?
            .set_default("jwt.secret", DEFAULT_JWT_SECRET)?
            .set_default("jwt.token_expiration_secs", 3600)?
            .set_default("jwt.refresh_token_expiration_secs", 86_400)?
            .set_default("pin.expiration_minutes", 60)?
            .set_default("pin.expose_pin", false)?
            .set_default("session.idle_timeout_secs", 900)?
            .set_default("session.reap_interval_secs", 60)?
            .set_default("websocket.write_wait_secs", 10)?
            .set_default("websocket.pong_wait_secs", 60)?
            .set_default("websocket.max_message_size", 4096)?
            .set_default("websocket.send_queue", 256)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_JWT__SECRET
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
