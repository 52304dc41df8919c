use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, ensure};
use secrecy::ExposeSecret;

use crate::config::{Config, DEFAULT_JWT_SECRET};
use crate::domain::memory::{MemoryAccountStore, StaticClientDirectory, StaticWalletAuthority};
use crate::pin::{LogPinDelivery, PinPool, PinService};
use crate::server::AppState;
use crate::session::{
    Collaborators, ExpiredDeletion, SessionController, SessionRegistry, SocketSettings,
};
use crate::siwe::Siwe;
use crate::token::JwtIssuer;

/// Wires every collaborator from configuration and starts the background reapers.
pub async fn setup(config: &Config) -> Result<AppState> {
    ensure!(
        config.session.reap_interval_secs > 0,
        "session.reap_interval_secs must be positive"
    );
    ensure!(
        config.websocket.pong_wait_secs > 0,
        "websocket.pong_wait_secs must be positive"
    );
    if config.jwt.secret.expose_secret() == DEFAULT_JWT_SECRET {
        tracing::warn!("Using the default JWT secret, set APP_JWT__SECRET in deployments");
    }
    if config.clients.is_empty() {
        tracing::warn!("No clients configured, every create_session will be rejected");
    }

    let tokens = Arc::new(JwtIssuer::from_config(&config.jwt));
    let accounts = Arc::new(MemoryAccountStore::new());
    let clients = Arc::new(StaticClientDirectory::from_config(
        &config.clients,
        &config.audiences,
    ));

    let registry = Arc::new(
        SessionRegistry::new()
            .with_idle_timeout(Duration::from_secs(config.session.idle_timeout_secs)),
    );
    let services = Collaborators {
        siwe: Arc::new(Siwe::new()),
        tokens: tokens.clone(),
        accounts: accounts.clone(),
        wallets: Arc::new(StaticWalletAuthority::from_config(&config.wallets)),
        clients: clients.clone(),
    };
    let controller = Arc::new(SessionController::new(
        registry.clone(),
        services,
        config.chain.id.clone(),
        config.server.public_url.clone(),
    ));

    let pool = Arc::new(PinPool::new(chrono::Duration::minutes(
        config.pin.expiration_minutes,
    )));
    let pins = PinService::new(
        pool.clone(),
        accounts,
        clients,
        tokens.clone(),
        Arc::new(LogPinDelivery),
    )
    .with_exposed_pin(config.pin.expose_pin);

    let period = Duration::from_secs(config.session.reap_interval_secs);
    tokio::spawn(async move { registry.delete_expired_periodically(period).await });
    tokio::spawn(async move { pool.delete_expired_periodically(period).await });

    Ok(AppState {
        controller,
        pins: Arc::new(pins),
        tokens,
        socket: SocketSettings::from_config(&config.websocket),
    })
}
