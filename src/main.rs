use color_eyre::eyre::Context;
use pairing_server::{config::Config, server::Server, setup::setup, telemetry};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    telemetry::init_tracing();

    let config = Config::load().wrap_err("Loading configuration")?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        chain = %config.chain.id,
        clients = config.clients.len(),
        "Loaded configuration"
    );

    let state = setup(&config).await?;
    let server = Server::new(state, &config.server).await?;
    server.run().await
}
