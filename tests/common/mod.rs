#![allow(dead_code)]

use std::collections::HashMap;

use pairing_server::{
    config::{AudienceConfig, ClientConfig, Config},
    server::Server,
    setup::setup,
    telemetry,
};
use serde_json::{Value, json};

pub const CLIENT_ID: &str = "web";
pub const AUDIENCE: &str = "api";

pub struct TestApp {
    pub addr: String,
    pub config: Config,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn ws_url(&self) -> String {
        format!(
            "{}/api/v1/auth/session/ws",
            self.addr.replacen("http://", "ws://", 1)
        )
    }

    pub async fn session(&self, body: Value) -> Value {
        let response = self
            .client
            .post(format!("{}/api/v1/auth/session", self.addr))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.unwrap()
    }

    pub async fn create_session(&self) -> String {
        let response = self
            .session(json!({
                "messageType": "create_session",
                "sessionId": "",
                "payload": {"clientId": CLIENT_ID, "sessionType": "auth_session"}
            }))
            .await;
        assert_eq!(response["messageType"], "session_created", "{response}");
        response["sessionId"].as_str().unwrap().to_string()
    }
}

pub fn test_config() -> Config {
    let overrides = HashMap::from([
        ("server.host".to_string(), "127.0.0.1".to_string()),
        // Use a random OS port
        ("server.port".to_string(), "0".to_string()),
        ("jwt.secret".to_string(), "integration-test-secret".to_string()),
        ("pin.expose_pin".to_string(), "true".to_string()),
    ]);
    let mut config = Config::load_with_sources(Some(overrides)).unwrap();
    config.clients = vec![ClientConfig {
        id: CLIENT_ID.to_string(),
        domain: "https://app.example.com".to_string(),
        label: "Web".to_string(),
    }];
    config.audiences = vec![AudienceConfig {
        id: AUDIENCE.to_string(),
        url: "https://api.example.com".to_string(),
        clients: vec![CLIENT_ID.to_string()],
    }];
    config
}

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> TestApp {
    spawn_app(test_config()).await
}

pub async fn spawn_app(config: Config) -> TestApp {
    telemetry::init_tracing();

    let state = setup(&config).await.unwrap();
    let server = Server::new(state, &config.server).await.unwrap();

    let port = server.port().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    TestApp {
        addr: format!("http://{}:{}", config.server.host, port),
        config,
        client: reqwest::Client::new(),
    }
}
