pub mod errors;
mod handlers;
mod responses;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::domain::ports::TokenIssuer;
use crate::pin::PinService;
use crate::session::{SessionController, SocketSettings};
use handlers::{admin, health::health_check, pin, session, token, ws};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub pins: Arc<PinService>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub socket: SocketSettings,
}

/// All routes with tracing and CORS applied
pub fn router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/session", post(session::handle_session))
        .route("/api/v1/auth/session/ws", get(ws::session_socket))
        .route("/api/v1/auth/pin", post(pin::request_pin))
        .route("/api/v1/auth/pin/redeem", post(pin::redeem_pin))
        .route("/api/v1/auth/token/verify", post(token::verify_token))
        .route("/api/v1/auth/token/refresh", post(token::refresh_token))
        .route("/api/v1/admin/pins", get(admin::list_pins))
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    /// Binds the listener and builds the router. Port 0 picks a free port.
    pub async fn new(state: AppState, config: &ServerConfig) -> Result<Self> {
        let router = router(state);

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .wrap_err_with(|| format!("Binding TCP listener on {addr}"))?;

        Ok(Self { listener, router })
    }

    /// Port the listener is bound to
    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("Getting local address")?
            .port())
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.listener.local_addr().context("Getting local address")?;
        tracing::info!("Server listening on http://{addr}");
        axum::serve(self.listener, self.router)
            .await
            .context("Running server")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{self, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::setup::setup;

    async fn test_router() -> Router {
        let config = Config::load_with_sources(Some(HashMap::new())).unwrap();
        router(setup(&config).await.unwrap())
    }

    #[tokio::test]
    async fn test_session_errors_are_ok() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/api/v1/auth/session")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"messageType":"eth_accounts","sessionId":"x"}"#))
            .unwrap();

        let response = test_router().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["messageType"], "session_error");
        assert_eq!(body["sessionId"], "x");
        assert_eq!(body["payload"]["code"], "600005");
    }

    #[tokio::test]
    async fn test_admin_requires_bearer() {
        let request = Request::builder()
            .uri("/api/v1/admin/pins")
            .header("authorization", "Basic Zm9vOmJhcg==")
            .body(Body::empty())
            .unwrap();

        let response = test_router().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
