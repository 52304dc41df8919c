use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::server::errors::AppError;
use crate::session::Envelope;

const INTERNAL_ERROR_MESSAGE: &str = "The server encountered an internal error.";

/// Protocol reply. Failures are carried in the envelope, so the status is always 200.
pub struct EnvelopeResponse(Envelope);

impl EnvelopeResponse {
    pub fn new(envelope: Envelope) -> Self {
        Self(envelope)
    }
}

impl IntoResponse for EnvelopeResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            tracing::debug!(error = %self, "Request rejected");
            self.to_string()
        };
        let body = ErrorBody {
            error: format!("{:?}", self.kind()),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;
    use crate::pin::PinError;
    use crate::session::SessionError;

    async fn json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope_is_ok() {
        let envelope = Envelope::error("abc", &SessionError::Closed);
        let response = EnvelopeResponse::new(envelope).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["messageType"], "session_error");
        assert_eq!(body["payload"]["code"], "600001");
    }

    #[tokio::test]
    async fn test_app_error_body() {
        let response = AppError::Pin(PinError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json(response).await;
        assert_eq!(body["error"], "NotFound");
        assert_eq!(body["message"], "pin not found");

        let response = AppError::Pin(PinError::Delivery("smtp down".into())).into_response();
        let body = json(response).await;
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
    }
}
