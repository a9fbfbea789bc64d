//! Error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::types::ErrorResponse;

/// Failure reported by the messaging client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway error {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Client is not connected")]
    NotConnected,

    #[error("Device is not paired")]
    NotPaired,

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Outbound send failure
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Timed out after {}s waiting for send to complete", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to send message: {0}")]
    Transport(#[from] ClientError),
}

/// Errors surfaced by the HTTP API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Send(#[from] SendError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Send(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = SendError::Timeout(Duration::from_secs(60));
        assert_eq!(
            err.to_string(),
            "Timed out after 60s waiting for send to complete"
        );
    }

    #[test]
    fn test_transient_client_errors() {
        let unavailable = ClientError::Gateway {
            status: 503,
            message: "warming up".to_string(),
        };
        assert!(unavailable.is_transient());

        let unauthorized = ClientError::Gateway {
            status: 401,
            message: "bad token".to_string(),
        };
        assert!(!unauthorized.is_transient());
        assert!(!ClientError::NotPaired.is_transient());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::Validation("jid is required".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        let send = ApiError::from(SendError::Transport(ClientError::NotConnected));
        assert_eq!(send.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(send.to_string(), "Failed to send message: Client is not connected");
    }
}
