//! HTTP API for outbound messages

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::sender::MessageSender;
use crate::types::{SendRequest, StatusResponse};

/// API server state
#[derive(Clone)]
pub struct ApiState {
    pub sender: MessageSender,
}

/// Build the API router
pub fn router(sender: MessageSender) -> Router {
    Router::new()
        .route("/send", post(send_message))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(ApiState { sender })
}

/// Run the API HTTP server on an already bound listener
pub async fn run_server(listener: TcpListener, sender: MessageSender) -> anyhow::Result<()> {
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, router(sender)).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!("{} {} -> {}", method, path, response.status());

    response
}

/// Check both fields are present and non-empty
fn validate(request: &SendRequest) -> Result<(), ApiError> {
    let missing: Vec<&str> = [("jid", &request.jid), ("text", &request.text)]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

    match missing.as_slice() {
        [] => Ok(()),
        [field] => Err(ApiError::Validation(format!("{} is required", field))),
        _ => Err(ApiError::Validation(format!(
            "{} are required",
            missing.join(" and ")
        ))),
    }
}

/// Send a text message (`POST /send`)
async fn send_message(
    State(state): State<ApiState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Failed to bind JSON: {}", rejection.body_text());
        ApiError::Validation(rejection.body_text())
    })?;

    if let Err(e) = validate(&request) {
        warn!("Rejected send request: {}", e);
        return Err(e);
    }

    info!(
        "Received request to send message to {} ({} chars)",
        request.jid,
        request.text.chars().count()
    );

    // MessageSender already logs the failure
    let id = state.sender.send(&request.jid, &request.text).await?;
    info!("Message {} sent successfully", id);

    Ok(Json(StatusResponse {
        status: "Message sent".to_string(),
    }))
}
