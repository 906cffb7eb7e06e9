use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        extract::State,
        http::{Method, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::json,
    tower_http::cors::{Any, CorsLayer},
    tracing::{error, info},
};

use warelay_session::{
    OutboundMessage, RecipientAddress, SendError, SessionGateway, SessionState,
};

use crate::qr;

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<SessionGateway>,
    /// Platform domain appended to normalized phone numbers.
    address_suffix: Arc<str>,
}

impl AppState {
    pub fn new(gateway: Arc<SessionGateway>, address_suffix: &str) -> Self {
        Self {
            gateway,
            address_suffix: Arc::from(address_suffix),
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Per-route fallbacks give method mismatches the same treatment as
    // unknown paths.
    Router::new()
        .route("/send", post(send_handler).fallback(fallback_handler))
        .route("/status", get(status_handler).fallback(fallback_handler))
        .route("/qr", get(qr_handler).fallback(fallback_handler))
        .fallback(fallback_handler)
        .layer(cors)
        .with_state(state)
}

/// Bind and run the HTTP server.
pub async fn serve(state: AppState, bind: &str, port: u16) -> anyhow::Result<()> {
    let app = build_app(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "warelay gateway listening");
    info!("endpoints: POST /send, GET /status, GET /qr");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    phone_number: String,
    #[serde(default)]
    message: String,
}

/// `POST /send`: validate, normalize, relay.
///
/// Validation is rejected here before the gateway is touched; gateway
/// errors map one-to-one onto statuses.
async fn send_handler(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<SendRequest>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "request body must be JSON");
    };
    if request.phone_number.is_empty() || request.message.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "phone_number and message are required",
        );
    }

    let recipient = match RecipientAddress::normalize(&request.phone_number, &state.address_suffix)
    {
        Ok(recipient) => recipient,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "phone_number must contain digits");
        },
    };
    let outbound = match OutboundMessage::new(recipient, request.message.as_str()) {
        Ok(outbound) => outbound,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match state.gateway.send_message(&outbound).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Message sent to {}", request.phone_number),
            })),
        )
            .into_response(),
        Err(SendError::NotReady) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "WhatsApp client is not ready. Please authenticate first.",
        ),
        Err(SendError::UnknownRecipient) => error_response(
            StatusCode::BAD_REQUEST,
            &format!(
                "Number {} is not registered on WhatsApp or is invalid",
                request.phone_number
            ),
        ),
        Err(SendError::Transient(err)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        },
    }
}

/// `GET /status`: always 200; the body mirrors the session state.
async fn status_handler(State(state): State<AppState>) -> Response {
    let current = state.gateway.current_state().await;
    Json(json!({
        "ready": current.is_ready(),
        "message": current.describe(),
    }))
    .into_response()
}

/// `GET /qr`: 200 with an image while a code is scannable, 202 while
/// there is nothing to scan yet.
async fn qr_handler(State(state): State<AppState>) -> Response {
    match state.gateway.current_state().await {
        SessionState::Ready => (
            StatusCode::OK,
            Json(json!({
                "authenticated": true,
                "message": "Already authenticated",
            })),
        )
            .into_response(),
        SessionState::AwaitingScan { code } => match qr::data_uri(&code) {
            Ok(uri) => (
                StatusCode::OK,
                Json(json!({
                    "authenticated": false,
                    "qr": uri,
                })),
            )
                .into_response(),
            Err(err) => {
                error!(error = %err, "pairing code rendering failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error generating QR code")
            },
        },
        SessionState::Unauthenticated | SessionState::Disconnected { .. } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "authenticated": false,
                "message": "Waiting for QR code...",
            })),
        )
            .into_response(),
    }
}

/// Shared fallback: bare 200 for OPTIONS on any path (the CORS layer adds
/// the headers), JSON 404 for everything else.
async fn fallback_handler(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
