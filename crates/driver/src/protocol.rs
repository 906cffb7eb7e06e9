//! JSON frames exchanged with the automation sidecar.
//!
//! The sidecar sends two kinds of frames on one WebSocket: responses to
//! RPCs we issued (matched by `id`) and unsolicited lifecycle events.

use serde::{Deserialize, Serialize};

use crate::DriverEvent;

/// RPC request sent to the sidecar.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Any frame received from the sidecar.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Response(Response),
    Event(EventFrame),
}

/// RPC response, matched to a pending request by `id`.
#[derive(Debug, Deserialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

/// Error payload on a failed RPC.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Unsolicited lifecycle event frame.
#[derive(Debug, Deserialize)]
pub struct EventFrame {
    pub event: String,
    /// Pairing code payload (`qr` events).
    #[serde(default)]
    pub code: Option<String>,
    /// Failure/disconnect reason (`auth_failure` / `disconnected` events).
    #[serde(default)]
    pub reason: Option<String>,
}

impl EventFrame {
    /// Map a wire event onto the typed driver event, or `None` for event
    /// names this version does not know.
    pub fn into_event(self) -> Option<DriverEvent> {
        match self.event.as_str() {
            "qr" => Some(DriverEvent::Qr(self.code.unwrap_or_default())),
            "authenticated" => Some(DriverEvent::Authenticated),
            "ready" => Some(DriverEvent::Ready),
            "auth_failure" => Some(DriverEvent::AuthFailure(
                self.reason.unwrap_or_else(|| "unspecified".into()),
            )),
            "disconnected" => Some(DriverEvent::Disconnected(
                self.reason.unwrap_or_else(|| "unspecified".into()),
            )),
            _ => None,
        }
    }
}
