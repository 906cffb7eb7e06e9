//! Platform driver contract and the WebSocket bridge implementation.
//!
//! The gateway never speaks the messaging platform's protocol itself; all
//! platform work is delegated to a browser-automation sidecar reached
//! through [`PlatformDriver`]. Lifecycle events arrive on an unbounded
//! channel handed to the driver at construction, so the consumer decides
//! how state transitions are serialized.

pub mod bridge;
pub mod protocol;

use async_trait::async_trait;

pub use bridge::BridgeDriver;

/// Lifecycle events pushed by the platform driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A fresh pairing code was issued; replaces any previous one.
    Qr(String),
    /// Credentials accepted; the session is not yet usable for sends.
    Authenticated,
    /// The session is fully usable.
    Ready,
    /// Pairing or credential validation failed.
    AuthFailure(String),
    /// The platform connection dropped.
    Disconnected(String),
}

/// Driver-reported failure.
///
/// `code` carries the sidecar's structured error code when it provides one
/// (`"unknown_recipient"` is the one recognized value); `message` is always
/// present so callers without a code can fall back to signature matching.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// One logical connection to the external messaging platform.
///
/// Implementations own session credentials, reconnection, and everything
/// else platform-specific; callers only see these three operations plus the
/// event channel.
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// Start the platform session. Lifecycle events begin arriving
    /// asynchronously after this returns. Calling again while the session
    /// is up is a no-op.
    async fn initialize(&self) -> Result<(), DriverError>;

    /// Deliver `body` to a normalized recipient address.
    async fn send_message(&self, address: &str, body: &str) -> Result<(), DriverError>;

    /// Whether the address has a registered platform account.
    async fn is_registered_user(&self, address: &str) -> Result<bool, DriverError>;
}
