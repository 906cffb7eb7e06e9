use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarelayConfig {
    pub gateway: GatewayConfig,
    pub bridge: BridgeConfig,
    pub session: SessionConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the control API.
    pub bind: String,
    /// Listen port.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Connection settings for the browser-automation sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket URL of the sidecar process.
    pub url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8799".into(),
        }
    }
}

/// Messaging session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Platform domain appended to normalized phone numbers.
    pub address_suffix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address_suffix: "c.us".into(),
        }
    }
}
