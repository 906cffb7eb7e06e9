//! Configuration for the warelay gateway.
//!
//! Discovery order: `./warelay.{toml,yaml,yml,json}`, then
//! `~/.config/warelay/`. Missing or unparsable files fall back to defaults
//! so the service can always start.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{clear_config_dir, discover_and_load, load_config, set_config_dir},
    schema::{BridgeConfig, GatewayConfig, SessionConfig, WarelayConfig},
};
