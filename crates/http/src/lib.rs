//! HTTP control surface: stateless translation between requests and
//! [`warelay_session::SessionGateway`] calls.
//!
//! Routes:
//! - `POST /send`: relay one message
//! - `GET /status`: session readiness
//! - `GET /qr`: pairing code as a data-URI image
//!
//! CORS is permissive by design; this is a local control plane, not a
//! public API.

pub mod qr;
pub mod server;

pub use server::{AppState, build_app, serve};
