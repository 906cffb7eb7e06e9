//! Session gateway: owns the one logical platform session.
//!
//! Driver lifecycle events funnel into a single event loop that is the only
//! writer of [`SessionState`]; request handlers read cloned snapshots and
//! call [`SessionGateway::send_message`] / [`SessionGateway::is_registered`],
//! which are gated on `Ready`.

pub mod address;
pub mod gateway;
pub mod message;

pub use {
    address::{AddressError, RecipientAddress},
    gateway::{CheckError, InitError, SendError, SessionGateway, SessionState},
    message::{EmptyBodyError, OutboundMessage},
};
