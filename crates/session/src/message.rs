use thiserror::Error;

use crate::address::RecipientAddress;

/// The message body is empty.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("message body is empty")]
pub struct EmptyBodyError;

/// One outbound request value. Never persisted; it exists only for the
/// duration of a single send call.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub recipient: RecipientAddress,
    pub body: String,
}

impl OutboundMessage {
    /// Both halves are non-empty by construction: the recipient through
    /// normalization, the body through this check.
    pub fn new(
        recipient: RecipientAddress,
        body: impl Into<String>,
    ) -> Result<Self, EmptyBodyError> {
        let body = body.into();
        if body.is_empty() {
            return Err(EmptyBodyError);
        }
        Ok(Self { recipient, body })
    }
}
