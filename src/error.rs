// ABOUTME: Error taxonomy for the session bridge
// Identity and capability errors block session creation; transport errors end it

use crate::identity::IdentityError;
use crate::terminal::protocol::ProtocolViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("transport unsupported: {0}")]
    TransportUnsupported(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
