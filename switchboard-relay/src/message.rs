//! Control-channel message codec
//!
//! Every frame on the control channel is `{ "type": ..., "data": ... }`.
//! Payloads stay structured objects, never pre-serialized strings, so the
//! wire stays self-describing for both ends.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{IceCandidate, SessionDescription};

/// A decoded control-channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SignalMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Ice(IceCandidate),
}

impl SignalMessage {
    /// Decode a text frame.
    ///
    /// Unknown types and malformed payloads are reported as [`Error::Codec`];
    /// the caller drops the message and keeps the connection.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode for sending as a text frame.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::Ice(_) => "ice",
        }
    }
}
