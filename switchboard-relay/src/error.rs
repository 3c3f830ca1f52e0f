use thiserror::Error;

/// Errors surfaced by the relay core.
///
/// `RoomFull` is an admission outcome and `Codec` covers malformed
/// control messages. `Negotiation` is fatal to the single session it
/// occurred on, never to the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("room is full")]
    RoomFull,

    #[error("malformed control message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors on the track read/write seam.
///
/// `Closed` means the pipe is gone for good: readers treat it as
/// end-of-stream, the switcher writer stops permanently. Anything else is
/// a skippable per-packet failure.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("track closed")]
    Closed,

    #[error("track i/o failed: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
