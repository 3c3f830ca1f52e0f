//! Transport abstraction
//!
//! The relay core never touches the WebRTC stack directly; it talks to
//! these traits. The production adapter lives in
//! [`crate::webrtc_transport`], tests substitute channel-backed fakes.
//!
//! Handlers registered through `on_*` may be invoked from any task; the
//! core makes no single-threaded delivery assumption.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, TrackError};
use crate::types::{IceCandidate, MediaKind, MediaPacket, SessionDescription, TransportState};

pub type StateHandler = Box<dyn Fn(TransportState) + Send + Sync>;
pub type CandidateHandler = Box<dyn Fn(IceCandidate) + Send + Sync>;
pub type InboundHandler = Box<dyn Fn(InboundMedia) + Send + Sync>;

/// An inbound media stream discovered on a transport.
pub struct InboundMedia {
    pub kind: MediaKind,
    /// Source stream identifier, needed to address keyframe requests.
    pub ssrc: u32,
    pub stream: Arc<dyn InboundStream>,
}

/// One peer's negotiated transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), Error>;

    async fn create_answer(&self) -> Result<SessionDescription, Error>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), Error>;

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), Error>;

    /// Create an outbound track of the given kind and attach it to the
    /// transport. Called once per kind at session setup.
    async fn add_outbound_track(&self, kind: MediaKind) -> Result<Arc<dyn OutboundTrack>, Error>;

    /// Ask the remote encoder behind `media_ssrc` for a keyframe.
    async fn write_keyframe_request(&self, media_ssrc: u32) -> Result<(), Error>;

    fn connection_state(&self) -> TransportState;

    fn on_state_change(&self, handler: StateHandler);

    fn on_candidate(&self, handler: CandidateHandler);

    fn on_inbound_stream(&self, handler: InboundHandler);

    async fn close(&self) -> Result<(), Error>;
}

/// Read side of one inbound media stream.
#[async_trait]
pub trait InboundStream: Send + Sync {
    /// Blocks until the next packet arrives. Any error is end-of-stream
    /// for the forwarding task reading this stream.
    async fn read_packet(&self) -> Result<MediaPacket, TrackError>;
}

/// Write side of one outbound track.
#[async_trait]
pub trait OutboundTrack: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// [`TrackError::Closed`] means the pipe is permanently gone; other
    /// errors are per-packet failures.
    async fn write_packet(&self, packet: &MediaPacket) -> Result<(), TrackError>;
}
