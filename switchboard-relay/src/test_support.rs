//! Channel-backed fakes for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Error, TrackError};
use crate::transport::{
    CandidateHandler, InboundHandler, InboundMedia, InboundStream, OutboundTrack, StateHandler,
    Transport,
};
use crate::types::{
    IceCandidate, MediaKind, MediaPacket, SdpKind, SessionDescription, TransportState,
};

pub fn packet(timestamp: u32, seq: u16) -> MediaPacket {
    MediaPacket {
        sequence_number: seq,
        timestamp,
        marker: false,
        payload_type: 96,
        payload: bytes::Bytes::from_static(b"payload"),
    }
}

/// In-memory [`Transport`] recording every interaction.
#[derive(Default)]
pub struct FakeTransport {
    added: Mutex<Vec<IceCandidate>>,
    failing_candidates: Mutex<HashSet<String>>,
    keyframe_requests: Mutex<Vec<u32>>,
    remote: Mutex<Option<SessionDescription>>,
    local: Mutex<Option<SessionDescription>>,
    fail_remote: AtomicBool,
    fail_answer: AtomicBool,
    closed: AtomicBool,
    state_handlers: Mutex<Vec<StateHandler>>,
    candidate_handlers: Mutex<Vec<CandidateHandler>>,
    inbound_handlers: Mutex<Vec<InboundHandler>>,
    outputs: Mutex<HashMap<MediaKind, mpsc::UnboundedReceiver<MediaPacket>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_candidate(&self, candidate: &str) {
        self.failing_candidates.lock().insert(candidate.to_string());
    }

    pub fn fail_remote_description(&self) {
        self.fail_remote.store(true, Ordering::SeqCst);
    }

    pub fn fail_create_answer(&self) {
        self.fail_answer.store(true, Ordering::SeqCst);
    }

    pub fn added_candidates(&self) -> Vec<IceCandidate> {
        self.added.lock().clone()
    }

    pub fn keyframe_requests(&self) -> Vec<u32> {
        self.keyframe_requests.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver a connectivity state change to every registered handler.
    pub fn notify_state(&self, state: TransportState) {
        for handler in self.state_handlers.lock().iter() {
            handler(state);
        }
    }

    /// Deliver a locally gathered candidate to every registered handler.
    #[allow(dead_code)]
    pub fn emit_candidate(&self, candidate: IceCandidate) {
        for handler in self.candidate_handlers.lock().iter() {
            handler(candidate.clone());
        }
    }

    /// Announce an inbound stream to every registered handler.
    pub fn emit_inbound(&self, media: InboundMedia) {
        let handlers = self.inbound_handlers.lock();
        assert_eq!(handlers.len(), 1, "expected one inbound handler");
        (handlers[0])(media);
    }

    /// Take the packets written to the outbound track of `kind`.
    pub fn take_output(&self, kind: MediaKind) -> mpsc::UnboundedReceiver<MediaPacket> {
        self.outputs
            .lock()
            .remove(&kind)
            .expect("outbound track not created or already taken")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), Error> {
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(Error::Negotiation("remote description rejected".into()));
        }
        *self.remote.lock() = Some(desc);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, Error> {
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(Error::Negotiation("answer creation failed".into()));
        }
        if self.remote.lock().is_none() {
            return Err(Error::Negotiation("no remote description".into()));
        }
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: "v=0\r\nanswer".to_string(),
        })
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), Error> {
        *self.local.lock() = Some(desc);
        Ok(())
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), Error> {
        if self.failing_candidates.lock().contains(&candidate.candidate) {
            return Err(Error::Transport("candidate rejected".into()));
        }
        self.added.lock().push(candidate);
        Ok(())
    }

    async fn add_outbound_track(&self, kind: MediaKind) -> Result<Arc<dyn OutboundTrack>, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outputs.lock().insert(kind, rx);
        Ok(Arc::new(FakeOutbound {
            kind,
            tx,
            closed: AtomicBool::new(false),
        }))
    }

    async fn write_keyframe_request(&self, media_ssrc: u32) -> Result<(), Error> {
        self.keyframe_requests.lock().push(media_ssrc);
        Ok(())
    }

    fn connection_state(&self) -> TransportState {
        if self.closed.load(Ordering::SeqCst) {
            TransportState::Closed
        } else {
            TransportState::New
        }
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.state_handlers.lock().push(handler);
    }

    fn on_candidate(&self, handler: CandidateHandler) {
        self.candidate_handlers.lock().push(handler);
    }

    fn on_inbound_stream(&self, handler: InboundHandler) {
        self.inbound_handlers.lock().push(handler);
    }

    async fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Outbound track writing into an unbounded channel the test drains.
pub struct FakeOutbound {
    kind: MediaKind,
    tx: mpsc::UnboundedSender<MediaPacket>,
    closed: AtomicBool,
}

impl FakeOutbound {
    pub fn pair(kind: MediaKind) -> (Arc<Self>, mpsc::UnboundedReceiver<MediaPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                kind,
                tx,
                closed: AtomicBool::new(false),
            }),
            rx,
        )
    }

    pub fn close_pipe(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OutboundTrack for FakeOutbound {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn write_packet(&self, packet: &MediaPacket) -> Result<(), TrackError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TrackError::Closed);
        }
        self.tx
            .send(packet.clone())
            .map_err(|_| TrackError::Closed)
    }
}

/// Inbound stream fed by the test through a channel; closing the sender
/// ends the stream.
pub struct FakeInbound {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MediaPacket>>,
}

impl FakeInbound {
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedSender<MediaPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                rx: tokio::sync::Mutex::new(rx),
            }),
            tx,
        )
    }
}

#[async_trait]
impl InboundStream for FakeInbound {
    async fn read_packet(&self) -> Result<MediaPacket, TrackError> {
        self.rx.lock().await.recv().await.ok_or(TrackError::Closed)
    }
}
