//! Channel-backed fakes shared by the scenario tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use switchboard_relay::{
    CandidateHandler, Error, IceCandidate, InboundHandler, InboundMedia, InboundStream, MediaKind,
    MediaPacket, OutboundTrack, SdpKind, SessionDescription, StateHandler, TrackError, Transport,
    TransportState,
};

pub fn packet(timestamp: u32) -> MediaPacket {
    packet_with(timestamp, b"payload".to_vec())
}

pub fn packet_with(timestamp: u32, payload: Vec<u8>) -> MediaPacket {
    MediaPacket {
        sequence_number: 0,
        timestamp,
        marker: false,
        payload_type: 96,
        payload: payload.into(),
    }
}

/// In-memory transport recording every interaction with the core.
#[derive(Default)]
pub struct FakeTransport {
    added: Mutex<Vec<IceCandidate>>,
    failing_candidates: Mutex<HashSet<String>>,
    keyframe_requests: Mutex<Vec<u32>>,
    remote: Mutex<Option<SessionDescription>>,
    closed: AtomicBool,
    state_handlers: Mutex<Vec<StateHandler>>,
    candidate_handlers: Mutex<Vec<CandidateHandler>>,
    inbound_handlers: Mutex<Vec<InboundHandler>>,
    outputs: Mutex<HashMap<MediaKind, mpsc::UnboundedReceiver<MediaPacket>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[allow(dead_code)]
    pub fn fail_candidate(&self, candidate: &str) {
        self.failing_candidates.lock().insert(candidate.to_string());
    }

    pub fn added_candidates(&self) -> Vec<IceCandidate> {
        self.added.lock().clone()
    }

    pub fn keyframe_requests(&self) -> Vec<u32> {
        self.keyframe_requests.lock().clone()
    }

    #[allow(dead_code)]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn notify_state(&self, state: TransportState) {
        for handler in self.state_handlers.lock().iter() {
            handler(state);
        }
    }

    #[allow(dead_code)]
    pub fn emit_candidate(&self, candidate: IceCandidate) {
        for handler in self.candidate_handlers.lock().iter() {
            handler(candidate.clone());
        }
    }

    #[allow(dead_code)]
    pub fn emit_inbound(&self, media: InboundMedia) {
        let handlers = self.inbound_handlers.lock();
        let handler = handlers.first().expect("no inbound handler registered");
        handler(media);
    }

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
        *self.remote.lock() = Some(desc);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, Error> {
        if self.remote.lock().is_none() {
            return Err(Error::Negotiation("no remote description".into()));
        }
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: "v=0\r\nanswer".to_string(),
        })
    }

    async fn set_local_description(&self, _desc: SessionDescription) -> Result<(), Error> {
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
        Ok(Arc::new(FakeOutbound { kind, tx }))
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

struct FakeOutbound {
    kind: MediaKind,
    tx: mpsc::UnboundedSender<MediaPacket>,
}

#[async_trait]
impl OutboundTrack for FakeOutbound {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn write_packet(&self, packet: &MediaPacket) -> Result<(), TrackError> {
        self.tx.send(packet.clone()).map_err(|_| TrackError::Closed)
    }
}

/// Inbound stream driven by the test; dropping the sender ends it.
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
