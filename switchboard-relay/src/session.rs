//! Peer session lifecycle

use std::sync::Arc;
use tracing::{debug, info, warn};

use parking_lot::Mutex;

use crate::candidates::CandidateBuffer;
use crate::config::RelayConfig;
use crate::error::Error;
use crate::ready::ReadyGate;
use crate::signaling::NegotiationState;
use crate::switcher::MediaSwitcher;
use crate::transport::{OutboundTrack, Transport};
use crate::types::{MediaKind, PeerId};

/// One connected peer: its transport, the outbound tracks the relay feeds,
/// the per-kind switchers in front of them, and the handshake state.
///
/// A session is created at connection accept and destroyed at disconnect;
/// nothing is recycled across connections.
pub struct PeerSession {
    id: PeerId,
    transport: Arc<dyn Transport>,
    audio_out: Arc<dyn OutboundTrack>,
    video_out: Arc<dyn OutboundTrack>,
    audio_switch: Arc<MediaSwitcher>,
    video_switch: Arc<MediaSwitcher>,
    ready: ReadyGate,
    pub(crate) candidates: CandidateBuffer,
    pub(crate) negotiation: Mutex<NegotiationState>,
}

impl PeerSession {
    /// Set up a session on a freshly created transport: attach one
    /// outbound track per kind, start a switcher in front of each, and
    /// wire the transport's connectivity notifications to the readiness
    /// gate.
    pub async fn connect(
        id: PeerId,
        transport: Arc<dyn Transport>,
        config: &RelayConfig,
    ) -> Result<Arc<Self>, Error> {
        let audio_out = transport.add_outbound_track(MediaKind::Audio).await?;
        let video_out = transport.add_outbound_track(MediaKind::Video).await?;

        let audio_switch = MediaSwitcher::spawn(
            MediaKind::Audio,
            Arc::clone(&audio_out),
            config.switcher_queue_capacity,
        );
        let video_switch = MediaSwitcher::spawn(
            MediaKind::Video,
            Arc::clone(&video_out),
            config.switcher_queue_capacity,
        );

        let session = Arc::new(Self {
            id,
            transport: Arc::clone(&transport),
            audio_out,
            video_out,
            audio_switch,
            video_switch,
            ready: ReadyGate::new(),
            candidates: CandidateBuffer::new(),
            negotiation: Mutex::new(NegotiationState::New),
        });

        let gate = session.ready.clone();
        transport.on_state_change(Box::new(move |state| {
            if state.is_usable() && gate.fire() {
                info!(peer = %id, %state, "peer is ready");
            }
        }));

        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    #[must_use]
    pub fn outbound(&self, kind: MediaKind) -> &Arc<dyn OutboundTrack> {
        match kind {
            MediaKind::Audio => &self.audio_out,
            MediaKind::Video => &self.video_out,
        }
    }

    #[must_use]
    pub fn switcher(&self, kind: MediaKind) -> &Arc<MediaSwitcher> {
        match kind {
            MediaKind::Audio => &self.audio_switch,
            MediaKind::Video => &self.video_switch,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Block until the transport first reports a usable state. Forwarding
    /// to this peer must not start earlier.
    pub async fn wait_ready(&self) {
        self.ready.wait().await;
    }

    /// Tear the session down. Closing the transport fails every pending
    /// track read and write, which is what stops the tasks this session
    /// owns.
    pub async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            warn!(peer = %self.id, error = %e, "transport close failed");
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        debug!(peer = %self.id, "peer session dropped");
    }
}
