//! Production transport backed by the `webrtc` crate
//!
//! Everything WebRTC-specific lives here: peer-connection construction,
//! codec/interceptor registration, RTP packet conversion, and the mapping
//! from the stack's callbacks onto the relay's handler seams.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

use crate::config::RelayConfig;
use crate::error::{Error, TrackError};
use crate::transport::{
    CandidateHandler, InboundHandler, InboundMedia, InboundStream, OutboundTrack, StateHandler,
    Transport,
};
use crate::types::{
    IceCandidate, MediaKind, MediaPacket, SdpKind, SessionDescription, TransportState,
};

/// [`Transport`] implementation wrapping an [`RTCPeerConnection`].
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcTransport {
    /// Build a peer connection with the default codecs and interceptors
    /// and the configured STUN servers.
    pub async fn connect(config: &RelayConfig) -> Result<Arc<Self>, Error> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| Error::Transport(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.stun_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Arc::new(Self { pc: Arc::new(pc) }))
    }

    fn to_rtc_description(desc: &SessionDescription) -> Result<RTCSessionDescription, Error> {
        let result = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp.clone()),
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp.clone()),
        };
        result.map_err(|e| Error::Negotiation(e.to_string()))
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), Error> {
        let desc = Self::to_rtc_description(&desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| Error::Negotiation(e.to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, Error> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(e.to_string()))?;
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: answer.sdp,
        })
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), Error> {
        let desc = Self::to_rtc_description(&desc)?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| Error::Negotiation(e.to_string()))
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), Error> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: None,
            })
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn add_outbound_track(&self, kind: MediaKind) -> Result<Arc<dyn OutboundTrack>, Error> {
        let mime_type = match kind {
            MediaKind::Audio => MIME_TYPE_OPUS,
            MediaKind::Video => MIME_TYPE_VP8,
        };
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            kind.as_str().to_owned(),
            "switchboard".to_owned(),
        ));

        self.pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Arc::new(WebRtcOutbound { kind, track }))
    }

    async fn write_keyframe_request(&self, media_ssrc: u32) -> Result<(), Error> {
        self.pc
            .write_rtcp(&[Box::new(PictureLossIndication {
                sender_ssrc: 0,
                media_ssrc,
            })])
            .await
            .map(|_| ())
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn connection_state(&self) -> TransportState {
        map_ice_state(self.pc.ice_connection_state())
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.pc
            .on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                handler(map_ice_state(state));
                Box::pin(async {})
            }));
    }

    fn on_candidate(&self, handler: CandidateHandler) {
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                if let Some(candidate) = candidate {
                    match candidate.to_json() {
                        Ok(init) => handler(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }),
                        Err(e) => warn!(error = %e, "failed to serialize local candidate"),
                    }
                }
                Box::pin(async {})
            }));
    }

    fn on_inbound_stream(&self, handler: InboundHandler) {
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let kind = match track.kind() {
                    RTPCodecType::Audio => MediaKind::Audio,
                    _ => MediaKind::Video,
                };
                handler(InboundMedia {
                    kind,
                    ssrc: track.ssrc(),
                    stream: Arc::new(WebRtcInbound { track }),
                });
                Box::pin(async {})
            }));
    }

    async fn close(&self) -> Result<(), Error> {
        self.pc
            .close()
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

fn map_ice_state(state: RTCIceConnectionState) -> TransportState {
    match state {
        RTCIceConnectionState::Checking => TransportState::Checking,
        RTCIceConnectionState::Connected => TransportState::Connected,
        RTCIceConnectionState::Completed => TransportState::Completed,
        RTCIceConnectionState::Disconnected => TransportState::Disconnected,
        RTCIceConnectionState::Failed => TransportState::Failed,
        RTCIceConnectionState::Closed => TransportState::Closed,
        _ => TransportState::New,
    }
}

struct WebRtcInbound {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl InboundStream for WebRtcInbound {
    async fn read_packet(&self) -> Result<MediaPacket, TrackError> {
        let (packet, _attributes) = self
            .track
            .read_rtp()
            .await
            .map_err(|e| TrackError::Io(e.to_string()))?;
        Ok(MediaPacket {
            sequence_number: packet.header.sequence_number,
            timestamp: packet.header.timestamp,
            marker: packet.header.marker,
            payload_type: packet.header.payload_type,
            payload: packet.payload,
        })
    }
}

struct WebRtcOutbound {
    kind: MediaKind,
    track: Arc<TrackLocalStaticRTP>,
}

#[async_trait]
impl OutboundTrack for WebRtcOutbound {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn write_packet(&self, packet: &MediaPacket) -> Result<(), TrackError> {
        let rtp_packet = webrtc::rtp::packet::Packet {
            header: webrtc::rtp::header::Header {
                version: 2,
                marker: packet.marker,
                payload_type: packet.payload_type,
                sequence_number: packet.sequence_number,
                timestamp: packet.timestamp,
                ..Default::default()
            },
            payload: Bytes::clone(&packet.payload),
        };
        self.track
            .write_rtp(&rtp_packet)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                webrtc::Error::ErrClosedPipe => TrackError::Closed,
                e => TrackError::Io(e.to_string()),
            })
    }
}
