//! Switchboard relay core
//!
//! This crate implements a small-room media relay: peers connect over a
//! websocket control channel, complete an offer/answer + trickle-ICE
//! handshake, and their RTP streams are forwarded to the other room
//! member(s): straight through in a 1:1 room, or through a per-track
//! [`MediaSwitcher`] that renumbers packets and arbitrates the active
//! source in a 3-party room.
//!
//! ## Architecture
//!
//! - **[`Room`]**: bounded registry of connected peers
//! - **[`PeerSession`]**: one peer's transport, outbound tracks and switchers
//! - **[`MediaSwitcher`]**: per-destination-track queue + renumbering writer
//! - **[`ReadyGate`]**: one-shot "transport is usable" signal
//! - **[`CandidateBuffer`]**: holds candidates that arrive before the
//!   remote description
//! - **[`Transport`]**: the seam to the underlying WebRTC stack, with a
//!   production adapter in [`webrtc_transport`]

mod candidates;
mod config;
mod error;
mod message;
mod ready;
mod relay;
mod room;
mod session;
mod signaling;
mod switcher;
mod transport;
mod types;
pub mod webrtc_transport;

#[cfg(test)]
mod test_support;

pub use candidates::CandidateBuffer;
pub use config::RelayConfig;
pub use error::{Error, Result, TrackError};
pub use message::SignalMessage;
pub use ready::ReadyGate;
pub use relay::attach_inbound;
pub use room::{Room, Topology};
pub use session::PeerSession;
pub use signaling::NegotiationState;
pub use switcher::{MediaSwitcher, SourceHandle, SwitcherStats};
pub use transport::{
    CandidateHandler, InboundHandler, InboundMedia, InboundStream, OutboundTrack, StateHandler,
    Transport,
};
pub use types::{
    IceCandidate, MediaKind, MediaPacket, PeerId, SdpKind, SessionDescription, TransportState,
};
