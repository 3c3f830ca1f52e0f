//! Relay orchestration
//!
//! Each inbound stream discovered on a peer gets one forwarding task. The
//! task resolves its destinations from the room at attach time, waits for
//! every destination transport to become usable, and then moves packets
//! until the stream ends. In a two-party room packets go straight to the
//! counterpart's matching track; in a three-party room they go through
//! each destination's switcher, which this source claims on attach.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TrackError;
use crate::room::{Room, Topology};
use crate::session::PeerSession;
use crate::switcher::SourceHandle;
use crate::transport::InboundMedia;

/// Spawn the forwarding task for one discovered inbound stream.
pub fn attach_inbound(
    room: Arc<Room>,
    from: Arc<PeerSession>,
    media: InboundMedia,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let kind = media.kind;
        info!(peer = %from.id(), %kind, ssrc = media.ssrc, "inbound stream attached");

        match room.topology() {
            Topology::Direct => forward_direct(&room, &from, &media).await,
            Topology::Arbitrated => forward_arbitrated(&room, &from, &media).await,
        }

        debug!(peer = %from.id(), %kind, "forwarding task finished");
    })
}

/// 1:1 room: exactly one counterpart, no arbitration, packets pass through
/// untouched.
async fn forward_direct(room: &Room, from: &Arc<PeerSession>, media: &InboundMedia) {
    let Some(dest) = room.other(from.id()) else {
        debug!(peer = %from.id(), "no destination peer, dropping stream");
        return;
    };

    debug!(peer = %from.id(), dest = %dest.id(), "waiting for destination to become ready");
    dest.wait_ready().await;
    debug!(peer = %from.id(), dest = %dest.id(), "destination ready, forwarding");

    let out = dest.outbound(media.kind);
    loop {
        let packet = match media.stream.read_packet().await {
            Ok(packet) => packet,
            Err(e) => {
                // Normal end of stream: the remote track ended or the
                // transport is closing.
                debug!(peer = %from.id(), kind = %media.kind, error = %e, "inbound stream ended");
                return;
            }
        };

        if let Err(e) = out.write_packet(&packet).await {
            match e {
                TrackError::Closed => {
                    debug!(dest = %dest.id(), kind = %media.kind, "destination track closed")
                }
                e => warn!(dest = %dest.id(), kind = %media.kind, error = %e, "track write failed"),
            }
            return;
        }
    }
}

/// 3-party room: claim each destination's switcher for this source, then
/// feed the switcher queues. Packets from a source that loses the claim
/// later are discarded by the switcher, not here.
async fn forward_arbitrated(room: &Room, from: &Arc<PeerSession>, media: &InboundMedia) {
    let dests = room.others(from.id());
    if dests.is_empty() {
        debug!(peer = %from.id(), "no destination peers, dropping stream");
        return;
    }

    for dest in &dests {
        debug!(peer = %from.id(), dest = %dest.id(), "waiting for destination to become ready");
        dest.wait_ready().await;
    }

    let source = SourceHandle {
        peer: from.id(),
        ssrc: media.ssrc,
        transport: Arc::clone(from.transport()),
    };
    for dest in &dests {
        dest.switcher(media.kind).switch_to(&source).await;
    }

    loop {
        let packet = match media.stream.read_packet().await {
            Ok(packet) => packet,
            Err(e) => {
                debug!(peer = %from.id(), kind = %media.kind, error = %e, "inbound stream ended");
                return;
            }
        };
        for dest in &dests {
            dest.switcher(media.kind).enqueue(from.id(), packet.clone());
        }
    }
}
