//! Media switcher
//!
//! A [`MediaSwitcher`] sits in front of one destination track that several
//! inbound sources may feed over time. Sources carry independent sequence
//! and timestamp spaces, so packets cannot pass through untouched after a
//! switch: the destination's jitter buffer would read the jump as massive
//! loss. Instead the writer task assigns its own contiguous sequence
//! numbers and accumulates the outgoing timestamp from each packet's
//! reported delta. Switching therefore never shows the destination a
//! discontinuity; the cost is slow drift when sources disagree on clock
//! rate.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TrackError;
use crate::transport::{OutboundTrack, Transport};
use crate::types::{MediaKind, MediaPacket, PeerId};

/// An inbound source a switcher can be pointed at.
pub struct SourceHandle {
    pub peer: PeerId,
    pub ssrc: u32,
    /// The *source's* transport. Keyframe requests go upstream, not to
    /// the destination.
    pub transport: Arc<dyn Transport>,
}

#[derive(Default)]
struct StatsInner {
    forwarded: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_full: AtomicU64,
}

/// Counters for one switcher.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitcherStats {
    /// Packets written to the destination track
    pub forwarded: u64,
    /// Packets discarded because their source was no longer active
    pub dropped_stale: u64,
    /// Packets discarded because the queue was full
    pub dropped_full: u64,
}

/// Per-destination-track packet queue with active-source arbitration.
pub struct MediaSwitcher {
    kind: MediaKind,
    queue: mpsc::Sender<MediaPacket>,
    active: Mutex<Option<PeerId>>,
    dead: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
}

impl MediaSwitcher {
    /// Create the switcher and start its writer task. The writer runs for
    /// the life of the switcher, or until the destination pipe closes for
    /// good.
    #[must_use]
    pub fn spawn(
        kind: MediaKind,
        out: Arc<dyn OutboundTrack>,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let (queue, rx) = mpsc::channel(queue_capacity);
        let dead = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StatsInner::default());

        let switcher = Arc::new(Self {
            kind,
            queue,
            active: Mutex::new(None),
            dead: Arc::clone(&dead),
            stats: Arc::clone(&stats),
        });

        tokio::spawn(writer(kind, rx, out, dead, stats));
        switcher
    }

    /// Make `source` the active feed.
    ///
    /// Idempotent: pointing at the already-active source does nothing. A
    /// genuine switch of a video switcher asks the new source for a
    /// keyframe so the destination can decode from the first forwarded
    /// frame; audio needs no refresh. Returns whether a switch happened.
    pub async fn switch_to(&self, source: &SourceHandle) -> bool {
        {
            let mut active = self.active.lock();
            if *active == Some(source.peer) {
                return false;
            }
            *active = Some(source.peer);
        }
        debug!(kind = %self.kind, source = %source.peer, "switched active source");

        if self.kind == MediaKind::Video {
            if let Err(e) = source.transport.write_keyframe_request(source.ssrc).await {
                warn!(source = %source.peer, error = %e, "keyframe request failed");
            }
        }
        true
    }

    /// Queue a packet from `from` for the destination track.
    ///
    /// Non-blocking. Packets from a displaced source are discarded so two
    /// sources never interleave on one output; packets are also dropped
    /// when the queue is full or the switcher is dead.
    pub fn enqueue(&self, from: PeerId, packet: MediaPacket) {
        if self.dead.load(Ordering::Acquire) {
            return;
        }
        if *self.active.lock() != Some(from) {
            self.stats.dropped_stale.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if self.queue.try_send(packet).is_err() {
            self.stats.dropped_full.fetch_add(1, Ordering::Relaxed);
            warn!(kind = %self.kind, "switcher queue full, dropping packet");
        }
    }

    #[must_use]
    pub fn active_source(&self) -> Option<PeerId> {
        *self.active.lock()
    }

    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Whether the destination pipe closed permanently and the writer
    /// stopped.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stats(&self) -> SwitcherStats {
        SwitcherStats {
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            dropped_stale: self.stats.dropped_stale.load(Ordering::Relaxed),
            dropped_full: self.stats.dropped_full.load(Ordering::Relaxed),
        }
    }
}

impl Drop for MediaSwitcher {
    fn drop(&mut self) {
        debug!(
            kind = %self.kind,
            forwarded = self.stats.forwarded.load(Ordering::Relaxed),
            "media switcher dropped"
        );
        // Dropping the queue sender ends the writer task once it drains.
    }
}

/// Writer task: pops one packet at a time, renumbers it into the
/// destination's sequence/timestamp space, and writes it out.
///
/// Sequence numbers are assigned here, at write time, so they stay
/// gap-free no matter how enqueue timing jitters upstream.
async fn writer(
    kind: MediaKind,
    mut rx: mpsc::Receiver<MediaPacket>,
    out: Arc<dyn OutboundTrack>,
    dead: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    let mut sequence: u16 = 0;
    let mut timestamp: u32 = 0;

    while let Some(mut packet) = rx.recv().await {
        timestamp = timestamp.wrapping_add(packet.timestamp);
        packet.timestamp = timestamp;
        packet.sequence_number = sequence;
        sequence = sequence.wrapping_add(1);

        match out.write_packet(&packet).await {
            Ok(()) => {
                stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrackError::Closed) => {
                debug!(kind = %kind, "destination pipe closed, stopping writer");
                dead.store(true, Ordering::Release);
                break;
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "track write failed");
            }
        }
    }
}
