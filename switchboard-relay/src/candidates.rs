//! Pending network-path candidates
//!
//! Trickled candidates can race the offer that carries the remote
//! description. Candidates that arrive first are parked here, per session,
//! and applied in arrival order the moment the description lands.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Error;
use crate::transport::Transport;
use crate::types::IceCandidate;

#[derive(Default)]
struct BufferState {
    remote_ready: bool,
    pending: Vec<IceCandidate>,
}

/// Per-session candidate buffer.
///
/// The mutex is held only for the append/drain critical section; transport
/// calls happen outside it.
#[derive(Default)]
pub struct CandidateBuffer {
    state: Mutex<BufferState>,
}

impl CandidateBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the candidate if the remote description is already set,
    /// otherwise hold it. Early candidates are never dropped.
    pub async fn buffer_or_apply(
        &self,
        transport: &dyn Transport,
        candidate: IceCandidate,
    ) -> Result<(), Error> {
        let candidate = {
            let mut state = self.state.lock();
            if !state.remote_ready {
                debug!(pending = state.pending.len() + 1, "buffering early candidate");
                state.pending.push(candidate);
                return Ok(());
            }
            candidate
        };
        transport.add_candidate(candidate).await
    }

    /// Drain the buffer after the remote description is set.
    ///
    /// Applies every held candidate in arrival order; a candidate that
    /// fails to apply is logged and skipped, it does not abort the rest.
    /// Only the first call drains; later calls are no-ops.
    pub async fn flush(&self, transport: &dyn Transport) {
        let pending = {
            let mut state = self.state.lock();
            if state.remote_ready {
                return;
            }
            state.remote_ready = true;
            std::mem::take(&mut state.pending)
        };

        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "applying buffered candidates");
        for candidate in pending {
            if let Err(e) = transport.add_candidate(candidate).await {
                warn!(error = %e, "failed to apply buffered candidate");
            }
        }
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}
