//! Room registry

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::session::PeerSession;
use crate::types::PeerId;

/// How inbound streams reach the other member(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Two-party room: one counterpart, packets pass straight through.
    Direct,
    /// Three-party room: packets go through each destination's switcher.
    Arbitrated,
}

/// Bounded registry of the peers currently in the call.
///
/// Membership never exceeds the configured capacity; all mutations go
/// through one mutex.
pub struct Room {
    capacity: usize,
    peers: Mutex<HashMap<PeerId, Arc<PeerSession>>>,
}

impl Room {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a session. Fails with [`Error::RoomFull`] at capacity,
    /// leaving membership untouched.
    pub fn add(&self, session: Arc<PeerSession>) -> Result<(), Error> {
        let mut peers = self.peers.lock();
        if peers.len() >= self.capacity {
            return Err(Error::RoomFull);
        }
        peers.insert(session.id(), session);
        Ok(())
    }

    pub fn remove(&self, id: PeerId) -> Option<Arc<PeerSession>> {
        self.peers.lock().remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: PeerId) -> Option<Arc<PeerSession>> {
        self.peers.lock().get(&id).cloned()
    }

    /// The single other participant, if any.
    #[must_use]
    pub fn other(&self, id: PeerId) -> Option<Arc<PeerSession>> {
        self.peers
            .lock()
            .values()
            .find(|s| s.id() != id)
            .cloned()
    }

    /// Every participant except `id`.
    #[must_use]
    pub fn others(&self, id: PeerId) -> Vec<Arc<PeerSession>> {
        self.peers
            .lock()
            .values()
            .filter(|s| s.id() != id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn topology(&self) -> Topology {
        if self.capacity <= 2 {
            Topology::Direct
        } else {
            Topology::Arbitrated
        }
    }
}
