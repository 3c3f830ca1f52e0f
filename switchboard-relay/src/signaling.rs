//! Offer/answer state machine
//!
//! The relay is always the answering side: the client offers, the relay
//! sets the remote description, answers, and trickles candidates both
//! ways. Malformed or out-of-order messages are dropped without touching
//! the connection; failures while setting descriptions are fatal to the
//! one session they happened on.

use tracing::{info, warn};

use crate::error::Result;
use crate::message::SignalMessage;
use crate::session::PeerSession;
use crate::types::{IceCandidate, SessionDescription};

/// Handshake progress for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    HaveRemoteOffer,
    AnswerCreated,
    Stable,
}

impl PeerSession {
    /// Dispatch one decoded control message.
    ///
    /// `Ok(Some(reply))` is a message to send back on the control channel.
    /// `Ok(None)` means the message was consumed (or dropped as a protocol
    /// error). `Err` is a negotiation failure: the caller must tear this
    /// session down.
    pub async fn handle_signal(&self, message: SignalMessage) -> Result<Option<SignalMessage>> {
        match message {
            SignalMessage::Offer(offer) => self.handle_offer(offer).await,
            SignalMessage::Answer(_) => {
                warn!(peer = %self.id(), "unexpected answer on the control channel, dropping");
                Ok(None)
            }
            SignalMessage::Ice(candidate) => {
                self.handle_candidate(candidate).await;
                Ok(None)
            }
        }
    }

    /// Run the answering half of the handshake.
    pub async fn handle_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<Option<SignalMessage>> {
        {
            let mut state = self.negotiation.lock();
            if *state != NegotiationState::New {
                warn!(peer = %self.id(), state = ?*state, "offer in unexpected state, dropping");
                return Ok(None);
            }
            *state = NegotiationState::HaveRemoteOffer;
        }

        self.transport().set_remote_description(offer).await?;

        // The remote description is in; candidates held until now apply
        // exactly once, in arrival order.
        self.candidates.flush(self.transport().as_ref()).await;

        let answer = self.transport().create_answer().await?;
        *self.negotiation.lock() = NegotiationState::AnswerCreated;

        self.transport()
            .set_local_description(answer.clone())
            .await?;
        *self.negotiation.lock() = NegotiationState::Stable;

        info!(peer = %self.id(), "answer created");
        Ok(Some(SignalMessage::Answer(answer)))
    }

    /// Route a remote candidate through the buffer. Candidates may arrive
    /// in any state; a candidate the transport rejects is a local error,
    /// not a session failure.
    pub async fn handle_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self
            .candidates
            .buffer_or_apply(self.transport().as_ref(), candidate)
            .await
        {
            warn!(peer = %self.id(), error = %e, "failed to apply candidate");
        }
    }

    #[must_use]
    pub fn negotiation_state(&self) -> NegotiationState {
        *self.negotiation.lock()
    }
}
