use kilodm_protocol::PeerState;

use crate::{
    config::AgentParams,
    draws::Draws,
    store::{MessageStore, Tick},
};

/// What to put on the air on a communication tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    /// The agent's own current state.
    OwnState,
    /// A buffered peer message, hop count already incremented.
    Relay(PeerState),
}

/// Chooses between re-announcing own state and relaying buffered messages.
#[derive(Debug, Clone)]
pub struct CommunicationScheduler {
    /// Draws on the 0..=255 scale below this re-send own state.
    own_state_threshold: u16,
    valid_until: Tick,
    max_hops: u8,
}

impl CommunicationScheduler {
    pub fn new(params: &AgentParams) -> Self {
        Self {
            own_state_threshold: (params.own_state_probability.clamp(0.0, 1.0) * 256.0).round() as u16,
            valid_until: params.valid_until,
            max_hops: params.max_hops,
        }
    }

    /// Expired records are pruned first. Each buffered record is offered
    /// for relaying at most once; records already at the hop ceiling are
    /// consumed without being sent.
    pub fn tick<D: Draws + ?Sized>(
        &self,
        store: &mut MessageStore,
        now: Tick,
        draws: &mut D,
    ) -> Option<Outgoing> {
        if u16::from(draws.scale()) < self.own_state_threshold {
            return Some(Outgoing::OwnState);
        }

        store.prune(now, self.valid_until);
        while let Some(rec) = store.first_not_rebroadcast() {
            let (key, message) = (rec.key(), rec.message);
            store.mark_rebroadcast(key);
            if message.hops < self.max_hops {
                return Some(Outgoing::Relay(message.relayed()));
            }
        }
        None
    }
}
