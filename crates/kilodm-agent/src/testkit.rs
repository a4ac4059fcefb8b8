//! Fixtures shared by unit tests.

use kilodm_protocol::{AgentId, ArenaState, CommitmentState, PeerState, ResourceId, Utility};

pub fn r(i: u8) -> ResourceId {
    ResourceId::new(i).unwrap()
}

pub fn id(i: u16) -> AgentId {
    AgentId::new(i).unwrap()
}

/// A fresh (zero-hop) peer state with a per-sender utility pattern.
pub fn peer(sender: u16, commitment: CommitmentState) -> PeerState {
    PeerState {
        sender: id(sender),
        commitment,
        arena: ArenaState::Outside,
        utility: [Utility::from_raw(sender as u8); 3],
        hops: 0,
        ceiling: Utility::MAX,
    }
}
