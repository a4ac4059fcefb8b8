pub mod constants;
pub mod error;
pub mod frame;
pub mod hash;
pub mod message;
pub mod payload;
pub mod types;

pub use constants::*;
pub use error::ProtocolError;
pub use frame::{Frame, WireMessage};
pub use message::MsgType;
pub use payload::{ArenaReading, ArenaSensor, PeerState};
pub use types::{AgentId, ArenaState, CommitmentState, ResourceId, TurnHint, Utility};
