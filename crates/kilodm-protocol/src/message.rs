use crate::error::ProtocolError;

/// Frame type discriminator (the byte following the payload).
///
/// The two values are the two logical channels of the broadcast medium:
/// arena-to-agent and agent-to-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    /// Arena → agent: sensed position, per-resource utility, turn hint.
    ArenaSensor = 0x00,
    /// Agent → agent: sender's commitment, estimates and relay hop count.
    PeerState = 0x01,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            0x00 => Ok(Self::ArenaSensor),
            0x01 => Ok(Self::PeerState),
            other => Err(ProtocolError::UnknownMsgType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ArenaSensor => "ARENA_SENSOR",
            Self::PeerState => "PEER_STATE",
        };
        write!(f, "{}", name)
    }
}
