use crate::{
    constants::{CHECKSUM_LEN, FRAME_LEN, PAYLOAD_LEN, TYPE_OFFSET},
    error::ProtocolError,
    hash::digest16,
    message::MsgType,
    payload::{ArenaSensor, PeerState},
};

/// Fixed-size radio frame.
pub type Frame = [u8; FRAME_LEN];

/// A decoded frame: one variant per logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMessage {
    Arena(ArenaSensor),
    Peer(PeerState),
}

impl WireMessage {
    pub fn kind(&self) -> MsgType {
        match self {
            Self::Arena(_) => MsgType::ArenaSensor,
            Self::Peer(_) => MsgType::PeerState,
        }
    }

    /// Encode to a complete frame:
    ///
    /// `payload[9] | type[1] | checksum[2, big-endian]`
    ///
    /// The checksum covers payload and type byte.
    pub fn encode(&self) -> Result<Frame, ProtocolError> {
        let payload = match self {
            Self::Arena(a) => a.encode()?,
            Self::Peer(p) => p.encode(),
        };
        Ok(seal(payload, self.kind()))
    }

    /// Decode and verify a frame.
    ///
    /// Order of checks: length, checksum, type, payload fields. A corrupted
    /// type byte therefore surfaces as `ChecksumMismatch`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != FRAME_LEN {
            return Err(ProtocolError::FrameLength { expected: FRAME_LEN, actual: bytes.len() });
        }

        let carried = u16::from_be_bytes([bytes[FRAME_LEN - 2], bytes[FRAME_LEN - 1]]);
        let computed = checksum(&bytes[..FRAME_LEN - CHECKSUM_LEN]);
        if carried != computed {
            return Err(ProtocolError::ChecksumMismatch { expected: computed, actual: carried });
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[..PAYLOAD_LEN]);

        match MsgType::from_u8(bytes[TYPE_OFFSET])? {
            MsgType::ArenaSensor => Ok(Self::Arena(ArenaSensor::decode(&payload)?)),
            MsgType::PeerState => Ok(Self::Peer(PeerState::decode(&payload)?)),
        }
    }
}

/// Checksum over `payload || type`.
pub fn checksum(covered: &[u8]) -> u16 {
    digest16(covered)
}

/// Append type byte and checksum to a payload.
pub fn seal(payload: [u8; PAYLOAD_LEN], kind: MsgType) -> Frame {
    let mut frame = [0u8; FRAME_LEN];
    frame[..PAYLOAD_LEN].copy_from_slice(&payload);
    frame[TYPE_OFFSET] = kind.as_u8();
    let crc = checksum(&frame[..FRAME_LEN - CHECKSUM_LEN]);
    frame[FRAME_LEN - CHECKSUM_LEN..].copy_from_slice(&crc.to_be_bytes());
    frame
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        payload::ArenaReading,
        types::{AgentId, ArenaState, CommitmentState, ResourceId, TurnHint, Utility},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn r(i: u8) -> ResourceId {
        ResourceId::new(i).unwrap()
    }

    fn peer_msg() -> WireMessage {
        WireMessage::Peer(PeerState {
            sender: AgentId::new(33).unwrap(),
            commitment: CommitmentState::Seeking(r(1)),
            arena: ArenaState::Over(r(1)),
            utility: [Utility::from_raw(200), Utility::from_raw(99), Utility::ZERO],
            hops: 0,
            ceiling: Utility::MAX,
        })
    }

    fn arena_msg() -> WireMessage {
        WireMessage::Arena(ArenaSensor {
            slots: [
                Some(ArenaReading {
                    agent: AgentId::new(900).unwrap(),
                    arena: ArenaState::Over(r(2)),
                    utility: [0, 0, 17],
                    turn: TurnHint::NONE,
                }),
                Some(ArenaReading {
                    agent: AgentId::new(3).unwrap(),
                    arena: ArenaState::Outside,
                    utility: [0, 0, 0],
                    turn: TurnHint::new(2).unwrap(),
                }),
            ],
        })
    }

    #[test]
    fn round_trip_both_kinds() {
        for msg in [peer_msg(), arena_msg()] {
            let frame = msg.encode().unwrap();
            assert_eq!(frame.len(), 12);
            assert_eq!(frame[TYPE_OFFSET], msg.kind().as_u8());
            assert_eq!(WireMessage::decode(&frame).unwrap(), msg);
        }
    }

    #[test]
    fn random_peer_states_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let commitment = match rng.gen_range(0..3) {
                0 => CommitmentState::NotCommitted,
                1 => CommitmentState::Seeking(r(rng.gen_range(0..3))),
                _ => CommitmentState::QuorumConfirmed(r(rng.gen_range(0..3))),
            };
            let msg = WireMessage::Peer(PeerState {
                sender: AgentId::new(rng.gen_range(0..=crate::MAX_AGENT_ID)).unwrap(),
                commitment,
                arena: if rng.gen_bool(0.5) { ArenaState::Outside } else { ArenaState::Over(r(rng.gen_range(0..3))) },
                utility: [Utility::from_raw(rng.gen()), Utility::from_raw(rng.gen()), Utility::from_raw(rng.gen())],
                hops: rng.gen(),
                ceiling: Utility::from_raw(rng.gen()),
            });
            assert_eq!(WireMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn random_arena_readings_round_trip() {
        let mut rng = StdRng::seed_from_u64(13);
        let max = crate::ARENA_UTILITY_MAX;
        for i in 0..400 {
            let mut reading = || ArenaReading {
                agent: AgentId::new(rng.gen_range(0..=crate::MAX_AGENT_ID)).unwrap(),
                arena: if rng.gen_bool(0.3) { ArenaState::Outside } else { ArenaState::Over(r(rng.gen_range(0..3))) },
                utility: [rng.gen_range(0..=max), rng.gen_range(0..=max), rng.gen_range(0..=max)],
                turn: TurnHint::new(rng.gen_range(TurnHint::MIN..=TurnHint::MAX)).unwrap(),
            };
            let slots = match i % 4 {
                0 => [None, None],
                1 => [Some(reading()), None],
                2 => [None, Some(reading())],
                _ => [Some(reading()), Some(reading())],
            };
            let msg = WireMessage::Arena(ArenaSensor { slots });
            assert_eq!(WireMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn every_turn_hint_and_extreme_id_survive() {
        for steps in TurnHint::MIN..=TurnHint::MAX {
            let msg = WireMessage::Arena(ArenaSensor::single(ArenaReading {
                agent: AgentId::new(crate::MAX_AGENT_ID).unwrap(),
                arena: ArenaState::Over(r(2)),
                utility: [crate::ARENA_UTILITY_MAX; 3],
                turn: TurnHint::new(steps).unwrap(),
            }));
            assert_eq!(WireMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn every_checksum_bit_flip_rejected() {
        for msg in [peer_msg(), arena_msg()] {
            let frame = msg.encode().unwrap();
            for bit in 0..(CHECKSUM_LEN * 8) {
                let mut bad = frame;
                bad[FRAME_LEN - CHECKSUM_LEN + bit / 8] ^= 1 << (bit % 8);
                assert!(matches!(
                    WireMessage::decode(&bad),
                    Err(ProtocolError::ChecksumMismatch { .. })
                ));
            }
        }
    }

    #[test]
    fn payload_bit_flips_mostly_rejected() {
        // A 16-bit digest cannot guarantee every flip is caught; nearly all must be.
        let frame = peer_msg().encode().unwrap();
        let covered_bits = (FRAME_LEN - CHECKSUM_LEN) * 8;
        let rejected = (0..covered_bits)
            .filter(|bit| {
                let mut bad = frame;
                bad[bit / 8] ^= 1 << (bit % 8);
                matches!(WireMessage::decode(&bad), Err(ProtocolError::ChecksumMismatch { .. }))
            })
            .count();
        assert!(rejected >= covered_bits - 2, "only {rejected}/{covered_bits} flips rejected");
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            WireMessage::decode(&[0u8; 11]),
            Err(ProtocolError::FrameLength { expected: 12, actual: 11 })
        );
        assert!(WireMessage::decode(&[]).is_err());
    }

    #[test]
    fn unknown_type_with_valid_checksum_rejected() {
        let mut forged = peer_msg().encode().unwrap();
        forged[TYPE_OFFSET] = 0x07;
        let crc = checksum(&forged[..FRAME_LEN - CHECKSUM_LEN]);
        forged[FRAME_LEN - 2..].copy_from_slice(&crc.to_be_bytes());
        assert_eq!(WireMessage::decode(&forged), Err(ProtocolError::UnknownMsgType(0x07)));
    }

    #[test]
    fn seal_matches_encode() {
        let WireMessage::Peer(p) = peer_msg() else { unreachable!() };
        assert_eq!(seal(p.encode(), MsgType::PeerState), peer_msg().encode().unwrap());
    }
}
