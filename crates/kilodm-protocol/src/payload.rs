use crate::{
    constants::{
        ARENA_SLOTS, ARENA_SLOT_LEN, ARENA_UTILITY_BITS, ARENA_UTILITY_MAX, EMPTY_SLOT_ID,
        PAYLOAD_LEN, RESOURCE_COUNT,
    },
    error::ProtocolError,
    hash::digest16,
    types::{AgentId, ArenaState, CommitmentState, ResourceId, TurnHint, Utility},
};

// ============================================================================
// ARENA_SENSOR payload
// ============================================================================
//
// Two 32-bit slots (bytes 0..4, 4..8), byte 8 reserved. Slot layout, MSB first:
//
//   id:10 | arena:2 | u0:5 | u1:5 | u2:5 | turn:3 | reserved:2
//
// arena: 0 = outside, r+1 = over resource r.
// uN:    utility of resource N in 31 slices, 0 = no sample.
// turn:  3-bit two's complement, see `TurnHint`.

const SLOT_ID_SHIFT: u32 = 22;
const SLOT_ARENA_SHIFT: u32 = 20;
const SLOT_UTILITY_SHIFT: [u32; RESOURCE_COUNT] = [15, 10, 5];
const SLOT_TURN_SHIFT: u32 = 2;

/// One agent's sensor reading as computed by the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaReading {
    /// Agent the reading is addressed to.
    pub agent: AgentId,
    /// Resource area under the agent.
    pub arena: ArenaState,
    /// Per-resource utility in arena slices (`0..=31`).
    pub utility: [u8; RESOURCE_COUNT],
    /// Hint for the locomotion layer; unused by the decision core.
    pub turn: TurnHint,
}

impl ArenaReading {
    fn encode_slot(&self) -> Result<u32, ProtocolError> {
        let mut word = u32::from(self.agent.get()) << SLOT_ID_SHIFT;
        let arena_code = match self.arena {
            ArenaState::Outside => 0u32,
            ArenaState::Over(r) => u32::from(r.as_u8()) + 1,
        };
        word |= arena_code << SLOT_ARENA_SHIFT;
        for (slices, shift) in self.utility.iter().zip(SLOT_UTILITY_SHIFT) {
            if *slices > ARENA_UTILITY_MAX {
                return Err(ProtocolError::FieldOutOfRange {
                    field: "arena_utility",
                    value: (*slices).into(),
                });
            }
            word |= u32::from(*slices) << shift;
        }
        word |= u32::from(self.turn.steps() as u8 & 0x07) << SLOT_TURN_SHIFT;
        Ok(word)
    }

    fn decode_slot(word: u32) -> Result<Option<Self>, ProtocolError> {
        let id = ((word >> SLOT_ID_SHIFT) & 0x3FF) as u16;
        if id == EMPTY_SLOT_ID {
            return Ok(None);
        }
        let agent = AgentId::new(id)?;

        let arena = match (word >> SLOT_ARENA_SHIFT) & 0x03 {
            0 => ArenaState::Outside,
            code => ArenaState::Over(ResourceId::new(code as u8 - 1)?),
        };

        let mask = (1u32 << ARENA_UTILITY_BITS) - 1;
        let mut utility = [0u8; RESOURCE_COUNT];
        for (slot, shift) in utility.iter_mut().zip(SLOT_UTILITY_SHIFT) {
            *slot = ((word >> shift) & mask) as u8;
        }

        // Sign-extend the 3-bit hint.
        let raw = ((word >> SLOT_TURN_SHIFT) & 0x07) as i8;
        let turn = TurnHint::new(if raw & 0x04 != 0 { raw - 8 } else { raw })?;

        Ok(Some(Self { agent, arena, utility, turn }))
    }
}

/// Arena → agent frame carrying up to `ARENA_SLOTS` readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaSensor {
    pub slots: [Option<ArenaReading>; ARENA_SLOTS],
}

impl ArenaSensor {
    /// Frame addressed to a single agent.
    pub fn single(reading: ArenaReading) -> Self {
        let mut slots = [None; ARENA_SLOTS];
        slots[0] = Some(reading);
        Self { slots }
    }

    /// The reading addressed to `agent`, if any.
    pub fn reading_for(&self, agent: AgentId) -> Option<&ArenaReading> {
        self.slots.iter().flatten().find(|r| r.agent == agent)
    }

    pub fn encode(&self) -> Result<[u8; PAYLOAD_LEN], ProtocolError> {
        let mut buf = [0u8; PAYLOAD_LEN];
        for (i, slot) in self.slots.iter().enumerate() {
            let word = match slot {
                Some(reading) => reading.encode_slot()?,
                None => u32::from(EMPTY_SLOT_ID) << SLOT_ID_SHIFT,
            };
            let at = i * ARENA_SLOT_LEN;
            buf[at..at + ARENA_SLOT_LEN].copy_from_slice(&word.to_be_bytes());
        }
        Ok(buf)
    }

    pub fn decode(bytes: &[u8; PAYLOAD_LEN]) -> Result<Self, ProtocolError> {
        let mut slots = [None; ARENA_SLOTS];
        for (i, slot) in slots.iter_mut().enumerate() {
            let at = i * ARENA_SLOT_LEN;
            let word = u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
            *slot = ArenaReading::decode_slot(word)?;
        }
        Ok(Self { slots })
    }
}

// ============================================================================
// PEER_STATE payload
// ============================================================================
//
//   [0] id low byte | [1] commitment | [2] arena | [3..6] utility per resource
//   [6] hops | [7] id high bits (2) | [8] utility ceiling

const ID_LOW: usize = 0;
const COMMITMENT: usize = 1;
const ARENA: usize = 2;
const UTILITY: usize = 3;
const HOPS: usize = 6;
const ID_HIGH: usize = 7;
const CEILING: usize = 8;

/// Agent → agent state broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    /// Original sender (unchanged by relays).
    pub sender: AgentId,
    pub commitment: CommitmentState,
    pub arena: ArenaState,
    /// Sender's estimate of every resource.
    pub utility: [Utility; RESOURCE_COUNT],
    /// Number of relays this copy went through.
    pub hops: u8,
    /// Sender's utility ceiling, used for rescaling.
    pub ceiling: Utility,
}

impl PeerState {
    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = self.encode_content();
        buf[HOPS] = self.hops;
        buf
    }

    pub fn decode(bytes: &[u8; PAYLOAD_LEN]) -> Result<Self, ProtocolError> {
        let high = bytes[ID_HIGH];
        if high & !0x03 != 0 {
            return Err(ProtocolError::FieldOutOfRange { field: "sender_high", value: high.into() });
        }
        let sender = AgentId::new(u16::from(high) << 8 | u16::from(bytes[ID_LOW]))?;
        let commitment = CommitmentState::from_byte(bytes[COMMITMENT])?;
        let arena = ArenaState::from_byte(bytes[ARENA])?;

        let mut utility = [Utility::ZERO; RESOURCE_COUNT];
        for (i, u) in utility.iter_mut().enumerate() {
            *u = Utility::from_raw(bytes[UTILITY + i]);
        }

        Ok(Self {
            sender,
            commitment,
            arena,
            utility,
            hops: bytes[HOPS],
            ceiling: Utility::from_raw(bytes[CEILING]),
        })
    }

    /// Content signature: digest of every field except the hop counter, so
    /// relayed copies of one broadcast share a signature.
    pub fn signature(&self) -> u16 {
        digest16(&self.encode_content())
    }

    /// Copy of this message as relayed one more hop.
    pub fn relayed(&self) -> Self {
        Self { hops: self.hops.saturating_add(1), ..*self }
    }

    fn encode_content(&self) -> [u8; PAYLOAD_LEN] {
        let id = self.sender.get();
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[ID_LOW] = (id & 0xFF) as u8;
        buf[ID_HIGH] = (id >> 8) as u8;
        buf[COMMITMENT] = self.commitment.to_byte();
        buf[ARENA] = self.arena.to_byte();
        for (i, u) in self.utility.iter().enumerate() {
            buf[UTILITY + i] = u.raw();
        }
        buf[CEILING] = self.ceiling.raw();
        buf
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
