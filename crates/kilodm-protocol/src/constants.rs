// ============================================================================
// Protocol constants (wire protocol version 1)
// ============================================================================

// --- Frame ------------------------------------------------------------------

/// Payload bytes per frame (same for every message kind).
pub const PAYLOAD_LEN: usize = 9;

/// Checksum bytes trailing every frame.
pub const CHECKSUM_LEN: usize = 2;

/// Full frame: payload, one type byte, checksum.
pub const FRAME_LEN: usize = PAYLOAD_LEN + 1 + CHECKSUM_LEN;

/// Offset of the type discriminator inside a frame.
pub const TYPE_OFFSET: usize = PAYLOAD_LEN;

// --- Resources --------------------------------------------------------------

/// Number of resources tracked by every agent.
pub const RESOURCE_COUNT: usize = 3;

/// Full scale of the fixed-point utility representation (1.0).
pub const UTILITY_SCALE: u8 = u8::MAX;

// --- Identity ---------------------------------------------------------------

/// Bits used to address an agent (1024 agents).
pub const AGENT_ID_BITS: u32 = 10;

/// Largest assignable agent id. `AGENT_ID_BITS` all-ones is reserved.
pub const MAX_AGENT_ID: u16 = (1 << AGENT_ID_BITS) - 2;

/// Id carried by an unused arena slot.
pub const EMPTY_SLOT_ID: u16 = (1 << AGENT_ID_BITS) - 1;

// --- ArenaSensor ------------------------------------------------------------

/// Reading slots per ArenaSensor frame.
pub const ARENA_SLOTS: usize = 2;

/// Bytes per reading slot.
pub const ARENA_SLOT_LEN: usize = 4;

/// Bits per resource utility in an arena reading.
pub const ARENA_UTILITY_BITS: u32 = 5;

/// Largest arena utility value (31 slices of [0, 1]).
pub const ARENA_UTILITY_MAX: u8 = (1 << ARENA_UTILITY_BITS) - 1;

/// Bits used by the signed turn hint.
pub const TURN_HINT_BITS: u32 = 3;

// --- PeerState --------------------------------------------------------------

/// Commitment byte sent by an uncommitted agent.
pub const NOT_COMMITTED_BYTE: u8 = 0xFF;

/// Flag OR-ed onto the resource index of a quorum-confirmed commitment.
pub const QUORUM_FLAG: u8 = 0x80;

/// Arena byte sent by an agent that is over no resource.
pub const NO_RESOURCE_BYTE: u8 = 0xFF;
