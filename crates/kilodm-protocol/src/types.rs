//! Domain values shared by the codec and the agent core.
//!
//! Every type here is a validated newtype or a tagged union: raw bytes only
//! exist inside `payload`, never in decision logic.

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        ARENA_UTILITY_MAX, MAX_AGENT_ID, NOT_COMMITTED_BYTE, NO_RESOURCE_BYTE, QUORUM_FLAG,
        RESOURCE_COUNT, TURN_HINT_BITS, UTILITY_SCALE,
    },
    error::ProtocolError,
};

// ============================================================================
// AgentId
// ============================================================================

/// Swarm-wide agent address, `0..=MAX_AGENT_ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct AgentId(u16);

impl AgentId {
    pub fn new(id: u16) -> Result<Self, ProtocolError> {
        if id > MAX_AGENT_ID {
            return Err(ProtocolError::FieldOutOfRange { field: "agent_id", value: id.into() });
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for AgentId {
    type Error = ProtocolError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<AgentId> for u16 {
    fn from(id: AgentId) -> u16 {
        id.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kb{:04}", self.0)
    }
}

// ============================================================================
// ResourceId
// ============================================================================

/// Index of a tracked resource, `0..RESOURCE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ResourceId(u8);

impl ResourceId {
    pub const FIRST: ResourceId = ResourceId(0);

    pub fn new(index: u8) -> Result<Self, ProtocolError> {
        if usize::from(index) >= RESOURCE_COUNT {
            return Err(ProtocolError::FieldOutOfRange { field: "resource", value: index.into() });
        }
        Ok(Self(index))
    }

    /// Array index for per-resource tables.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Every resource, in index order.
    pub fn all() -> impl Iterator<Item = ResourceId> {
        (0..RESOURCE_COUNT as u8).map(ResourceId)
    }
}

impl TryFrom<u8> for ResourceId {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<ResourceId> for u8 {
    fn from(r: ResourceId) -> u8 {
        r.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Fixed-point value in [0, 1], stored on the 0..=255 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Utility(u8);

impl Utility {
    pub const ZERO: Utility = Utility(0);
    pub const MAX: Utility = Utility(UTILITY_SCALE);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// Nearest fixed-point value. Out-of-range (and NaN) input is clamped.
    pub fn from_fraction(value: f64) -> Self {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        Self((v * f64::from(UTILITY_SCALE)).round() as u8)
    }

    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / f64::from(UTILITY_SCALE)
    }

    /// Expand a 5-bit arena reading (31 slices) onto the byte scale,
    /// rounding up so a non-zero reading never collapses to zero.
    pub fn from_slices(slices: u8) -> Self {
        let s = u16::from(slices.min(ARENA_UTILITY_MAX));
        let max = u16::from(ARENA_UTILITY_MAX);
        Self(((s * u16::from(UTILITY_SCALE) + max - 1) / max) as u8)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Quantize a [0, 1] value into arena slices: `ceil(value * 31)`.
pub fn slices_from_fraction(value: f64) -> u8 {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    ((v * f64::from(ARENA_UTILITY_MAX)).ceil() as u8).min(ARENA_UTILITY_MAX)
}

// ============================================================================
// CommitmentState
// ============================================================================

/// The decision variable of an agent.
///
/// "Working" is not a variant: it is derived by comparing the committed
/// resource with the sensed `ArenaState`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitmentState {
    #[default]
    NotCommitted,
    /// Committed, looking for (or over) the resource, quorum not reached.
    Seeking(ResourceId),
    /// Committed and confirmed by local quorum.
    QuorumConfirmed(ResourceId),
}

impl CommitmentState {
    /// The resource this state is committed to, quorum or not.
    pub fn resource(self) -> Option<ResourceId> {
        match self {
            Self::NotCommitted => None,
            Self::Seeking(r) | Self::QuorumConfirmed(r) => Some(r),
        }
    }

    pub fn is_committed(self) -> bool {
        !matches!(self, Self::NotCommitted)
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::NotCommitted => NOT_COMMITTED_BYTE,
            Self::Seeking(r) => r.as_u8(),
            Self::QuorumConfirmed(r) => QUORUM_FLAG | r.as_u8(),
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        if b == NOT_COMMITTED_BYTE {
            return Ok(Self::NotCommitted);
        }
        let resource = ResourceId::new(b & !QUORUM_FLAG)
            .map_err(|_| ProtocolError::InvalidCommitment(b))?;
        if b & QUORUM_FLAG != 0 {
            Ok(Self::QuorumConfirmed(resource))
        } else {
            Ok(Self::Seeking(resource))
        }
    }
}

impl std::fmt::Display for CommitmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCommitted => write!(f, "not-committed"),
            Self::Seeking(r) => write!(f, "seeking({r})"),
            Self::QuorumConfirmed(r) => write!(f, "quorum({r})"),
        }
    }
}

// ============================================================================
// ArenaState
// ============================================================================

/// The resource area an agent currently stands on, as reported by the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArenaState {
    #[default]
    Outside,
    Over(ResourceId),
}

impl ArenaState {
    pub fn resource(self) -> Option<ResourceId> {
        match self {
            Self::Outside => None,
            Self::Over(r) => Some(r),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Outside => NO_RESOURCE_BYTE,
            Self::Over(r) => r.as_u8(),
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        if b == NO_RESOURCE_BYTE {
            return Ok(Self::Outside);
        }
        ResourceId::new(b)
            .map(Self::Over)
            .map_err(|_| ProtocolError::InvalidArenaState(b))
    }
}

// ============================================================================
// TurnHint
// ============================================================================

/// Signed "turn toward the arena centre" hint in quarter-turns of π/4.
/// Positive turns left (counter-clockwise), zero means no hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct TurnHint(i8);

impl TurnHint {
    pub const NONE: TurnHint = TurnHint(0);
    pub const MIN: i8 = -(1 << (TURN_HINT_BITS - 1));
    pub const MAX: i8 = (1 << (TURN_HINT_BITS - 1)) - 1;

    pub fn new(steps: i8) -> Result<Self, ProtocolError> {
        if !(Self::MIN..=Self::MAX).contains(&steps) {
            return Err(ProtocolError::FieldOutOfRange {
                field: "turn_hint",
                value: steps as u8 as u32,
            });
        }
        Ok(Self(steps))
    }

    pub fn steps(self) -> i8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Signed turning angle in radians.
    pub fn radians(self) -> f64 {
        f64::from(self.0) * std::f64::consts::FRAC_PI_4
    }

    /// Nearest representable hint for a signed angle (radians).
    pub fn from_radians(angle: f64) -> Self {
        let steps = (angle / std::f64::consts::FRAC_PI_4).round();
        Self(steps.clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as i8)
    }
}

impl TryFrom<i8> for TurnHint {
    type Error = ProtocolError;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<TurnHint> for i8 {
    fn from(t: TurnHint) -> i8 {
        t.0
    }
}
