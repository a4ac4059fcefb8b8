use kilodm_protocol::{ResourceId, Utility, RESOURCE_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{motion::WalkParams, store::Tick};

/// Controller clock rate: kilobot ticks per second.
pub const TICKS_PER_SECOND: u64 = 31;

/// How the spontaneous-commitment process picks its candidate resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpontaneousChoice {
    /// The resource with the highest current estimate (lowest index on ties).
    #[default]
    HighestEstimate,
    /// A resource drawn uniformly at random.
    Uniform,
}

/// How an estimate is turned into a process pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// `pressure = estimate * weight`.
    #[default]
    Raw,
    /// Estimate first stretched from `[umin, ceiling]` onto the full scale.
    Rescaled,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("parameter {name} = {value} outside {range}")]
    OutOfRange { name: &'static str, value: f64, range: &'static str },

    #[error("decision interval must be at least one tick")]
    ZeroDecisionInterval,
}

/// Every tunable of one agent.
///
/// Loaded from JSON by harnesses; missing fields take the defaults below,
/// which reproduce the field-tested controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    /// Weight of processes driven by own information (spontaneous commitment,
    /// abandonment).
    pub h: f64,
    /// Weight of interactive processes (recruitment, cross-inhibition).
    pub k: f64,
    /// Minimum viable utility per resource, as a fraction of full scale.
    pub umin: [f64; RESOURCE_COUNT],
    /// EMA smoothing for the agent's own sensing.
    pub ema_alpha: f64,
    /// EMA smoothing when blending estimates reported by peers.
    pub peer_alpha: f64,
    /// Fraction of distinct neighbours that must agree for quorum. 0 disables.
    pub quorum_threshold: f64,
    /// Age (ticks) after which a buffered peer message is discarded.
    pub valid_until: Tick,
    /// Ticks between two decision ticks (exploration time).
    pub decision_interval: Tick,
    /// Minimum ticks between two relay attempts.
    pub broadcast_interval: Tick,
    /// Probability of re-sending own state instead of relaying.
    pub own_state_probability: f64,
    /// Messages that already travelled this many hops are not relayed again.
    pub max_hops: u8,
    pub spontaneous_choice: SpontaneousChoice,
    pub scaling: ScalingMode,
    pub walk: WalkParams,
    /// Seed for the agent's random source. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            h: 1.0 / 9.0,
            k: 8.0 / 9.0,
            umin: [0.6; RESOURCE_COUNT],
            ema_alpha: 0.1,
            peer_alpha: 0.1,
            quorum_threshold: 0.0,
            valid_until: 15 * TICKS_PER_SECOND,
            decision_interval: 5 * TICKS_PER_SECOND,
            broadcast_interval: 0,
            own_state_probability: 0.2,
            max_hops: u8::MAX,
            spontaneous_choice: SpontaneousChoice::default(),
            scaling: ScalingMode::default(),
            walk: WalkParams::default(),
            seed: None,
        }
    }
}

impl AgentParams {
    /// Reject values the decision processes cannot work with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        open_unit("h", self.h)?;
        open_unit("k", self.k)?;
        for u in self.umin {
            closed_unit("umin", u)?;
        }
        half_open_unit("ema_alpha", self.ema_alpha)?;
        half_open_unit("peer_alpha", self.peer_alpha)?;
        closed_unit("quorum_threshold", self.quorum_threshold)?;
        closed_unit("own_state_probability", self.own_state_probability)?;
        if self.decision_interval == 0 {
            return Err(ParamsError::ZeroDecisionInterval);
        }
        Ok(())
    }

    /// Minimum viable utility of `r` on the fixed-point scale.
    pub fn umin_of(&self, r: ResourceId) -> Utility {
        Utility::from_fraction(self.umin[r.index()])
    }

    pub fn quorum_enabled(&self) -> bool {
        self.quorum_threshold > 0.0
    }
}

fn open_unit(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, value, range: "(0, 1)" })
    }
}

fn half_open_unit(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, value, range: "(0, 1]" })
    }
}

fn closed_unit(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, value, range: "[0, 1]" })
    }
}
