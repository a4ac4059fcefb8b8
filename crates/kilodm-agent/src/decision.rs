//! Commitment finite-state machine.
//!
//! One decision tick runs exactly one branch:
//!
//! - not committed: spontaneous commitment (weight `h`) competes with
//!   recruitment by a random neighbour (weight `k`);
//! - committed to `c`: abandonment (weight `h`, only while the estimate of
//!   `c` is at or below `umin`) competes with cross-inhibition by a random
//!   neighbour committed elsewhere (weight `k`).
//!
//! Both pressures live on the 0..=255 scale and are tested against a single
//! uniform draw `x`: the first wins if `x < p1`, the second if
//! `x - p1 < p2`. A seeking agent may then be promoted by quorum sensing.

use kilodm_protocol::{CommitmentState, ResourceId, Utility, RESOURCE_COUNT, UTILITY_SCALE};
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{AgentParams, ScalingMode, SpontaneousChoice},
    draws::Draws,
    estimator::UtilityEstimator,
    quorum::QuorumMonitor,
    store::MessageStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// The two competing pressures of one branch sum past the draw range.
    /// The tick is skipped and the state left unchanged.
    #[error("pressure overflow: {first} + {second} > 255")]
    Overflow { first: u8, second: u8 },
}

/// Which process moved the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    Spontaneous,
    Recruitment,
    Abandonment,
    CrossInhibition,
}

/// Outcome of one successful decision tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub before: CommitmentState,
    pub after: CommitmentState,
    /// Pressures of the branch that ran, in test order.
    pub pressures: [u8; 2],
    pub draw: u8,
    pub cause: Option<Process>,
    /// Quorum sensing promoted the agent this tick.
    pub promoted: bool,
}

impl TickReport {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    state: CommitmentState,
    h: f64,
    k: f64,
    umin: [Utility; RESOURCE_COUNT],
    choice: SpontaneousChoice,
    scaling: ScalingMode,
    quorum: QuorumMonitor,
}

impl DecisionEngine {
    pub fn new(params: &AgentParams) -> Self {
        let mut umin = [Utility::ZERO; RESOURCE_COUNT];
        for r in ResourceId::all() {
            umin[r.index()] = params.umin_of(r);
        }
        Self {
            state: CommitmentState::NotCommitted,
            h: params.h,
            k: params.k,
            umin,
            choice: params.spontaneous_choice,
            scaling: params.scaling,
            quorum: QuorumMonitor::new(params.quorum_threshold),
        }
    }

    pub fn state(&self) -> CommitmentState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = CommitmentState::NotCommitted;
    }

    /// Run one decision tick. On `Err` nothing changed.
    pub fn tick<D: Draws + ?Sized>(
        &mut self,
        estimator: &UtilityEstimator,
        store: &MessageStore,
        draws: &mut D,
    ) -> Result<TickReport, DecisionError> {
        let before = self.state;
        let (pressures, draw, outcome) = match before.resource() {
            None => self.uncommitted_branch(estimator, store, draws)?,
            Some(c) => self.committed_branch(c, estimator, store, draws)?,
        };

        let (mut after, cause) = match outcome {
            Some((process, next)) => (next, Some(process)),
            None => (before, None),
        };

        let promoted_to = self.quorum.check(after, store);
        let promoted = promoted_to != after;
        after = promoted_to;

        self.state = after;
        Ok(TickReport { before, after, pressures, draw, cause, promoted })
    }

    fn uncommitted_branch<D: Draws + ?Sized>(
        &self,
        estimator: &UtilityEstimator,
        store: &MessageStore,
        draws: &mut D,
    ) -> Result<([u8; 2], u8, Option<(Process, CommitmentState)>), DecisionError> {
        let candidate = match self.choice {
            SpontaneousChoice::HighestEstimate => estimator.highest().0,
            SpontaneousChoice::Uniform => {
                let i = draws.index(RESOURCE_COUNT);
                ResourceId::all().nth(i).unwrap_or(ResourceId::FIRST)
            }
        };
        let spontaneous = self.pressure(candidate, estimator).map_or(0, |u| weigh(u, self.h));

        let recruiter = store.pick_random(draws).and_then(|rec| rec.commitment().resource());
        let recruitment = recruiter
            .and_then(|r| self.pressure(r, estimator))
            .map_or(0, |u| weigh_interactive(u, self.k));

        check_sum(spontaneous, recruitment)?;
        let x = draws.scale();

        let outcome = if x < spontaneous {
            Some((Process::Spontaneous, CommitmentState::Seeking(candidate)))
        } else {
            match recruiter {
                Some(r) if x - spontaneous < recruitment => {
                    Some((Process::Recruitment, CommitmentState::Seeking(r)))
                }
                _ => None,
            }
        };
        Ok(([spontaneous, recruitment], x, outcome))
    }

    fn committed_branch<D: Draws + ?Sized>(
        &self,
        c: ResourceId,
        estimator: &UtilityEstimator,
        store: &MessageStore,
        draws: &mut D,
    ) -> Result<([u8; 2], u8, Option<(Process, CommitmentState)>), DecisionError> {
        let abandonment = if estimator.read(c) <= self.umin[c.index()] {
            weigh(Utility::MAX, self.h)
        } else {
            0
        };

        let inhibitor = store
            .pick_random(draws)
            .and_then(|rec| rec.commitment().resource())
            .filter(|r| *r != c);
        let inhibition = inhibitor
            .and_then(|r| self.pressure(r, estimator))
            .map_or(0, |u| weigh_interactive(u, self.k));

        check_sum(abandonment, inhibition)?;
        let x = draws.scale();

        let outcome = if x < abandonment {
            Some((Process::Abandonment, CommitmentState::NotCommitted))
        } else if x - abandonment < inhibition {
            Some((Process::CrossInhibition, CommitmentState::NotCommitted))
        } else {
            None
        };
        Ok(([abandonment, inhibition], x, outcome))
    }

    /// Unweighted pressure of resource `r`, or `None` while its estimate
    /// does not exceed `umin`.
    fn pressure(&self, r: ResourceId, estimator: &UtilityEstimator) -> Option<Utility> {
        let umin = self.umin[r.index()];
        let u = estimator.read(r);
        if u <= umin {
            return None;
        }
        Some(match self.scaling {
            ScalingMode::Raw => u,
            ScalingMode::Rescaled => estimator.scaled(r, umin),
        })
    }

    #[cfg(test)]
    fn with_state(params: &AgentParams, state: CommitmentState) -> Self {
        Self { state, ..Self::new(params) }
    }
}

/// Own-information pressure, rounded.
fn weigh(u: Utility, weight: f64) -> u8 {
    (f64::from(u.raw()) * weight).round().clamp(0.0, f64::from(UTILITY_SCALE)) as u8
}

/// Interactive pressure, floored: with `h + k <= 1` the pair never
/// exceeds the scale.
fn weigh_interactive(u: Utility, weight: f64) -> u8 {
    (f64::from(u.raw()) * weight).floor().clamp(0.0, f64::from(UTILITY_SCALE)) as u8
}

fn check_sum(first: u8, second: u8) -> Result<(), DecisionError> {
    if u16::from(first) + u16::from(second) > u16::from(UTILITY_SCALE) {
        return Err(DecisionError::Overflow { first, second });
    }
    Ok(())
}
