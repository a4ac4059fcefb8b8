//! Core simulation loop: one trial, many ticks.

use anyhow::{bail, Context, Result};
use kilodm_agent::{Agent, AgentError, AgentParams, AgentStats, Tick};
use kilodm_protocol::{
    AgentId, ArenaSensor, CommitmentState, ProtocolError, WireMessage, ARENA_SLOTS, MAX_AGENT_ID,
    RESOURCE_COUNT,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    arena::{Arena, ArenaParams},
    logger::{TraceEntry, TraceLogger},
    swarm::{Body, Delivery, Medium, MediumParams, MediumStats},
};

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub n_agents:         usize,
    pub ticks:            Tick,
    /// Ticks between two arena readings sent to the same agent.
    pub sensing_interval: Tick,
    /// Ticks between two recorded samples.
    pub sample_interval:  Tick,
    /// Distance covered per forward tick.
    pub speed:            f64,
    /// Share of agents committed to one resource that counts as consensus.
    pub consensus:        f64,
    pub arena:            ArenaParams,
    pub medium:           MediumParams,
    pub agent:            AgentParams,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            n_agents:         50,
            ticks:            20_000,
            sensing_interval: 10,
            sample_interval:  310,
            speed:            0.000_5,
            consensus:        0.8,
            arena:            ArenaParams::default(),
            medium:           MediumParams::default(),
            agent:            AgentParams::default(),
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_agents == 0 || self.n_agents > usize::from(MAX_AGENT_ID) + 1 {
            bail!("agent count {} outside 1..={}", self.n_agents, usize::from(MAX_AGENT_ID) + 1);
        }
        if self.sensing_interval == 0 || self.sample_interval == 0 {
            bail!("sensing and sample intervals must be at least one tick");
        }
        for (name, p) in [("loss", self.medium.loss), ("bit_error", self.medium.bit_error)] {
            if !(0.0..=1.0).contains(&p) {
                bail!("medium {name} {p} outside [0, 1]");
            }
        }
        if !(self.medium.comm_radius >= 0.0 && self.medium.comm_radius.is_finite()) {
            bail!("communication radius {} must be finite and non-negative", self.medium.comm_radius);
        }
        self.agent.validate().context("agent parameters")?;
        Ok(())
    }

    /// Turning rate matching the walk's half-turn time.
    fn omega(&self) -> f64 {
        std::f64::consts::PI / self.agent.walk.max_turning_ticks.max(1) as f64
    }
}

// ============================================================================
// Per-trial results
// ============================================================================

/// Swarm state at one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sample {
    pub tick:         Tick,
    pub uncommitted:  usize,
    /// Agents committed to each resource, quorum or not.
    pub committed:    [usize; RESOURCE_COUNT],
    /// Agents with a quorum-confirmed commitment.
    pub quorum:       [usize; RESOURCE_COUNT],
    pub working:      [usize; RESOURCE_COUNT],
    pub populations:  [f64; RESOURCE_COUNT],
}

impl Sample {
    /// Resource with the most committed agents and its share of the swarm.
    pub fn leader(&self) -> (usize, f64) {
        let total: usize = self.uncommitted + self.committed.iter().sum::<usize>();
        let (idx, n) = self
            .committed
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &n)| if n > best.1 { (i, n) } else { best });
        (idx, n as f64 / total.max(1) as f64)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrialResult {
    pub samples:        Vec<Sample>,
    /// First sampled tick at which one resource held the consensus share.
    pub consensus_tick: Option<Tick>,
    pub agent_stats:    AgentStats,
    pub medium:         MediumStats,
    /// Frames the agents' codec rejected, by cause.
    pub checksum_drops: u64,
    pub other_drops:    u64,
}

impl TrialResult {
    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

// ============================================================================
// Single trial
// ============================================================================

pub fn run_trial<R: Rng>(
    params: &SimParams,
    rng:    &mut R,
    mut trace: Option<&mut TraceLogger>,
) -> Result<TrialResult> {
    params.validate()?;

    let arena_params = &params.arena;
    let mut arena = Arena::generate(arena_params, rng)?;
    tracing::debug!(areas = arena.areas().len(), populations = ?arena.populations(), "arena generated");
    let mut medium = Medium::new(params.medium);
    let omega = params.omega();

    let mut agents = Vec::with_capacity(params.n_agents);
    let mut bodies = Vec::with_capacity(params.n_agents);
    for i in 0..params.n_agents {
        let id = AgentId::new(i as u16)?;
        let agent = Agent::with_rng(id, params.agent.clone(), StdRng::seed_from_u64(rng.gen()))?;
        agents.push(agent);
        bodies.push(Body::random(arena_params.radius, rng));
    }

    let mut result = TrialResult::default();

    for now in 1..=params.ticks {
        // ── Arena readings, two agents per frame ───────────────────────────
        let due: Vec<usize> = (0..agents.len())
            .filter(|i| (now + *i as Tick) % params.sensing_interval == 0)
            .collect();
        for chunk in due.chunks(ARENA_SLOTS) {
            let mut sensor = ArenaSensor::default();
            for (slot, &i) in sensor.slots.iter_mut().zip(chunk) {
                *slot = Some(arena.reading(agents[i].id(), &bodies[i]));
            }
            let frame = WireMessage::Arena(sensor).encode()?;
            for &i in chunk {
                agents[i].receive(&frame)?;
            }
        }

        // ── Control cycle + locomotion ──────────────────────────────────────
        for (agent, body) in agents.iter_mut().zip(bodies.iter_mut()) {
            let report = agent.step(now);
            body.apply(report.motion.motion, params.speed, omega, arena_params.radius);
        }

        // ── Radio ───────────────────────────────────────────────────────────
        for sender in 0..agents.len() {
            let Some(frame) = agents[sender].poll_transmit() else { continue };
            medium.broadcast();
            for receiver in 0..agents.len() {
                if receiver == sender {
                    continue;
                }
                let Delivery::Delivered(copy) =
                    medium.carry(&frame, bodies[sender].position, bodies[receiver].position, rng)
                else {
                    continue;
                };
                match agents[receiver].receive(&copy) {
                    Ok(_) => {}
                    Err(AgentError::Protocol(ProtocolError::ChecksumMismatch { .. })) => {
                        result.checksum_drops += 1;
                    }
                    Err(e) => {
                        result.other_drops += 1;
                        tracing::trace!(frame = %hex::encode(copy), error = %e, "undecodable frame");
                    }
                }
            }
            agents[sender].on_transmit_success();
        }

        // ── Environment ─────────────────────────────────────────────────────
        let mut working = [0usize; RESOURCE_COUNT];
        for agent in &agents {
            if let Some(r) = agent.working() {
                working[r.index()] += 1;
            }
        }
        arena.step(working);

        if now % params.sample_interval == 0 || now == params.ticks {
            let sample = sample(now, &agents, working, arena.populations());
            let (leader, share) = sample.leader();
            if result.consensus_tick.is_none() && share >= params.consensus {
                tracing::info!(tick = now, resource = leader, share, "consensus reached");
                result.consensus_tick = Some(now);
            }
            if let Some(logger) = trace.as_deref_mut() {
                logger.log(&TraceEntry {
                    tick:        now,
                    populations: arena.populations(),
                    agents:      agents.iter().map(Agent::debug_info).collect(),
                })?;
            }
            result.samples.push(sample);
        }
    }

    result.medium = medium.stats();
    result.agent_stats = agents.iter().map(Agent::stats).fold(AgentStats::default(), sum_stats);
    Ok(result)
}

fn sample<R: Rng>(
    tick:        Tick,
    agents:      &[Agent<R>],
    working:     [usize; RESOURCE_COUNT],
    populations: [f64; RESOURCE_COUNT],
) -> Sample {
    let mut s = Sample { tick, working, populations, ..Default::default() };
    for agent in agents {
        match agent.commitment() {
            CommitmentState::NotCommitted => s.uncommitted += 1,
            CommitmentState::Seeking(r) => s.committed[r.index()] += 1,
            CommitmentState::QuorumConfirmed(r) => {
                s.committed[r.index()] += 1;
                s.quorum[r.index()] += 1;
            }
        }
    }
    s
}

fn sum_stats(a: AgentStats, b: AgentStats) -> AgentStats {
    AgentStats {
        frames_received:    a.frames_received + b.frames_received,
        frames_dropped:     a.frames_dropped + b.frames_dropped,
        sensor_readings:    a.sensor_readings + b.sensor_readings,
        peer_messages:      a.peer_messages + b.peer_messages,
        duplicates:         a.duplicates + b.duplicates,
        decisions:          a.decisions + b.decisions,
        overflows:          a.overflows + b.overflows,
        commitment_changes: a.commitment_changes + b.commitment_changes,
        own_broadcasts:     a.own_broadcasts + b.own_broadcasts,
        relays:             a.relays + b.relays,
        frames_sent:        a.frames_sent + b.frames_sent,
    }
}
