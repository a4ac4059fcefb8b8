//! One swarm member: estimator, message buffer, commitment FSM and
//! communication schedule behind a tick-driven interface.
//!
//! The host drives it with three calls per control cycle:
//!
//! - [`Agent::receive`] for every frame heard since the last cycle;
//! - [`Agent::step`] once per tick;
//! - [`Agent::poll_transmit`] / [`Agent::on_transmit_success`] around the
//!   radio.

use kilodm_protocol::{
    frame::seal, AgentId, ArenaReading, ArenaState, CommitmentState, Frame, MsgType, PeerState,
    ProtocolError, ResourceId, TurnHint, Utility, WireMessage, RESOURCE_COUNT,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{AgentParams, ParamsError},
    decision::{DecisionEngine, DecisionError, TickReport},
    estimator::UtilityEstimator,
    motion::{MotionIntent, RandomWalk},
    quorum::fraction_agreeing,
    scheduler::{CommunicationScheduler, Outgoing},
    store::{InsertOutcome, MessageStore, PeerRecord, Tick},
};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid parameters: {0}")]
    Params(#[from] ParamsError),
}

/// What a received frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Arena reading addressed to this agent, folded into the estimates.
    Sensed,
    /// Arena frame for other agents.
    NotAddressed,
    /// New peer message buffered.
    Stored,
    /// Peer message already buffered (possibly a relayed copy).
    Duplicate,
    /// Our own broadcast, echoed back by a relay.
    Own,
}

/// Status light: one colour per committed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Off,
    Red,
    Green,
    Blue,
}

impl LedColor {
    pub fn for_commitment(state: CommitmentState) -> Self {
        match state.resource().map(ResourceId::index) {
            None => Self::Off,
            Some(0) => Self::Red,
            Some(1) => Self::Green,
            Some(_) => Self::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub frames_received: u64,
    /// Frames rejected by the codec (checksum, length, unknown type, fields).
    pub frames_dropped: u64,
    pub sensor_readings: u64,
    pub peer_messages: u64,
    pub duplicates: u64,
    pub decisions: u64,
    /// Decision ticks skipped because the pressures overflowed.
    pub overflows: u64,
    pub commitment_changes: u64,
    pub own_broadcasts: u64,
    pub relays: u64,
    pub frames_sent: u64,
}

/// Serializable snapshot for operators and trace logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub agent: AgentId,
    pub tick: Tick,
    pub commitment: CommitmentState,
    pub arena: ArenaState,
    pub working: bool,
    pub led: LedColor,
    pub estimates: [Utility; RESOURCE_COUNT],
    pub ceiling: Utility,
    /// Sensor readings received while outside any area.
    pub hits_outside: u64,
    /// Sensor readings received over each resource.
    pub hits: [u64; RESOURCE_COUNT],
    pub buffered: usize,
    pub distinct_neighbours: usize,
    /// Fraction of neighbours sharing the current commitment.
    pub agreement: f64,
    pub stats: AgentStats,
}

/// Everything one [`Agent::step`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub decision: Option<TickReport>,
    pub overflow: Option<DecisionError>,
    pub motion: MotionIntent,
    /// A frame is waiting in the outbox.
    pub transmit_ready: bool,
}

pub struct Agent<R = StdRng> {
    id: AgentId,
    params: AgentParams,
    estimator: UtilityEstimator,
    store: MessageStore,
    engine: DecisionEngine,
    scheduler: CommunicationScheduler,
    walk: RandomWalk,
    arena: ArenaState,
    turn_hint: TurnHint,
    now: Tick,
    last_decision: Tick,
    last_broadcast: Tick,
    outbox: Option<Frame>,
    /// The last handed-out frame was confirmed on air.
    sent: bool,
    hits_outside: u64,
    hits: [u64; RESOURCE_COUNT],
    stats: AgentStats,
    rng: R,
}

impl Agent<StdRng> {
    /// Build an agent seeded from `params.seed`, or from OS entropy.
    pub fn new(id: AgentId, params: AgentParams) -> Result<Self, AgentError> {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(id.get())),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(id, params, rng)
    }
}

impl<R: Rng> Agent<R> {
    pub fn with_rng(id: AgentId, params: AgentParams, rng: R) -> Result<Self, AgentError> {
        params.validate()?;
        Ok(Self {
            id,
            estimator: UtilityEstimator::new(params.ema_alpha),
            store: MessageStore::new(),
            engine: DecisionEngine::new(&params),
            scheduler: CommunicationScheduler::new(&params),
            walk: RandomWalk::new(params.walk),
            arena: ArenaState::Outside,
            turn_hint: TurnHint::NONE,
            now: 0,
            last_decision: 0,
            last_broadcast: 0,
            outbox: None,
            sent: true,
            hits_outside: 0,
            hits: [0; RESOURCE_COUNT],
            stats: AgentStats::default(),
            params,
            rng,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn commitment(&self) -> CommitmentState {
        self.engine.state()
    }

    pub fn arena(&self) -> ArenaState {
        self.arena
    }

    /// The resource being exploited: committed to it and standing over it.
    pub fn working(&self) -> Option<ResourceId> {
        self.commitment().resource().filter(|r| self.arena.resource() == Some(*r))
    }

    pub fn led(&self) -> LedColor {
        LedColor::for_commitment(self.commitment())
    }

    pub fn estimator(&self) -> &UtilityEstimator {
        &self.estimator
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    /// Handle one frame heard on the radio.
    ///
    /// Frames that fail to decode are counted and returned as errors; they
    /// never change agent state.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Received, AgentError> {
        self.stats.frames_received += 1;
        let msg = match WireMessage::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                self.stats.frames_dropped += 1;
                tracing::trace!(agent = %self.id, error = %e, "frame dropped");
                return Err(e.into());
            }
        };

        match msg {
            WireMessage::Arena(sensor) => match sensor.reading_for(self.id) {
                Some(reading) => {
                    self.sense(*reading);
                    Ok(Received::Sensed)
                }
                None => Ok(Received::NotAddressed),
            },
            WireMessage::Peer(state) if state.sender == self.id => Ok(Received::Own),
            WireMessage::Peer(state) => Ok(self.hear(state)),
        }
    }

    fn sense(&mut self, reading: ArenaReading) {
        self.stats.sensor_readings += 1;
        self.arena = reading.arena;
        self.turn_hint = reading.turn;
        match reading.arena.resource() {
            Some(r) => self.hits[r.index()] += 1,
            None => self.hits_outside += 1,
        }
        for r in ResourceId::all() {
            self.estimator.update(r, Utility::from_slices(reading.utility[r.index()]));
        }
    }

    fn hear(&mut self, state: PeerState) -> Received {
        match self.store.insert(PeerRecord::new(state, self.now)) {
            InsertOutcome::DuplicateIgnored => {
                self.stats.duplicates += 1;
                Received::Duplicate
            }
            InsertOutcome::Inserted => {
                self.stats.peer_messages += 1;
                for r in ResourceId::all() {
                    self.estimator.blend(r, state.utility[r.index()], self.params.peer_alpha);
                }
                self.estimator.blend_ceiling(state.ceiling, self.params.peer_alpha);
                Received::Stored
            }
        }
    }

    /// Run the control cycle for tick `now`.
    pub fn step(&mut self, now: Tick) -> StepReport {
        self.now = now;
        let mut decision = None;
        let mut overflow = None;

        if now.saturating_sub(self.last_decision) >= self.params.decision_interval {
            self.last_decision = now;
            self.store.prune(now, self.params.valid_until);
            let before = self.engine.state();
            self.stats.decisions += 1;
            match self.engine.tick(&self.estimator, &self.store, &mut self.rng) {
                Ok(report) => {
                    if report.changed() {
                        self.stats.commitment_changes += 1;
                        tracing::debug!(
                            agent = %self.id,
                            from = %report.before,
                            to = %report.after,
                            cause = ?report.cause,
                            "commitment changed"
                        );
                    }
                    self.track_ceiling(before);
                    decision = Some(report);
                }
                Err(e) => {
                    self.stats.overflows += 1;
                    tracing::warn!(agent = %self.id, error = %e, "decision tick skipped");
                    overflow = Some(e);
                }
            }
            self.queue_own_state();
        } else if self.sent && now.saturating_sub(self.last_broadcast) >= self.params.broadcast_interval {
            self.last_broadcast = now;
            match self.scheduler.tick(&mut self.store, now, &mut self.rng) {
                Some(Outgoing::OwnState) => self.queue_own_state(),
                Some(Outgoing::Relay(state)) => {
                    tracing::trace!(agent = %self.id, sender = %state.sender, hops = state.hops, "relaying");
                    self.stats.relays += 1;
                    self.queue(state);
                }
                None => {}
            }
        }

        let working = self.working().is_some();
        let motion = self.walk.step(now, working, self.turn_hint, &mut self.rng);
        StepReport { decision, overflow, motion, transmit_ready: self.outbox.is_some() }
    }

    /// Committing to a new resource refreshes the ceiling with the best
    /// own estimate.
    fn track_ceiling(&mut self, before: CommitmentState) {
        let after = self.engine.state();
        if after.resource().is_some() && after.resource() != before.resource() {
            let (_, best) = self.estimator.highest();
            self.estimator.blend_ceiling(best, self.params.ema_alpha);
        }
    }

    pub fn own_state(&self) -> PeerState {
        PeerState {
            sender: self.id,
            commitment: self.engine.state(),
            arena: self.arena,
            utility: self.estimator.snapshot(),
            hops: 0,
            ceiling: self.estimator.ceiling(),
        }
    }

    fn queue_own_state(&mut self) {
        self.stats.own_broadcasts += 1;
        self.queue(self.own_state());
    }

    fn queue(&mut self, state: PeerState) {
        self.outbox = Some(seal(state.encode(), MsgType::PeerState));
        self.sent = false;
    }

    /// Take the pending frame, if any. Each frame is handed out once.
    pub fn poll_transmit(&mut self) -> Option<Frame> {
        self.outbox.take()
    }

    /// The radio confirmed the last frame; relaying may resume.
    pub fn on_transmit_success(&mut self) {
        self.sent = true;
        self.stats.frames_sent += 1;
    }

    /// Forget everything learned and return to the uncommitted state.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.store.clear();
        self.engine.reset();
        self.arena = ArenaState::Outside;
        self.turn_hint = TurnHint::NONE;
        self.outbox = None;
        self.sent = true;
        self.hits_outside = 0;
        self.hits = [0; RESOURCE_COUNT];
    }

    /// Snapshot of the agent. Buffer figures only count records still
    /// valid at the last step.
    pub fn debug_info(&self) -> DebugInfo {
        let commitment = self.commitment();
        let mut fresh = self.store.clone();
        fresh.prune(self.now, self.params.valid_until);
        DebugInfo {
            agent: self.id,
            tick: self.now,
            commitment,
            arena: self.arena,
            working: self.working().is_some(),
            led: self.led(),
            estimates: self.estimator.snapshot(),
            ceiling: self.estimator.ceiling(),
            hits_outside: self.hits_outside,
            hits: self.hits,
            buffered: fresh.len(),
            distinct_neighbours: fresh.distinct_senders(),
            agreement: if commitment.is_committed() {
                fraction_agreeing(commitment, &fresh)
            } else {
                0.0
            },
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{id, peer, r};
    use kilodm_protocol::ArenaSensor;

    fn agent(params: AgentParams) -> Agent<StdRng> {
        Agent::with_rng(id(5), params, StdRng::seed_from_u64(42)).unwrap()
    }

    fn arena_frame(agent: AgentId, arena: ArenaState, utility: [u8; 3]) -> Frame {
        WireMessage::Arena(ArenaSensor::single(ArenaReading { agent, arena, utility, turn: TurnHint::NONE }))
            .encode()
            .unwrap()
    }

    fn peer_frame(state: PeerState) -> Frame {
        WireMessage::Peer(state).encode().unwrap()
    }

    #[test]
    fn invalid_params_rejected() {
        let params = AgentParams { h: 1.5, ..Default::default() };
        assert!(matches!(
            Agent::with_rng(id(1), params, StdRng::seed_from_u64(0)),
            Err(AgentError::Params(_))
        ));
    }

    #[test]
    fn sensing_updates_arena_and_estimate() {
        let mut a = agent(AgentParams { ema_alpha: 1.0, ..Default::default() });
        let frame = arena_frame(id(5), ArenaState::Over(r(1)), [0, 31, 0]);
        assert_eq!(a.receive(&frame).unwrap(), Received::Sensed);
        assert_eq!(a.arena(), ArenaState::Over(r(1)));
        assert_eq!(a.estimator().read(r(1)), Utility::MAX);
        assert_eq!(a.debug_info().hits, [0, 1, 0]);

        let other = arena_frame(id(6), ArenaState::Over(r(2)), [0, 0, 31]);
        assert_eq!(a.receive(&other).unwrap(), Received::NotAddressed);
        assert_eq!(a.arena(), ArenaState::Over(r(1)));
    }

    #[test]
    fn corrupted_frame_counted_and_ignored() {
        let mut a = agent(AgentParams::default());
        let mut frame = peer_frame(peer(9, CommitmentState::Seeking(r(0))));
        frame[11] ^= 0x01;
        assert!(matches!(
            a.receive(&frame),
            Err(AgentError::Protocol(ProtocolError::ChecksumMismatch { .. }))
        ));
        assert!(a.store().is_empty());
        assert_eq!(a.stats().frames_dropped, 1);
    }

    #[test]
    fn peer_messages_buffered_once() {
        let mut a = agent(AgentParams::default());
        let state = peer(9, CommitmentState::Seeking(r(0)));
        assert_eq!(a.receive(&peer_frame(state)).unwrap(), Received::Stored);
        assert_eq!(a.receive(&peer_frame(state.relayed())).unwrap(), Received::Duplicate);
        assert_eq!(a.store().len(), 1);
        // Peer utility (9) blended with peer_alpha 0.1 into every resource.
        assert!(a.estimator().estimate(r(0)) > 0.0);
    }

    #[test]
    fn own_echo_ignored() {
        let mut a = agent(AgentParams::default());
        let echo = a.own_state().relayed();
        assert_eq!(a.receive(&peer_frame(echo)).unwrap(), Received::Own);
        assert!(a.store().is_empty());
    }

    #[test]
    fn decision_tick_broadcasts_own_state_once() {
        let mut a = agent(AgentParams { decision_interval: 10, ..Default::default() });
        for t in 1..10 {
            a.step(t);
        }
        let report = a.step(10);
        assert!(report.decision.is_some());
        assert!(report.transmit_ready);

        let frame = a.poll_transmit().unwrap();
        assert!(a.poll_transmit().is_none());
        let WireMessage::Peer(sent) = WireMessage::decode(&frame).unwrap() else {
            panic!("expected peer state");
        };
        assert_eq!(sent.sender, id(5));
        assert_eq!(sent.hops, 0);
        assert_eq!(sent.commitment, a.commitment());
    }

    #[test]
    fn no_relay_until_transmit_confirmed() {
        let mut a = agent(AgentParams {
            decision_interval: 1_000,
            own_state_probability: 0.0,
            ..Default::default()
        });
        a.receive(&peer_frame(peer(1, CommitmentState::NotCommitted))).unwrap();
        a.receive(&peer_frame(peer(2, CommitmentState::NotCommitted))).unwrap();

        assert!(a.step(1).transmit_ready);
        let WireMessage::Peer(first) = WireMessage::decode(&a.poll_transmit().unwrap()).unwrap() else {
            panic!("expected peer state");
        };
        assert_eq!((first.sender, first.hops), (id(1), 1));

        assert!(!a.step(2).transmit_ready);
        a.on_transmit_success();
        assert!(a.step(3).transmit_ready);
        assert_eq!(a.stats().relays, 2);
    }

    #[test]
    fn working_agent_stops_and_lights_up() {
        let mut a = agent(AgentParams { h: 0.9, k: 0.05, ema_alpha: 1.0, decision_interval: 1, ..Default::default() });
        a.receive(&arena_frame(id(5), ArenaState::Over(r(2)), [0, 0, 31])).unwrap();
        // Spontaneous pressure is about 230 of 255: commits within a few ticks.
        let mut t = 0;
        while a.commitment() == CommitmentState::NotCommitted && t < 50 {
            t += 1;
            a.step(t);
        }
        assert_eq!(a.commitment(), CommitmentState::Seeking(r(2)));
        assert_eq!(a.working(), Some(r(2)));
        assert_eq!(a.led(), LedColor::Blue);
        assert_eq!(a.step(t + 1).motion.motion, crate::motion::Motion::Stop);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut a = agent(AgentParams { ema_alpha: 1.0, ..Default::default() });
        a.receive(&arena_frame(id(5), ArenaState::Over(r(0)), [20, 0, 0])).unwrap();
        a.receive(&peer_frame(peer(3, CommitmentState::Seeking(r(0))))).unwrap();
        a.reset();
        let info = a.debug_info();
        assert_eq!(info.estimates, [Utility::ZERO; 3]);
        assert_eq!(info.buffered, 0);
        assert_eq!(info.arena, ArenaState::Outside);
        assert_eq!(info.commitment, CommitmentState::NotCommitted);
    }

    #[test]
    fn debug_info_ignores_expired_records() {
        let mut a = agent(AgentParams {
            valid_until: 10,
            decision_interval: 1_000,
            own_state_probability: 0.0,
            ..Default::default()
        });
        a.receive(&peer_frame(peer(1, CommitmentState::Seeking(r(0))))).unwrap();
        a.step(5);
        a.receive(&peer_frame(peer(2, CommitmentState::Seeking(r(0))))).unwrap();
        assert_eq!(a.debug_info().buffered, 2);

        // Outbox unconfirmed: no communication tick prunes the buffer.
        a.step(20);
        assert_eq!(a.store().len(), 2);
        let info = a.debug_info();
        assert_eq!(info.buffered, 0);
        assert_eq!(info.distinct_neighbours, 0);
    }

    #[test]
    fn debug_info_serializes() {
        let a = agent(AgentParams::default());
        let json = serde_json::to_value(a.debug_info()).unwrap();
        assert_eq!(json["agent"], 5);
        assert_eq!(json["led"], "off");
    }
}
