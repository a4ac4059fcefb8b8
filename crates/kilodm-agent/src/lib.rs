//! Decision core of a swarm agent choosing among dynamic resources.
//!
//! Agents sense resource utility, exchange commitment states with
//! neighbours over a lossy broadcast channel and move between
//! "not committed" and "committed to r" through four stochastic processes
//! (spontaneous commitment, recruitment, abandonment, cross-inhibition),
//! optionally confirmed by quorum sensing.

pub mod agent;
pub mod config;
pub mod decision;
pub mod draws;
pub mod estimator;
pub mod motion;
pub mod quorum;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testkit;

pub use agent::{Agent, AgentError, AgentStats, DebugInfo, LedColor, Received, StepReport};
pub use config::{AgentParams, ParamsError, ScalingMode, SpontaneousChoice, TICKS_PER_SECOND};
pub use decision::{DecisionEngine, DecisionError, Process, TickReport};
pub use draws::Draws;
pub use estimator::UtilityEstimator;
pub use motion::{Motion, MotionIntent, RandomWalk, WalkParams};
pub use quorum::{fraction_agreeing, QuorumMonitor};
pub use scheduler::{CommunicationScheduler, Outgoing};
pub use store::{InsertOutcome, MessageStore, PeerRecord, RecordKey, Tick};
