//! Motion intents and the correlated random walk used while exploring.

use std::f64::consts::PI;

use kilodm_protocol::TurnHint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::store::Tick;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    #[default]
    Forward,
    TurnLeft,
    TurnRight,
    Stop,
}

/// What the locomotion layer should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotionIntent {
    pub motion: Motion,
    /// Ticks this motion is planned to last from its start. 0 for `Stop`.
    pub planned: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkParams {
    /// Standard deviation (ticks) of straight-line segments.
    pub std_motion_steps: f64,
    /// Ticks needed for a half turn.
    pub max_turning_ticks: Tick,
    /// Wrapped-Cauchy concentration of turning angles. 0 draws angles
    /// uniformly on [0, π]; values near 1 keep headings straight.
    pub crw_rho: f64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self { std_motion_steps: 310.0, max_turning_ticks: 80, crw_rho: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct RandomWalk {
    params: WalkParams,
    current: Motion,
    started: Tick,
    turning_ticks: Tick,
    straight_ticks: Tick,
}

impl RandomWalk {
    pub fn new(params: WalkParams) -> Self {
        Self { params, current: Motion::Forward, started: 0, turning_ticks: 0, straight_ticks: 0 }
    }

    pub fn current(&self) -> Motion {
        self.current
    }

    /// Advance the walk to `now`.
    ///
    /// A working agent stops. A turn hint from the arena pre-empts a
    /// straight segment and turns toward the hinted side.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        now: Tick,
        working: bool,
        hint: TurnHint,
        rng: &mut R,
    ) -> MotionIntent {
        if working {
            self.current = Motion::Stop;
            return self.intent();
        }

        if !hint.is_none() && matches!(self.current, Motion::Forward | Motion::Stop) {
            let motion = if hint.steps() > 0 { Motion::TurnLeft } else { Motion::TurnRight };
            self.begin_turn(now, motion, hint.radians().abs(), rng);
            return self.intent();
        }

        match self.current {
            Motion::TurnLeft | Motion::TurnRight => {
                if now > self.started + self.turning_ticks {
                    self.current = Motion::Forward;
                    self.started = now;
                }
            }
            Motion::Forward => {
                if now > self.started + self.straight_ticks {
                    let motion = if rng.gen_bool(0.5) { Motion::TurnLeft } else { Motion::TurnRight };
                    let angle = self.turn_angle(rng);
                    self.begin_turn(now, motion, angle, rng);
                }
            }
            Motion::Stop => {
                self.current = Motion::Forward;
                self.started = now;
            }
        }
        self.intent()
    }

    fn begin_turn<R: Rng + ?Sized>(&mut self, now: Tick, motion: Motion, angle: f64, rng: &mut R) {
        self.current = motion;
        self.started = now;
        self.turning_ticks = ((angle / PI) * self.params.max_turning_ticks as f64) as Tick;
        self.straight_ticks = (gaussian(rng) * self.params.std_motion_steps).abs() as Tick;
    }

    fn turn_angle<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.params.crw_rho <= 0.0 {
            rng.gen_range(0.0..PI)
        } else {
            wrapped_cauchy(self.params.crw_rho, rng).abs()
        }
    }

    fn intent(&self) -> MotionIntent {
        let planned = match self.current {
            Motion::Forward => self.straight_ticks,
            Motion::TurnLeft | Motion::TurnRight => self.turning_ticks,
            Motion::Stop => 0,
        };
        MotionIntent { motion: self.current, planned }
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Wrapped-Cauchy angle in (-π, π) with concentration `rho` in (0, 1).
fn wrapped_cauchy<R: Rng + ?Sized>(rho: f64, rng: &mut R) -> f64 {
    let rho = rho.min(0.999_999);
    let u: f64 = rng.gen();
    2.0 * (((1.0 - rho) / (1.0 + rho)) * (PI * (u - 0.5)).tan()).atan()
}
