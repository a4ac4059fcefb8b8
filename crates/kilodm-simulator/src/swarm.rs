//! Bodies in the plane and the broadcast medium between them.

use kilodm_agent::Motion;
use kilodm_protocol::Frame;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arena::wrap_angle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Position and heading (radians, counter-clockwise from +x).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Point,
    pub heading:  f64,
}

impl Body {
    /// Uniformly inside a disk of `radius`, random heading.
    pub fn random<R: Rng>(radius: f64, rng: &mut R) -> Self {
        let angle = rng.gen_range(0.0..2.0 * std::f64::consts::PI);
        let dist = radius * rng.gen::<f64>().sqrt();
        Self {
            position: Point::new(dist * angle.cos(), dist * angle.sin()),
            heading:  rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI),
        }
    }

    /// Execute one tick of `motion`, staying inside the arena disk.
    pub fn apply(&mut self, motion: Motion, speed: f64, omega: f64, arena_radius: f64) {
        match motion {
            Motion::Forward => {
                self.position.x += speed * self.heading.cos();
                self.position.y += speed * self.heading.sin();
                let r = self.position.norm();
                if r > arena_radius {
                    let k = arena_radius / r;
                    self.position = Point::new(self.position.x * k, self.position.y * k);
                }
            }
            Motion::TurnLeft => self.heading = wrap_angle(self.heading + omega),
            Motion::TurnRight => self.heading = wrap_angle(self.heading - omega),
            Motion::Stop => {}
        }
    }
}

// ============================================================================
// Medium
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediumParams {
    /// Maximum distance a frame carries.
    pub comm_radius: f64,
    /// Probability a frame is lost for one receiver.
    pub loss:        f64,
    /// Probability a delivered frame has one bit flipped.
    pub bit_error:   f64,
}

impl Default for MediumParams {
    fn default() -> Self {
        Self { comm_radius: 0.1, loss: 0.1, bit_error: 0.01 }
    }
}

/// What happens to one frame on its way to one receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    OutOfRange,
    Lost,
    Delivered(Frame),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediumStats {
    pub broadcasts: u64,
    pub delivered:  u64,
    pub lost:       u64,
    pub corrupted:  u64,
}

#[derive(Debug, Clone)]
pub struct Medium {
    params: MediumParams,
    stats:  MediumStats,
}

impl Medium {
    pub fn new(params: MediumParams) -> Self {
        Self { params, stats: MediumStats::default() }
    }

    pub fn stats(&self) -> MediumStats {
        self.stats
    }

    pub fn broadcast(&mut self) {
        self.stats.broadcasts += 1;
    }

    /// Carry `frame` from `from` to `to`, possibly dropping or corrupting it.
    pub fn carry<R: Rng>(&mut self, frame: &Frame, from: Point, to: Point, rng: &mut R) -> Delivery {
        if from.distance(to) > self.params.comm_radius {
            return Delivery::OutOfRange;
        }
        if rng.gen_bool(self.params.loss.clamp(0.0, 1.0)) {
            self.stats.lost += 1;
            return Delivery::Lost;
        }
        let mut copy = *frame;
        if rng.gen_bool(self.params.bit_error.clamp(0.0, 1.0)) {
            let bit = rng.gen_range(0..copy.len() * 8);
            copy[bit / 8] ^= 1 << (bit % 8);
            self.stats.corrupted += 1;
        }
        self.stats.delivered += 1;
        Delivery::Delivered(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::f64::consts::PI;

    #[test]
    fn forward_moves_along_heading_and_stays_inside() {
        let mut b = Body { position: Point::new(0.0, 0.0), heading: PI / 2.0 };
        b.apply(Motion::Forward, 0.1, 0.0, 1.0);
        assert!((b.position.y - 0.1).abs() < 1e-12);
        for _ in 0..50 {
            b.apply(Motion::Forward, 0.1, 0.0, 1.0);
        }
        assert!(b.position.norm() <= 1.0 + 1e-12);
    }

    #[test]
    fn turns_wrap_heading() {
        let mut b = Body { position: Point::default(), heading: PI - 0.05 };
        b.apply(Motion::TurnLeft, 0.0, 0.1, 1.0);
        assert!(b.heading < 0.0);
        b.apply(Motion::TurnRight, 0.0, 0.1, 1.0);
        assert!((b.heading - (PI - 0.05)).abs() < 1e-9);
        let before = b;
        b.apply(Motion::Stop, 1.0, 1.0, 1.0);
        assert_eq!(b, before);
    }

    #[test]
    fn medium_respects_range_and_loss() {
        let mut rng = StdRng::seed_from_u64(2);
        let frame = [7u8; 12];
        let mut perfect = Medium::new(MediumParams { comm_radius: 0.1, loss: 0.0, bit_error: 0.0 });
        assert_eq!(
            perfect.carry(&frame, Point::new(0.0, 0.0), Point::new(0.2, 0.0), &mut rng),
            Delivery::OutOfRange
        );
        assert_eq!(
            perfect.carry(&frame, Point::new(0.0, 0.0), Point::new(0.05, 0.0), &mut rng),
            Delivery::Delivered(frame)
        );

        let mut deaf = Medium::new(MediumParams { comm_radius: 0.1, loss: 1.0, bit_error: 0.0 });
        assert_eq!(deaf.carry(&frame, Point::default(), Point::default(), &mut rng), Delivery::Lost);
        assert_eq!(deaf.stats().lost, 1);
    }

    #[test]
    fn bit_error_flips_exactly_one_bit() {
        let mut rng = StdRng::seed_from_u64(3);
        let frame = [0u8; 12];
        let mut noisy = Medium::new(MediumParams { comm_radius: 1.0, loss: 0.0, bit_error: 1.0 });
        match noisy.carry(&frame, Point::default(), Point::default(), &mut rng) {
            Delivery::Delivered(copy) => {
                assert_eq!(copy.iter().map(|b| b.count_ones()).sum::<u32>(), 1);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
        assert_eq!(noisy.stats().corrupted, 1);
    }
}
