//! Toy arena: circular resource areas whose shared population regrows
//! logistically and is consumed by agents working over it.

use std::f64::consts::PI;

use anyhow::{bail, Result};
use kilodm_protocol::{
    types::slices_from_fraction, AgentId, ArenaReading, ArenaState, ResourceId, TurnHint,
    RESOURCE_COUNT,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::swarm::{Body, Point};

/// Placement attempts per area before giving up.
const MAX_PLACEMENT_TRIES: usize = 10_000;

/// Populations never drop below this, so a depleted resource can regrow.
const MIN_POPULATION: f64 = 1e-3;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaParams {
    /// Arena radius; all distances share this unit.
    pub radius:             f64,
    pub area_radius:        f64,
    pub areas_per_resource: usize,
    /// Starting population of each resource, in [0, 1].
    pub initial_population: [f64; RESOURCE_COUNT],
    /// Logistic growth rate per tick.
    pub eta:                [f64; RESOURCE_COUNT],
    /// Population consumed per working agent per tick.
    pub exploitation:       f64,
    /// Agents beyond this fraction of the radius get a turn hint.
    pub border_fraction:    f64,
}

impl Default for ArenaParams {
    fn default() -> Self {
        Self {
            radius:             1.0,
            area_radius:        0.1,
            areas_per_resource: 3,
            initial_population: [0.9, 0.6, 0.3],
            eta:                [0.005; RESOURCE_COUNT],
            exploitation:       0.000_2,
            border_fraction:    0.9,
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Area {
    pub resource: ResourceId,
    pub centre:   Point,
    pub radius:   f64,
}

impl Area {
    pub fn contains(&self, p: Point) -> bool {
        self.centre.distance(p) < self.radius
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    params:      ArenaParams,
    areas:       Vec<Area>,
    populations: [f64; RESOURCE_COUNT],
}

impl Arena {
    /// Scatter non-overlapping areas for every resource.
    pub fn generate<R: Rng>(params: &ArenaParams, rng: &mut R) -> Result<Self> {
        let mut areas: Vec<Area> = Vec::new();
        let reach = params.radius - params.area_radius;
        if reach <= 0.0 {
            bail!("area radius {} does not fit in arena radius {}", params.area_radius, params.radius);
        }

        for resource in ResourceId::all() {
            for _ in 0..params.areas_per_resource {
                let placed = (0..MAX_PLACEMENT_TRIES).find_map(|_| {
                    let angle = rng.gen_range(0.0..2.0 * PI);
                    let dist = reach * rng.gen::<f64>().sqrt();
                    let centre = Point::new(dist * angle.cos(), dist * angle.sin());
                    let clear = areas
                        .iter()
                        .all(|a| a.centre.distance(centre) >= params.area_radius * 2.2);
                    clear.then_some(centre)
                });
                match placed {
                    Some(centre) => areas.push(Area { resource, centre, radius: params.area_radius }),
                    None => bail!("no free spot for another area of {resource} after {MAX_PLACEMENT_TRIES} tries"),
                }
            }
        }

        let mut populations = [0.0; RESOURCE_COUNT];
        for (p, init) in populations.iter_mut().zip(params.initial_population) {
            *p = init.clamp(MIN_POPULATION, 1.0);
        }
        Ok(Self { params: params.clone(), areas, populations })
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn populations(&self) -> [f64; RESOURCE_COUNT] {
        self.populations
    }

    /// The first area (in resource order) under `p`.
    pub fn locate(&self, p: Point) -> ArenaState {
        self.areas
            .iter()
            .find(|a| a.contains(p))
            .map_or(ArenaState::Outside, |a| ArenaState::Over(a.resource))
    }

    /// The reading the arena sends to `agent`: the population of the
    /// resource it stands on, plus a turn hint near the border.
    pub fn reading(&self, agent: AgentId, body: &Body) -> ArenaReading {
        let arena = self.locate(body.position);
        let mut utility = [0u8; RESOURCE_COUNT];
        if let Some(r) = arena.resource() {
            utility[r.index()] = slices_from_fraction(self.populations[r.index()]);
        }
        ArenaReading { agent, arena, utility, turn: self.turn_hint(body) }
    }

    fn turn_hint(&self, body: &Body) -> TurnHint {
        let p = body.position;
        if p.norm() <= self.params.border_fraction * self.params.radius {
            return TurnHint::NONE;
        }
        let towards_centre = (-p.y).atan2(-p.x);
        TurnHint::from_radians(wrap_angle(towards_centre - body.heading))
    }

    /// Apply one tick of exploitation followed by logistic regrowth.
    pub fn step(&mut self, working: [usize; RESOURCE_COUNT]) {
        for (i, p) in self.populations.iter_mut().enumerate() {
            let consumed = self.params.exploitation * working[i] as f64;
            let mut next = (*p - consumed).max(MIN_POPULATION);
            next += next * self.params.eta[i] * (1.0 - next);
            *p = next.clamp(MIN_POPULATION, 1.0);
        }
    }
}

/// Wrap an angle onto (-π, π].
pub fn wrap_angle(a: f64) -> f64 {
    let mut a = a % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn arena() -> Arena {
        Arena::generate(&ArenaParams::default(), &mut StdRng::seed_from_u64(1)).unwrap()
    }

    #[test]
    fn areas_do_not_overlap() {
        let a = arena();
        assert_eq!(a.areas().len(), 9);
        for (i, x) in a.areas().iter().enumerate() {
            assert!(x.centre.norm() + x.radius <= 1.0 + 1e-9);
            for y in &a.areas()[i + 1..] {
                assert!(x.centre.distance(y.centre) >= 0.22 - 1e-9);
            }
        }
    }

    #[test]
    fn impossible_layout_fails() {
        let params = ArenaParams { area_radius: 0.4, areas_per_resource: 5, ..Default::default() };
        assert!(Arena::generate(&params, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn reading_over_area_reports_population() {
        let a = arena();
        let area = a.areas().iter().find(|x| x.resource.index() == 1).unwrap().clone();
        let body = Body { position: area.centre, heading: 0.0 };
        let reading = a.reading(AgentId::new(4).unwrap(), &body);
        assert_eq!(reading.arena, ArenaState::Over(area.resource));
        assert_eq!(reading.utility, [0, slices_from_fraction(0.6), 0]);
    }

    #[test]
    fn border_agent_hinted_toward_centre() {
        let a = arena();
        // On the +x border heading outward: centre is directly behind.
        let body = Body { position: Point::new(0.95, 0.0), heading: 0.0 };
        assert_eq!(a.reading(AgentId::new(0).unwrap(), &body).turn.steps(), TurnHint::MAX);
        // Heading north: centre lies to the left.
        let body = Body { position: Point::new(0.95, 0.0), heading: PI / 2.0 };
        assert_eq!(a.reading(AgentId::new(0).unwrap(), &body).turn.steps(), 2);
        let inner = Body { position: Point::new(0.5, 0.0), heading: 0.0 };
        assert!(a.reading(AgentId::new(0).unwrap(), &inner).turn.is_none());
    }

    #[test]
    fn exploitation_and_regrowth() {
        let mut a = arena();
        let before = a.populations();
        a.step([0, 0, 0]);
        let grown = a.populations();
        assert!(grown.iter().zip(before).all(|(g, b)| *g >= b));

        for _ in 0..1_000 {
            a.step([20, 0, 0]);
        }
        assert!(a.populations()[0] < before[0]);
        assert!(a.populations()[1] > before[1]);
        assert!(a.populations().iter().all(|p| (MIN_POPULATION..=1.0).contains(p)));
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-9);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-9);
        assert_eq!(wrap_angle(0.5), 0.5);
    }
}
