use kilodm_protocol::{ResourceId, Utility, RESOURCE_COUNT, UTILITY_SCALE};

/// Per-resource exponential moving average of sensed utility.
///
/// The average is kept in floating point so that small smoothing factors
/// keep converging instead of stalling on fixed-point rounding; every read
/// goes through [`Utility`].
#[derive(Debug, Clone)]
pub struct UtilityEstimator {
    alpha: f64,
    estimates: [f64; RESOURCE_COUNT],
    /// Running estimate of the best utility seen swarm-wide (`umax`).
    ceiling: f64,
}

impl UtilityEstimator {
    pub fn new(alpha: f64) -> Self {
        Self { alpha: alpha.clamp(f64::EPSILON, 1.0), estimates: [0.0; RESOURCE_COUNT], ceiling: 1.0 }
    }

    /// Fold a direct sample of `r` into its estimate. Zero means
    /// "no sample" and leaves the estimate untouched.
    pub fn update(&mut self, r: ResourceId, sample: Utility) {
        self.blend(r, sample, self.alpha);
    }

    /// Fold a sample with an explicit smoothing factor (peer reports).
    pub fn blend(&mut self, r: ResourceId, sample: Utility, alpha: f64) {
        if sample.is_zero() {
            return;
        }
        let e = &mut self.estimates[r.index()];
        *e = ema(*e, sample.as_fraction(), alpha);
    }

    /// Current estimate as a fraction in [0, 1].
    pub fn estimate(&self, r: ResourceId) -> f64 {
        self.estimates[r.index()]
    }

    pub fn read(&self, r: ResourceId) -> Utility {
        Utility::from_fraction(self.estimates[r.index()])
    }

    /// All estimates in resource order.
    pub fn snapshot(&self) -> [Utility; RESOURCE_COUNT] {
        let mut out = [Utility::ZERO; RESOURCE_COUNT];
        for r in ResourceId::all() {
            out[r.index()] = self.read(r);
        }
        out
    }

    /// Resource with the highest estimate; the lowest index wins ties.
    pub fn highest(&self) -> (ResourceId, Utility) {
        let mut best = (ResourceId::FIRST, self.read(ResourceId::FIRST));
        for r in ResourceId::all().skip(1) {
            let u = self.read(r);
            if u > best.1 {
                best = (r, u);
            }
        }
        best
    }

    pub fn ceiling(&self) -> Utility {
        Utility::from_fraction(self.ceiling)
    }

    /// Fold a ceiling sample (own best estimate or a peer's report).
    pub fn blend_ceiling(&mut self, sample: Utility, alpha: f64) {
        self.ceiling = ema(self.ceiling, sample.as_fraction(), alpha);
    }

    /// Estimate of `r` stretched from `[umin, ceiling]` onto the full scale.
    pub fn scaled(&self, r: ResourceId, umin: Utility) -> Utility {
        rescale(self.read(r), umin, self.ceiling())
    }

    pub fn reset(&mut self) {
        self.estimates = [0.0; RESOURCE_COUNT];
        self.ceiling = 1.0;
    }
}

fn ema(current: f64, sample: f64, alpha: f64) -> f64 {
    (alpha * sample + (1.0 - alpha) * current).clamp(0.0, 1.0)
}

/// Map `u` linearly from `[umin, umax]` onto `[0, 255]`.
///
/// Below `umin`, or with a degenerate range, the result is zero; above
/// `umax` it saturates.
pub fn rescale(u: Utility, umin: Utility, umax: Utility) -> Utility {
    if u < umin || umin >= umax {
        return Utility::ZERO;
    }
    if u > umax {
        return Utility::MAX;
    }
    let span = f64::from(umax.raw() - umin.raw());
    let value = f64::from(u.raw() - umin.raw()) / span * f64::from(UTILITY_SCALE);
    Utility::from_raw(value.round() as u8)
}
