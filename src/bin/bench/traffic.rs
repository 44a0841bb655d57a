// Poisson Request Generator - seedable, statistically validated
// Produces the path requests a crowd of actors would offer in one tick

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use pathfinding_governor::config::{
    FAR_DIST_SQ, MEDIUM_DIST_SQ, NEAR_DIST_SQ, PRIORITY_CHASE, PRIORITY_COMBAT, PRIORITY_WANDER,
};
use pathfinding_governor::RequestContext;

/// Side of the square map targets are drawn from, in tiles.
const MAP_TILES: f64 = 256.0;

/// Priority and distance shares for one scenario.
#[derive(Debug, Clone, Copy)]
pub struct TrafficMix {
    pub wander: f64,
    pub chase: f64,
    pub combat: f64,
    /// Share of requests targeting beyond the far threshold.
    pub far_share: f64,
    /// Share of non-combat requests whose actor is flagged as in combat.
    pub in_combat_share: f64,
}

impl TrafficMix {
    pub const fn new(wander: f64, chase: f64, combat: f64, far_share: f64) -> Self {
        Self { wander, chase, combat, far_share, in_combat_share: 0.0 }
    }

    /// Cumulative priority distribution, normalized.
    fn priority_cdf(&self) -> [f64; 3] {
        let total = (self.wander + self.chase + self.combat).max(f64::EPSILON);
        let w = self.wander / total;
        let c = self.chase / total;
        [w, w + c, 1.0]
    }
}

impl Default for TrafficMix {
    fn default() -> Self {
        // Idle crowds mostly wander; a few chase, fewer fight.
        Self::new(0.60, 0.30, 0.10, 0.25)
    }
}

pub struct TrafficGenerator {
    rng: ChaCha8Rng,
    mix: TrafficMix,
    pub actors: u32,
    pub request_count: u32,
    pub priority_counts: [u32; 3],
}

impl TrafficGenerator {
    pub fn new(rng: ChaCha8Rng, actors: u32, mix: TrafficMix) -> Self {
        Self {
            rng,
            mix,
            actors: actors.max(1),
            request_count: 0,
            priority_counts: [0; 3],
        }
    }

    /// Generate Poisson-distributed requests for one tick.
    /// `lambda` is the expected number of requests per tick.
    pub fn generate_tick(&mut self, lambda: f64) -> Vec<RequestContext> {
        if lambda <= 0.0 {
            return Vec::new();
        }

        let n = poisson_sample(&mut self.rng, lambda);
        let mut requests = Vec::with_capacity(n as usize);
        let cdf = self.mix.priority_cdf();

        for _ in 0..n {
            let actor = self.rng.gen_range(0..self.actors);
            let class = select_priority(&mut self.rng, &cdf);
            self.priority_counts[class] += 1;
            let priority = match class {
                0 => PRIORITY_WANDER,
                1 => PRIORITY_CHASE,
                _ => PRIORITY_COMBAT,
            };
            let in_combat =
                priority != PRIORITY_COMBAT && self.rng.gen::<f64>() < self.mix.in_combat_share;

            let distance_sq = if self.rng.gen::<f64>() < self.mix.far_share {
                self.rng.gen_range(FAR_DIST_SQ * 1.01..FAR_DIST_SQ * 4.0)
            } else {
                sample_inner_distance(&mut self.rng)
            };

            let x = self.rng.gen_range(0.0..MAP_TILES);
            let y = self.rng.gen_range(0.0..MAP_TILES);

            requests.push(
                RequestContext::new(actor, priority, distance_sq)
                    .with_target(x, y)
                    .in_combat(in_combat),
            );
            self.request_count += 1;
        }

        requests
    }
}

/// Poisson sampling via Knuth algorithm.
/// For λ < 30, uses direct method. For larger λ, uses normal approximation.
fn poisson_sample(rng: &mut ChaCha8Rng, lambda: f64) -> u32 {
    if lambda < 30.0 {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let result = lambda + lambda.sqrt() * z;
        result.round().max(0.0) as u32
    }
}

fn select_priority(rng: &mut ChaCha8Rng, cdf: &[f64; 3]) -> usize {
    let r: f64 = rng.gen();
    cdf.iter().position(|&c| r < c).unwrap_or(2)
}

/// Near, medium and mid-far bands in equal shares.
fn sample_inner_distance(rng: &mut ChaCha8Rng) -> f64 {
    match rng.gen_range(0..3) {
        0 => rng.gen_range(0.0..NEAR_DIST_SQ),
        1 => rng.gen_range(NEAR_DIST_SQ..MEDIUM_DIST_SQ),
        _ => rng.gen_range(MEDIUM_DIST_SQ..=FAR_DIST_SQ),
    }
}
