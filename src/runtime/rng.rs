use rand::{rngs::StdRng, RngExt, SeedableRng};

/// Seeded PRNG behind every roll of the dice and every stochastic AI choice.
///
/// The seed is stored in the room's durable state, which is what makes a
/// game replayable from its event log and an AI decision reproducible for a
/// given (context, profile, seed) triple.
#[derive(Debug)]
pub struct SeededRng {
    rng: StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One die: uniform in 1..=6.
    pub fn roll_die(&mut self) -> u8 {
        self.rng.random_range(1..=6)
    }

    /// Uniform integer in `[0, bound)`.
    pub fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        self.rng.random_range(0..bound)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// True with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p.clamp(0.0, 1.0)
    }

    /// Uniformly pick one element.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.below(items.len()))
    }
}
