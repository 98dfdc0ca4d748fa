use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, denominator)` for the sampling rule.
pub trait Sampler: Send + Sync {
    fn draw(&self, denominator: u32) -> u32;
}

/// Draws from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn draw(&self, denominator: u32) -> u32 {
        rand::rng().random_range(0..denominator)
    }
}

/// Reproducible draws from a seeded RNG.
#[derive(Debug)]
pub struct SeededSampler {
    rng: Mutex<StdRng>,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Sampler for SeededSampler {
    fn draw(&self, denominator: u32) -> u32 {
        self.rng.lock().random_range(0..denominator)
    }
}

/// A batched record is kept when `denominator <= 1` or the draw equals exactly 1.
/// The comparison is against 1, not 0.
pub fn accepts(sampler: &dyn Sampler, denominator: u32) -> bool {
    denominator <= 1 || sampler.draw(denominator) == 1
}
