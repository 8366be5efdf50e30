//! Seedable PRNG backing RNGI/RNGF, so test programs are deterministic.

use rand::{Rng, RngCore, SeedableRng};
use rand::rngs::StdRng;

#[derive(Clone)]
pub struct VmRng(StdRng);

impl VmRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn next_i32(&mut self) -> i32 {
        self.0.next_u32() as i32
    }

    /// A float in `[0, 1)`, matching the spec's RNGF contract.
    pub fn next_f32(&mut self) -> f32 {
        self.0.gen_range(0.0..1.0)
    }
}

impl Default for VmRng {
    fn default() -> Self {
        Self::from_seed(0)
    }
}
