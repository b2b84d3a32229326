//! The generator backing `Xop::Random` (`[?]`), grounded in the teacher's
//! own `rand`/`rand_chacha` stack (e.g. `modules/statistics.rs`'s
//! `StdRng::from_entropy()`): a `ChaCha8Rng` seeded from OS entropy, rather
//! than a hand-rolled stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct ScriptRng {
    inner: ChaCha8Rng,
}

impl ScriptRng {
    pub fn new() -> Self {
        Self { inner: ChaCha8Rng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { inner: ChaCha8Rng::seed_from_u64(seed) }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.gen()
    }

    /// A non-negative index in `[0, len)`; callers are responsible for
    /// ensuring `len > 0`.
    pub fn index(&mut self, len: usize) -> usize {
        self.inner.gen_range(0..len)
    }
}

impl Default for ScriptRng {
    fn default() -> Self {
        Self::new()
    }
}
