//! Seeded random number helpers.
//!
//! Every run owns exactly one [`StdRng`]. Work that is fanned out to other
//! threads receives child generators seeded from the owner's stream, so a run
//! is reproducible from its seed regardless of how many workers execute it.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Creates the generator for a run.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Creates a generator from `seed`, or from system entropy when `None`.
pub fn rng_from_option(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => create_rng(seed),
        None => create_rng(rand::random()),
    }
}

/// Returns `0..n` in uniformly random order (Fisher-Yates).
pub fn random_order<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order
}

/// Draws `n` child seeds from `rng`, one per unit of delegated work.
pub fn child_seeds<R: Rng>(n: usize, rng: &mut R) -> Vec<u64> {
    (0..n).map(|_| rng.random::<u64>()).collect()
}
