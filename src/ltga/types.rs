//! Core types: the binary [`Genotype`] and the [`FitnessFunction`] boundary.

use crate::error::Result;
use rand::Rng;
use std::hash::{Hash, Hasher};

/// Defines the problem being optimized.
///
/// This is the only trait a user must implement. Fitness is **maximized**:
/// a larger value is better.
///
/// # Contract
///
/// `evaluate` must be deterministic for a fixed genotype and free of side
/// effects visible to the optimizer. It is called concurrently from worker
/// threads by the parallel strategies, hence `Send + Sync`.
///
/// # Examples
///
/// ```
/// use u_ltga::ltga::FitnessFunction;
///
/// struct LeadingOnes(usize);
///
/// impl FitnessFunction for LeadingOnes {
///     fn problem_length(&self) -> usize {
///         self.0
///     }
///
///     fn evaluate(&self, genes: &[bool]) -> u_ltga::Result<f64> {
///         Ok(genes.iter().take_while(|&&b| b).count() as f64)
///     }
///
///     fn optimum_known(&self) -> Option<f64> {
///         Some(self.0 as f64)
///     }
/// }
/// ```
pub trait FitnessFunction: Send + Sync {
    /// Number of binary variables `L`.
    fn problem_length(&self) -> usize;

    /// Computes the fitness of `genes` (length [`problem_length`](Self::problem_length)).
    ///
    /// An `Err` is fatal: the run aborts and the error is returned to the caller.
    fn evaluate(&self, genes: &[bool]) -> Result<f64>;

    /// The optimal fitness, when the problem knows it.
    fn optimum_known(&self) -> Option<f64> {
        None
    }
}

impl<T: FitnessFunction + ?Sized> FitnessFunction for &T {
    fn problem_length(&self) -> usize {
        (**self).problem_length()
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        (**self).evaluate(genes)
    }

    fn optimum_known(&self) -> Option<f64> {
        (**self).optimum_known()
    }
}

impl<T: FitnessFunction + ?Sized> FitnessFunction for Box<T> {
    fn problem_length(&self) -> usize {
        (**self).problem_length()
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        (**self).evaluate(genes)
    }

    fn optimum_known(&self) -> Option<f64> {
        (**self).optimum_known()
    }
}

/// A fixed-length binary solution with its cached fitness.
///
/// Equality and hashing consider the bits only.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Genotype {
    genes: Vec<bool>,
    fitness: f64,
    evaluations: u32,
}

impl Genotype {
    /// Creates an unevaluated genotype.
    pub fn new(genes: Vec<bool>) -> Self {
        Self {
            genes,
            fitness: f64::NEG_INFINITY,
            evaluations: 0,
        }
    }

    /// Creates an unevaluated genotype of `length` uniformly random bits.
    pub fn random<R: Rng>(length: usize, rng: &mut R) -> Self {
        Self::new((0..length).map(|_| rng.random_bool(0.5)).collect())
    }

    /// Creates an already evaluated genotype.
    pub fn with_fitness(genes: Vec<bool>, fitness: f64) -> Self {
        Self {
            genes,
            fitness,
            evaluations: 1,
        }
    }

    pub fn genes(&self) -> &[bool] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Cached fitness; `f64::NEG_INFINITY` until first evaluated.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluations > 0
    }

    /// Number of fitness computations spent on this genotype, including
    /// trial variants that were evaluated and then rejected.
    pub fn evaluations(&self) -> u32 {
        self.evaluations
    }

    /// Stores a freshly computed fitness.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
        self.evaluations += 1;
    }

    /// Counts an evaluation of a rejected variant; fitness is unchanged.
    pub(crate) fn record_rejected_evaluation(&mut self) {
        self.evaluations += 1;
    }

    /// Number of 1-bits.
    pub fn count_ones(&self) -> usize {
        self.genes.iter().filter(|&&b| b).count()
    }

    /// Copies `donor`'s bits at `positions` into `self`.
    ///
    /// Returns `true` if at least one bit changed. Fitness is left as is.
    pub fn copy_positions_from(&mut self, donor: &[bool], positions: &[usize]) -> bool {
        let mut changed = false;
        for &p in positions {
            if self.genes[p] != donor[p] {
                self.genes[p] = donor[p];
                changed = true;
            }
        }
        changed
    }

    /// Replaces bits and fitness with `other`'s, keeping this genotype's
    /// evaluation count.
    pub(crate) fn assign_from(&mut self, other: &Genotype) {
        self.genes.clone_from(&other.genes);
        self.fitness = other.fitness;
    }

    pub(crate) fn flip(&mut self, position: usize) {
        self.genes[position] = !self.genes[position];
    }

    /// Bits as a `0`/`1` string.
    pub fn to_bit_string(&self) -> String {
        self.genes.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }
}

impl PartialEq for Genotype {
    fn eq(&self, other: &Self) -> bool {
        self.genes == other.genes
    }
}

impl Eq for Genotype {}

impl Hash for Genotype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genes.hash(state);
    }
}
