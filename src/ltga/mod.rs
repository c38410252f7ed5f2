//! Linkage Tree Genetic Algorithm (LTGA).
//!
//! A population-based optimizer for fixed-length binary problems that learns
//! which variables belong together while it searches. Every generation the
//! pairwise mutual information of the population is clustered into a linkage
//! tree, and gene-pool optimal mixing copies whole subtrees of variables
//! between individuals, keeping a change only if fitness does not decrease.
//!
//! Users define their problem by implementing [`FitnessFunction`]; fitness is
//! maximized.
//!
//! # Key Types
//!
//! - [`LtgaConfig`]: Algorithm parameters (population size, termination, strategy)
//! - [`LtgaRunner`]: Runs the algorithm with the configured [`ExecutionStrategy`]
//! - [`SearchDriver`]: Step-by-step state machine of a single run
//! - [`LtgaResult`]: Best solution, evaluations, generations and termination reason
//!
//! # Building Blocks
//!
//! - [`LinkageTreeBuilder`] / [`MiMatrix`] / [`Fos`]: linkage learning
//! - [`OptimalMixer`]: gene-pool optimal mixing, forced improvements, local search
//! - [`EvaluationBudget`]: shared, hard-capped evaluation counter
//! - [`Dispatch`]: sequential or thread-pool execution of per-individual work
//!
//! # References
//!
//! - Thierens (2010), "The Linkage Tree Genetic Algorithm", PPSN XI
//! - Thierens & Bosman (2011), "Optimal mixing evolutionary algorithms", GECCO '11
//! - Bosman & Thierens (2012), "Linkage neighbors, optimal mixing and forced
//!   improvements in genetic algorithms", GECCO '12

mod config;
mod dispatch;
mod evaluation;
mod linkage;
mod mixing;
mod population;
mod runner;
mod strategy;
mod types;

pub use config::LtgaConfig;
#[cfg(feature = "parallel")]
pub use dispatch::PoolDispatch;
pub use dispatch::{Dispatch, SequentialDispatch};
pub use evaluation::{EvaluationBudget, Evaluator};
pub use linkage::{Fos, LinkageTreeBuilder, MiMatrix};
pub use mixing::{hard_local_search, LocalSearch, MixOutcome, MixingOrder, OptimalMixer};
pub use population::{DuplicateRemoval, Population};
pub use runner::{DriverState, LtgaResult, SearchDriver, Termination};
pub use strategy::{DynamicRuns, ExecutionStrategy, IndependentRuns, LtgaRunner};
pub use types::{FitnessFunction, Genotype};
