//! Linkage Tree Genetic Algorithm for binary black-box optimization.
//!
//! The LTGA learns which variables depend on each other from the statistics
//! of its own population. Every generation it builds a linkage tree from
//! pairwise mutual information and then improves each individual by gene-pool
//! optimal mixing over the subsets of that tree.
//!
//! - [`ltga`]: the search itself (linkage learning, mixing, the run loop and
//!   execution strategies).
//! - [`problems`]: benchmark fitness functions (OneMax, deceptive traps, NK
//!   landscapes, MaxCut).
//! - [`random`]: seeded RNG helpers.
//!
//! # Example
//!
//! ```
//! use u_ltga::ltga::{LtgaConfig, LtgaRunner, Termination};
//! use u_ltga::problems::OneMax;
//!
//! let problem = OneMax::new(20);
//! let config = LtgaConfig::default()
//!     .with_population_size(30)
//!     .with_seed(7);
//! let result = LtgaRunner::run(&problem, &config).unwrap();
//! assert!(result.best_fitness <= 20.0);
//! assert_ne!(result.termination, Termination::Cancelled);
//! ```

pub mod error;
pub mod ltga;
pub mod problems;
pub mod random;

pub use error::{LtgaError, Result};
