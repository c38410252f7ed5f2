//! LTGA configuration.
//!
//! [`LtgaConfig`] holds every parameter that controls a run: population size,
//! termination criteria, execution strategy and the optional mixing variants.

use super::linkage::Fos;
use super::mixing::MixingOrder;
use super::strategy::ExecutionStrategy;
use crate::error::{LtgaError, Result};

/// Configuration for the Linkage Tree Genetic Algorithm.
///
/// # Defaults
///
/// ```
/// use u_ltga::ltga::LtgaConfig;
///
/// let config = LtgaConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert!(config.max_evaluations.is_none());
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_ltga::ltga::{ExecutionStrategy, LtgaConfig};
///
/// let config = LtgaConfig::default()
///     .with_population_size(200)
///     .with_max_evaluations(100_000)
///     .with_value_to_reach(50.0)
///     .with_strategy(ExecutionStrategy::PerfectParallel)
///     .with_threads(8)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LtgaConfig {
    /// Number of individuals `N`. Fixed for the lifetime of a run.
    pub population_size: usize,

    /// Maximum number of fitness evaluations, including initialization.
    ///
    /// `None` disables the budget.
    pub max_evaluations: Option<u64>,

    /// Target fitness that stops the run once met.
    ///
    /// `None` disables value-to-reach termination.
    pub value_to_reach: Option<f64>,

    /// Epsilon for "reached" comparisons: fitness `f` reaches target `v`
    /// iff `f + fitness_tolerance >= v`.
    pub fitness_tolerance: f64,

    /// The population is converged once the variance of its fitness values
    /// is at or below this value.
    pub fitness_variance_tolerance: f64,

    /// Generations without a strict improvement of the best fitness that are
    /// tolerated. The run converges once the stretch exceeds this value.
    ///
    /// Set to 0 to disable.
    pub max_no_improvement_stretch: usize,

    /// Optional cap on the number of generations.
    pub max_generations: Option<usize>,

    /// Optional wall-clock limit in milliseconds, checked at each
    /// generation boundary.
    pub time_limit_ms: Option<u64>,

    /// How generations are executed.
    pub strategy: ExecutionStrategy,

    /// Worker threads for the parallel strategies.
    pub threads: usize,

    /// Number of independent runs for
    /// [`ExecutionStrategy::EmbarrassinglyParallel`]. `None` uses `threads`.
    pub independent_runs: Option<usize>,

    /// Random seed for reproducibility. `None` draws one from system entropy.
    pub seed: Option<u64>,

    /// Replace bit-identical individuals with fresh random ones before
    /// every generation.
    pub remove_duplicates: bool,

    /// Order in which each individual walks the FOS during mixing.
    pub mixing_order: MixingOrder,

    /// Pull stagnating individuals towards the best-so-far solution after
    /// mixing.
    pub forced_improvement: bool,

    /// Apply a bit-flip local search to initial and mixed individuals.
    /// Singleton subsets are dropped from the FOS when enabled.
    pub local_search: bool,

    /// Linkage model used for every generation instead of a tree learned
    /// from the population.
    pub fixed_fos: Option<Fos>,
}

impl Default for LtgaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_evaluations: None,
            value_to_reach: None,
            fitness_tolerance: 1e-6,
            fitness_variance_tolerance: 1e-6,
            max_no_improvement_stretch: 50,
            max_generations: None,
            time_limit_ms: None,
            strategy: ExecutionStrategy::Sequential,
            threads: 4,
            independent_runs: None,
            seed: None,
            remove_duplicates: false,
            mixing_order: MixingOrder::Tree,
            forced_improvement: false,
            local_search: false,
            fixed_fos: None,
        }
    }
}

impl LtgaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the evaluation budget.
    pub fn with_max_evaluations(mut self, n: u64) -> Self {
        self.max_evaluations = Some(n);
        self
    }

    /// Enables value-to-reach termination with the given target.
    pub fn with_value_to_reach(mut self, value: f64) -> Self {
        self.value_to_reach = Some(value);
        self
    }

    /// Sets the epsilon used when comparing fitness against the target.
    pub fn with_fitness_tolerance(mut self, tolerance: f64) -> Self {
        self.fitness_tolerance = tolerance;
        self
    }

    /// Sets the fitness-variance convergence threshold.
    pub fn with_fitness_variance_tolerance(mut self, tolerance: f64) -> Self {
        self.fitness_variance_tolerance = tolerance;
        self
    }

    /// Sets the maximum no-improvement stretch (0 to disable).
    pub fn with_max_no_improvement_stretch(mut self, n: usize) -> Self {
        self.max_no_improvement_stretch = n;
        self
    }

    /// Sets the maximum number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = Some(n);
        self
    }

    /// Sets the wall-clock time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Sets the execution strategy.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the number of independent runs for the embarrassingly parallel
    /// strategy.
    pub fn with_independent_runs(mut self, runs: usize) -> Self {
        self.independent_runs = Some(runs);
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables or disables the duplicate-removal pass.
    pub fn with_remove_duplicates(mut self, enabled: bool) -> Self {
        self.remove_duplicates = enabled;
        self
    }

    /// Sets the FOS traversal order used during mixing.
    pub fn with_mixing_order(mut self, order: MixingOrder) -> Self {
        self.mixing_order = order;
        self
    }

    /// Enables or disables forced improvements.
    pub fn with_forced_improvement(mut self, enabled: bool) -> Self {
        self.forced_improvement = enabled;
        self
    }

    /// Enables or disables local search.
    pub fn with_local_search(mut self, enabled: bool) -> Self {
        self.local_search = enabled;
        self
    }

    /// Mixes over `fos` every generation; no linkage is learned.
    pub fn with_fixed_fos(mut self, fos: Fos) -> Self {
        self.fixed_fos = Some(fos);
        self
    }

    /// Number of runs launched by the embarrassingly parallel strategy.
    pub fn effective_runs(&self) -> usize {
        self.independent_runs.unwrap_or(self.threads)
    }

    /// Preset mirroring the classic benchmark setup: unlimited budget,
    /// stop on the known optimum, no stagnation cut-off.
    ///
    /// - Population: as given, Forced improvement: on
    pub fn benchmark(population_size: usize, optimum: f64) -> Self {
        Self {
            population_size,
            value_to_reach: Some(optimum),
            max_no_improvement_stretch: 0,
            forced_improvement: true,
            mixing_order: MixingOrder::Random,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// The problem length is checked separately, against the fitness
    /// function, when a driver is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(LtgaError::config("population_size", "must be at least 1"));
        }
        if let Some(max) = self.max_evaluations {
            if max < self.population_size as u64 {
                return Err(LtgaError::config(
                    "max_evaluations",
                    format!(
                        "({max}) must cover the initial population ({})",
                        self.population_size
                    ),
                ));
            }
        }
        if let Some(v) = self.value_to_reach {
            if !v.is_finite() {
                return Err(LtgaError::config("value_to_reach", "must be finite"));
            }
        }
        if !(self.fitness_tolerance.is_finite() && self.fitness_tolerance >= 0.0) {
            return Err(LtgaError::config(
                "fitness_tolerance",
                "must be finite and non-negative",
            ));
        }
        if !(self.fitness_variance_tolerance.is_finite() && self.fitness_variance_tolerance >= 0.0)
        {
            return Err(LtgaError::config(
                "fitness_variance_tolerance",
                "must be finite and non-negative",
            ));
        }
        if self.max_generations == Some(0) {
            return Err(LtgaError::config("max_generations", "must be positive or None"));
        }
        if self.time_limit_ms == Some(0) {
            return Err(LtgaError::config("time_limit_ms", "must be positive or None"));
        }
        if self.strategy != ExecutionStrategy::Sequential && self.threads == 0 {
            return Err(LtgaError::config("threads", "must be at least 1"));
        }
        if self.strategy == ExecutionStrategy::EmbarrassinglyParallel && self.effective_runs() == 0
        {
            return Err(LtgaError::config("independent_runs", "must be at least 1"));
        }
        Ok(())
    }

    /// Validates the configuration against a problem of `length` variables.
    pub fn validate_for_length(&self, length: usize) -> Result<()> {
        self.validate()?;
        if length == 0 {
            return Err(LtgaError::config("problem_length", "must be at least 1"));
        }
        if self.remove_duplicates && length < 64 && (self.population_size as u64) > (1u64 << length)
        {
            return Err(LtgaError::config(
                "population_size",
                format!(
                    "({}) exceeds the {} distinct genotypes of length {length}; duplicates cannot be removed",
                    self.population_size,
                    1u64 << length
                ),
            ));
        }
        if let Some(fos) = &self.fixed_fos {
            if fos.problem_length() != length {
                return Err(LtgaError::config(
                    "fixed_fos",
                    format!(
                        "covers {} variables but the problem has {length}",
                        fos.problem_length()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LtgaConfig::default();
        assert_eq!(config.population_size, 100);
        assert!(config.max_evaluations.is_none());
        assert!(config.value_to_reach.is_none());
        assert!((config.fitness_variance_tolerance - 1e-6).abs() < 1e-15);
        assert_eq!(config.max_no_improvement_stretch, 50);
        assert_eq!(config.strategy, ExecutionStrategy::Sequential);
        assert_eq!(config.mixing_order, MixingOrder::Tree);
        assert!(!config.remove_duplicates);
        assert!(!config.forced_improvement);
        assert!(!config.local_search);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = LtgaConfig::default()
            .with_population_size(64)
            .with_max_evaluations(5000)
            .with_value_to_reach(10.0)
            .with_fitness_tolerance(0.5)
            .with_max_no_improvement_stretch(7)
            .with_strategy(ExecutionStrategy::EmbarrassinglyParallel)
            .with_threads(3)
            .with_independent_runs(5)
            .with_remove_duplicates(true)
            .with_forced_improvement(true)
            .with_seed(9);

        assert_eq!(config.population_size, 64);
        assert_eq!(config.max_evaluations, Some(5000));
        assert_eq!(config.value_to_reach, Some(10.0));
        assert!((config.fitness_tolerance - 0.5).abs() < 1e-15);
        assert_eq!(config.max_no_improvement_stretch, 7);
        assert_eq!(config.threads, 3);
        assert_eq!(config.effective_runs(), 5);
        assert!(config.remove_duplicates);
        assert!(config.forced_improvement);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_validate_ok() {
        assert!(LtgaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_population() {
        let err = LtgaConfig::default()
            .with_population_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            LtgaError::Configuration {
                param: "population_size",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_budget_below_population() {
        let config = LtgaConfig::default()
            .with_population_size(50)
            .with_max_evaluations(49);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_threads_parallel() {
        let config = LtgaConfig::default()
            .with_strategy(ExecutionStrategy::PerfectParallel)
            .with_threads(0);
        assert!(config.validate().is_err());
        // Thread count is irrelevant for the sequential strategy.
        assert!(LtgaConfig::default().with_threads(0).validate().is_ok());
    }

    #[test]
    fn test_validate_negative_tolerance() {
        let config = LtgaConfig::default().with_fitness_tolerance(-1.0);
        assert!(config.validate().is_err());
        let config = LtgaConfig::default().with_fitness_variance_tolerance(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_limits() {
        assert!(LtgaConfig::default().with_time_limit_ms(0).validate().is_err());
        assert!(LtgaConfig::default().with_max_generations(0).validate().is_err());
    }

    #[test]
    fn test_validate_for_length() {
        let config = LtgaConfig::default().with_population_size(10);
        assert!(config.validate_for_length(0).is_err());
        assert!(config.validate_for_length(1).is_ok());

        let dedup = config.clone().with_remove_duplicates(true);
        assert!(dedup.validate_for_length(3).is_err());
        assert!(dedup.validate_for_length(4).is_ok());
    }

    #[test]
    fn test_fixed_fos_must_match_length() {
        let config = LtgaConfig::default().with_fixed_fos(Fos::univariate(6));
        assert!(config.validate_for_length(6).is_ok());
        let err = config.validate_for_length(8).unwrap_err();
        assert!(matches!(
            err,
            LtgaError::Configuration {
                param: "fixed_fos",
                ..
            }
        ));
    }

    #[test]
    fn test_benchmark_preset() {
        let config = LtgaConfig::benchmark(40, 25.0);
        assert_eq!(config.population_size, 40);
        assert_eq!(config.value_to_reach, Some(25.0));
        assert_eq!(config.max_no_improvement_stretch, 0);
        assert!(config.forced_improvement);
        assert!(config.validate().is_ok());
    }
}
