//! Execution strategies.
//!
//! All strategies run the same [`SearchDriver`]; they differ only in how its
//! per-generation work is dispatched and in how many drivers are launched.
//! [`LtgaRunner::run_dynamic`] additionally restarts sequential drivers with
//! a doubled population until a global budget or time limit is spent.

use super::config::LtgaConfig;
use super::dispatch::{Dispatch, SequentialDispatch};
use super::runner::{LtgaResult, SearchDriver, Termination};
use super::types::FitnessFunction;
use crate::error::{LtgaError, Result};
use crate::random::{child_seeds, rng_from_option};
use rand::Rng;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Concurrency discipline of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionStrategy {
    /// One driver on the calling thread.
    #[default]
    Sequential,
    /// One driver whose individuals are mixed concurrently on `threads`
    /// workers, with a barrier at every generation boundary.
    PerfectParallel,
    /// Independent sequential drivers with distinct seeds; the best run is
    /// reported.
    EmbarrassinglyParallel,
}

/// Outcome of an embarrassingly parallel execution.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndependentRuns {
    /// Every run's result, in run order.
    pub runs: Vec<LtgaResult>,
    /// Index of the selected run in `runs`.
    pub best_run: usize,
    /// Seed each run was started with.
    pub seeds: Vec<u64>,
}

impl IndependentRuns {
    /// The selected run.
    pub fn best(&self) -> &LtgaResult {
        &self.runs[self.best_run]
    }

    pub fn into_best(mut self) -> LtgaResult {
        self.runs.swap_remove(self.best_run)
    }

    /// Evaluations summed over all runs.
    pub fn total_evaluations(&self) -> u64 {
        self.runs.iter().map(|r| r.evaluations).sum()
    }

    /// Generations summed over all runs.
    pub fn total_generations(&self) -> usize {
        self.runs.iter().map(|r| r.generations).sum()
    }
}

/// Outcome of a population-doubling execution.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicRuns {
    /// Best over all restarts. Evaluations and generations are summed, and
    /// the history is the running best across restarts.
    pub result: LtgaResult,
    /// Every restart's own result, in order.
    pub restarts: Vec<LtgaResult>,
    /// Population size of each restart.
    pub population_sizes: Vec<usize>,
}

/// Runs the LTGA with the strategy chosen in [`LtgaConfig::strategy`].
///
/// # Usage
///
/// ```
/// use u_ltga::ltga::{LtgaConfig, LtgaRunner};
/// use u_ltga::problems::OneMax;
///
/// let config = LtgaConfig::default()
///     .with_population_size(20)
///     .with_value_to_reach(16.0)
///     .with_seed(42);
/// let result = LtgaRunner::run(&OneMax::new(16), &config).unwrap();
/// assert!(result.best_fitness <= 16.0);
/// ```
pub struct LtgaRunner;

impl LtgaRunner {
    /// Runs to termination.
    ///
    /// For [`ExecutionStrategy::EmbarrassinglyParallel`] the selected run's
    /// result is returned; use [`run_independent`](Self::run_independent) to
    /// see every run.
    ///
    /// # Errors
    /// Configuration errors, thread-pool failures and fitness-function
    /// failures.
    pub fn run<F: FitnessFunction + ?Sized>(
        function: &F,
        config: &LtgaConfig,
    ) -> Result<LtgaResult> {
        Self::run_with_cancel(function, config, None)
    }

    /// Runs with an optional cancellation token.
    ///
    /// If `cancel` is `Some` and the flag is set to `true`, every driver stops
    /// at its next generation barrier and reports its best so far.
    pub fn run_with_cancel<F: FitnessFunction + ?Sized>(
        function: &F,
        config: &LtgaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<LtgaResult> {
        config.validate()?;
        match config.strategy {
            ExecutionStrategy::Sequential => {
                run_driver(SearchDriver::new(function, config, SequentialDispatch)?, cancel)
            }
            ExecutionStrategy::PerfectParallel => run_perfect_parallel(function, config, cancel),
            ExecutionStrategy::EmbarrassinglyParallel => {
                Ok(Self::run_independent(function, config, cancel)?.into_best())
            }
        }
    }

    /// Launches [`LtgaConfig::effective_runs`] independent sequential runs.
    ///
    /// Run seeds are drawn from `config.seed`, so the whole batch is
    /// reproducible. The best run has the highest fitness; ties go to fewer
    /// evaluations, then to the lower run index.
    pub fn run_independent<F: FitnessFunction + ?Sized>(
        function: &F,
        config: &LtgaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<IndependentRuns> {
        config.validate()?;
        let runs = config.effective_runs();
        let mut master = rng_from_option(config.seed);
        let seeds = child_seeds(runs, &mut master);

        let single = |index: usize| -> Result<LtgaResult> {
            let run_config = config
                .clone()
                .with_strategy(ExecutionStrategy::Sequential)
                .with_seed(seeds[index]);
            let driver = SearchDriver::new(function, &run_config, SequentialDispatch)?;
            run_driver(driver, cancel.clone()).inspect_err(|e| {
                log::warn!("independent run {index} failed: {e}");
            })
        };

        let results = execute_runs(runs, config.threads, single)?;
        let best_run = select_best(&results);
        log::info!(
            "{} independent runs finished; selected run {} with fitness {}",
            runs,
            best_run,
            results[best_run].best_fitness
        );
        Ok(IndependentRuns {
            runs: results,
            best_run,
            seeds,
        })
    }

    /// Restarts sequential runs, doubling the population each time, until
    /// the value to reach is met or the budget or time limit is spent.
    ///
    /// `config.population_size` is the first restart's size. Every restart
    /// gets the budget and time the earlier ones left over, and a fresh seed
    /// drawn from `config.seed`. Restarts end by the usual criteria, so
    /// `max_generations` and `max_no_improvement_stretch` apply per restart.
    ///
    /// # Errors
    /// Besides the errors of [`run`](Self::run), a configuration error when
    /// neither `max_evaluations` nor `time_limit_ms` bounds the run.
    pub fn run_dynamic<F: FitnessFunction + ?Sized>(
        function: &F,
        config: &LtgaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<DynamicRuns> {
        let length = function.problem_length();
        config.validate_for_length(length)?;
        if config.max_evaluations.is_none() && config.time_limit_ms.is_none() {
            return Err(LtgaError::config(
                "max_evaluations",
                "or time_limit_ms must bound a dynamic run",
            ));
        }

        let started = Instant::now();
        let mut master = rng_from_option(config.seed);
        let mut population_size = config.population_size;
        let mut restarts: Vec<LtgaResult> = Vec::new();
        let mut population_sizes = Vec::new();
        let mut used = 0u64;

        let termination = loop {
            let mut run_config = config
                .clone()
                .with_strategy(ExecutionStrategy::Sequential)
                .with_population_size(population_size)
                .with_seed(master.random::<u64>());
            run_config.max_evaluations = config.max_evaluations.map(|limit| limit - used);
            if let Some(ms) = config.time_limit_ms {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if elapsed >= ms && !restarts.is_empty() {
                    break Termination::TimeLimit;
                }
                run_config.time_limit_ms = Some(ms.saturating_sub(elapsed).max(1));
            }

            let driver = SearchDriver::new(function, &run_config, SequentialDispatch)?;
            let result = run_driver(driver, cancel.clone())?;
            used += result.evaluations;
            log::info!(
                "dynamic restart {} with population {}: best {}, evaluations {} ({} in total)",
                restarts.len(),
                population_size,
                result.best_fitness,
                result.evaluations,
                used
            );
            let outcome = result.termination;
            restarts.push(result);
            population_sizes.push(population_size);

            match outcome {
                Termination::ValueReached
                | Termination::BudgetExhausted
                | Termination::TimeLimit
                | Termination::Cancelled => break outcome,
                Termination::Converged | Termination::GenerationLimit => {}
            }

            let next = population_size.saturating_mul(2);
            if config
                .max_evaluations
                .is_some_and(|limit| limit - used < next as u64)
            {
                break Termination::BudgetExhausted;
            }
            if config.remove_duplicates && length < 64 && next as u64 > 1u64 << length {
                break Termination::Converged;
            }
            population_size = next;
        };

        let result = combine_restarts(&restarts, termination);
        Ok(DynamicRuns {
            result,
            restarts,
            population_sizes,
        })
    }
}

/// Best of `restarts` (first one on ties) with summed effort.
fn combine_restarts(restarts: &[LtgaResult], termination: Termination) -> LtgaResult {
    let mut best = &restarts[0];
    let mut fitness_history = Vec::new();
    let mut running = f64::NEG_INFINITY;
    for restart in restarts {
        if restart.best_fitness > best.best_fitness {
            best = restart;
        }
        for &f in &restart.fitness_history {
            running = running.max(f);
            fitness_history.push(running);
        }
    }
    LtgaResult {
        best: best.best.clone(),
        best_fitness: best.best_fitness,
        evaluations: restarts.iter().map(|r| r.evaluations).sum(),
        generations: restarts.iter().map(|r| r.generations).sum(),
        termination,
        fitness_history,
    }
}

fn run_driver<F: FitnessFunction + ?Sized, D: Dispatch>(
    driver: SearchDriver<'_, F, D>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<LtgaResult> {
    match cancel {
        Some(flag) => driver.with_cancel(flag).run(),
        None => driver.run(),
    }
}

#[cfg(feature = "parallel")]
fn run_perfect_parallel<F: FitnessFunction + ?Sized>(
    function: &F,
    config: &LtgaConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<LtgaResult> {
    let dispatch = super::dispatch::PoolDispatch::new(config.threads)?;
    run_driver(SearchDriver::new(function, config, dispatch)?, cancel)
}

#[cfg(not(feature = "parallel"))]
fn run_perfect_parallel<F: FitnessFunction + ?Sized>(
    _function: &F,
    _config: &LtgaConfig,
    _cancel: Option<Arc<AtomicBool>>,
) -> Result<LtgaResult> {
    Err(LtgaError::config(
        "strategy",
        "PerfectParallel requires the `parallel` feature",
    ))
}

#[cfg(feature = "parallel")]
fn execute_runs<J>(runs: usize, threads: usize, job: J) -> Result<Vec<LtgaResult>>
where
    J: Fn(usize) -> Result<LtgaResult> + Sync,
{
    super::dispatch::PoolDispatch::new(threads.min(runs).max(1))?.map_slots(runs, job)
}

#[cfg(not(feature = "parallel"))]
fn execute_runs<J>(runs: usize, _threads: usize, job: J) -> Result<Vec<LtgaResult>>
where
    J: Fn(usize) -> Result<LtgaResult> + Sync,
{
    SequentialDispatch.map_slots(runs, job)
}

/// Highest fitness, then fewest evaluations, then lowest index.
fn select_best(results: &[LtgaResult]) -> usize {
    let mut best = 0;
    for (i, r) in results.iter().enumerate().skip(1) {
        let current = &results[best];
        if r.best_fitness > current.best_fitness
            || (r.best_fitness == current.best_fitness && r.evaluations < current.evaluations)
        {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltga::types::Genotype;

    struct OneMax(usize);

    impl FitnessFunction for OneMax {
        fn problem_length(&self) -> usize {
            self.0
        }
        fn evaluate(&self, genes: &[bool]) -> Result<f64> {
            Ok(genes.iter().filter(|&&b| b).count() as f64)
        }
    }

    fn result(fitness: f64, evaluations: u64) -> LtgaResult {
        LtgaResult {
            best: Genotype::with_fitness(vec![true], fitness),
            best_fitness: fitness,
            evaluations,
            generations: 1,
            termination: Termination::Converged,
            fitness_history: vec![fitness],
        }
    }

    #[test]
    fn test_select_best_prefers_fitness() {
        let runs = vec![result(3.0, 10), result(5.0, 900), result(4.0, 1)];
        assert_eq!(select_best(&runs), 1);
    }

    #[test]
    fn test_select_best_ties_by_evaluations_then_index() {
        let runs = vec![result(5.0, 300), result(5.0, 200), result(5.0, 200)];
        assert_eq!(select_best(&runs), 1);
        let same = vec![result(2.0, 7), result(2.0, 7)];
        assert_eq!(select_best(&same), 0);
    }

    #[test]
    fn test_sequential_strategy() {
        let config = LtgaConfig::default()
            .with_population_size(20)
            .with_value_to_reach(20.0)
            .with_seed(1);
        let result = LtgaRunner::run(&OneMax(20), &config).unwrap();
        assert!(result.best_fitness <= 20.0);
        assert!(result.evaluations >= 20);
    }

    #[test]
    fn test_independent_runs_are_reproducible() {
        let config = LtgaConfig::default()
            .with_population_size(12)
            .with_strategy(ExecutionStrategy::EmbarrassinglyParallel)
            .with_independent_runs(3)
            .with_threads(2)
            .with_seed(77);
        let a = LtgaRunner::run_independent(&OneMax(15), &config, None).unwrap();
        let b = LtgaRunner::run_independent(&OneMax(15), &config, None).unwrap();

        assert_eq!(a.runs.len(), 3);
        assert_eq!(a.seeds, b.seeds);
        assert_eq!(a.best_run, b.best_run);
        for (x, y) in a.runs.iter().zip(&b.runs) {
            assert_eq!(x.best, y.best);
            assert_eq!(x.evaluations, y.evaluations);
        }
        assert_eq!(
            a.total_evaluations(),
            a.runs.iter().map(|r| r.evaluations).sum::<u64>()
        );
        assert_eq!(a.best_run, select_best(&a.runs));
    }

    #[test]
    fn test_independent_runs_have_private_budgets() {
        let config = LtgaConfig::default()
            .with_population_size(10)
            .with_max_evaluations(200)
            .with_strategy(ExecutionStrategy::EmbarrassinglyParallel)
            .with_independent_runs(4)
            .with_seed(3);
        let runs = LtgaRunner::run_independent(&OneMax(40), &config, None).unwrap();
        assert!(runs.runs.iter().all(|r| r.evaluations <= 200));
        assert!(runs.total_evaluations() <= 800);
        let best = runs.best().best_fitness;
        assert_eq!(LtgaRunner::run(&OneMax(40), &config).unwrap().best_fitness, best);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LtgaConfig::default()
            .with_strategy(ExecutionStrategy::EmbarrassinglyParallel)
            .with_threads(0);
        assert!(matches!(
            LtgaRunner::run(&OneMax(4), &config),
            Err(LtgaError::Configuration { .. })
        ));
    }

    #[test]
    fn test_cancelled_runs_report_best_so_far() {
        let config = LtgaConfig::default()
            .with_population_size(16)
            .with_strategy(ExecutionStrategy::EmbarrassinglyParallel)
            .with_independent_runs(2)
            .with_seed(5);
        let cancel = Arc::new(AtomicBool::new(true));
        let runs = LtgaRunner::run_independent(&OneMax(30), &config, Some(cancel)).unwrap();
        for run in &runs.runs {
            assert_eq!(run.generations, 0);
            assert_eq!(run.evaluations, 16);
        }
    }

    #[test]
    fn test_combine_restarts() {
        let restarts = vec![result(3.0, 10), result(5.0, 40), result(5.0, 80)];
        let combined = combine_restarts(&restarts, Termination::BudgetExhausted);
        assert_eq!(combined.best_fitness, 5.0);
        assert_eq!(combined.evaluations, 130);
        assert_eq!(combined.generations, 3);
        assert_eq!(combined.fitness_history, vec![3.0, 5.0, 5.0]);
        assert_eq!(combined.termination, Termination::BudgetExhausted);
    }

    #[test]
    fn test_dynamic_doubles_population_until_budget_is_spent() {
        let config = LtgaConfig::default()
            .with_population_size(4)
            .with_max_evaluations(3_000)
            .with_max_no_improvement_stretch(3)
            .with_seed(17);
        let runs = LtgaRunner::run_dynamic(&OneMax(12), &config, None).unwrap();

        assert!(runs.population_sizes.len() >= 2);
        assert_eq!(runs.population_sizes[0], 4);
        for w in runs.population_sizes.windows(2) {
            assert_eq!(w[1], 2 * w[0]);
        }
        assert_eq!(runs.restarts.len(), runs.population_sizes.len());
        let spent: u64 = runs.restarts.iter().map(|r| r.evaluations).sum();
        assert_eq!(runs.result.evaluations, spent);
        assert!(spent <= 3_000);
        assert_eq!(runs.result.termination, Termination::BudgetExhausted);
        let best = runs
            .restarts
            .iter()
            .map(|r| r.best_fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(runs.result.best_fitness, best);

        let again = LtgaRunner::run_dynamic(&OneMax(12), &config, None).unwrap();
        assert_eq!(again.population_sizes, runs.population_sizes);
        assert_eq!(again.result.evaluations, runs.result.evaluations);
    }

    #[test]
    fn test_dynamic_stops_at_value_to_reach() {
        let config = LtgaConfig::default()
            .with_population_size(2)
            .with_max_evaluations(200_000)
            .with_value_to_reach(30.0)
            .with_seed(8);
        let runs = LtgaRunner::run_dynamic(&OneMax(30), &config, None).unwrap();

        assert_eq!(runs.result.termination, Termination::ValueReached);
        assert_eq!(runs.result.best_fitness, 30.0);
        assert_eq!(
            runs.restarts.last().map(|r| r.termination),
            Some(Termination::ValueReached)
        );
        for w in runs.result.fitness_history.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn test_dynamic_requires_a_bound() {
        let err = LtgaRunner::run_dynamic(&OneMax(8), &LtgaConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            LtgaError::Configuration {
                param: "max_evaluations",
                ..
            }
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_perfect_parallel_matches_sequential() {
        let base = LtgaConfig::default()
            .with_population_size(24)
            .with_max_generations(6)
            .with_seed(2024);
        let sequential = LtgaRunner::run(&OneMax(32), &base).unwrap();
        let parallel = LtgaRunner::run(
            &OneMax(32),
            &base.clone().with_strategy(ExecutionStrategy::PerfectParallel).with_threads(4),
        )
        .unwrap();

        assert_eq!(parallel.best_fitness, sequential.best_fitness);
        assert_eq!(parallel.best, sequential.best);
        assert_eq!(parallel.fitness_history, sequential.fitness_history);
        assert_eq!(parallel.evaluations, sequential.evaluations);
    }
}
