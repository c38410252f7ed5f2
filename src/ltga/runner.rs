//! The generational search driver.
//!
//! [`SearchDriver`] owns one run: its population, evaluation budget and
//! random stream. Each [`step`](SearchDriver::step) executes one generation:
//! optional duplicate removal → linkage tree (or the configured fixed
//! FOS) → mixing of every individual → barrier merge → termination check.
//! How the per-individual work is executed is decided by the [`Dispatch`] it
//! was built with.

use super::config::LtgaConfig;
use super::dispatch::Dispatch;
use super::evaluation::{EvaluationBudget, Evaluator};
use super::linkage::LinkageTreeBuilder;
use super::mixing::{hard_local_search, OptimalMixer};
use super::population::Population;
use super::types::{FitnessFunction, Genotype};
use crate::error::Result;
use crate::random::{child_seeds, create_rng, random_order, rng_from_option};
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Termination {
    /// The best fitness met the value to reach.
    ValueReached,
    /// The evaluation budget was used up.
    BudgetExhausted,
    /// No diversity left: fitness variance within tolerance, all individuals
    /// identical, no-improvement stretch exceeded, or no subsets to mix.
    Converged,
    /// `max_generations` generations were executed.
    GenerationLimit,
    /// The wall-clock limit passed.
    TimeLimit,
    /// The cancellation token was raised.
    Cancelled,
}

/// Lifecycle of a [`SearchDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// The initial population has not been evaluated yet.
    Initializing,
    /// Generations are being executed.
    Running,
    /// Absorbing final state.
    Terminated(Termination),
}

/// Result of an LTGA run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LtgaResult {
    /// The best genotype found during the entire run.
    pub best: Genotype,

    /// Fitness of `best`.
    pub best_fitness: f64,

    /// Fitness evaluations consumed, including initialization.
    pub evaluations: u64,

    /// Generations executed.
    pub generations: usize,

    /// Why the run stopped.
    pub termination: Termination,

    /// Best fitness after initialization, then after each generation.
    pub fitness_history: Vec<f64>,
}

/// Drives one LTGA run.
///
/// # Usage
///
/// ```ignore
/// let mut driver = SearchDriver::new(&problem, &config, SequentialDispatch)?;
/// while let DriverState::Running | DriverState::Initializing = driver.step()? {}
/// println!("best: {}", driver.best().fitness());
/// ```
pub struct SearchDriver<'a, F: ?Sized, D> {
    function: &'a F,
    config: LtgaConfig,
    dispatch: D,
    budget: EvaluationBudget,
    builder: LinkageTreeBuilder,
    rng: StdRng,
    population: Population,
    best: Genotype,
    state: DriverState,
    generation: usize,
    no_improvement_stretch: usize,
    linkage_exhausted: bool,
    fitness_history: Vec<f64>,
    started: Instant,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, F: FitnessFunction + ?Sized, D: Dispatch> SearchDriver<'a, F, D> {
    /// Validates `config` against `function` and samples the initial
    /// (not yet evaluated) population.
    ///
    /// # Errors
    /// Returns [`LtgaError::Configuration`](crate::LtgaError::Configuration)
    /// for invalid settings or a problem length of 0.
    pub fn new(function: &'a F, config: &LtgaConfig, dispatch: D) -> Result<Self> {
        let length = function.problem_length();
        config.validate_for_length(length)?;

        let mut rng = rng_from_option(config.seed);
        let population = Population::random(config.population_size, length, &mut rng);
        let best = population.get(0).clone();
        let builder = if config.local_search {
            LinkageTreeBuilder::without_singletons()
        } else {
            LinkageTreeBuilder::new()
        };

        Ok(Self {
            function,
            config: config.clone(),
            dispatch,
            budget: EvaluationBudget::new(config.max_evaluations),
            builder,
            rng,
            population,
            best,
            state: DriverState::Initializing,
            generation: 0,
            no_improvement_stretch: 0,
            linkage_exhausted: false,
            fitness_history: Vec::new(),
            started: Instant::now(),
            cancel: None,
        })
    }

    /// Attaches a cancellation token, checked at every generation barrier.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Best genotype so far; unevaluated before initialization.
    pub fn best(&self) -> &Genotype {
        &self.best
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn evaluations(&self) -> u64 {
        self.budget.used()
    }

    pub fn no_improvement_stretch(&self) -> usize {
        self.no_improvement_stretch
    }

    pub fn fitness_history(&self) -> &[f64] {
        &self.fitness_history
    }

    pub fn config(&self) -> &LtgaConfig {
        &self.config
    }

    /// Advances the state machine by one transition and returns the new state.
    ///
    /// `Initializing` evaluates the initial population; `Running` executes one
    /// generation; `Terminated` is returned unchanged.
    ///
    /// # Errors
    /// Propagates fitness-function failures; the run cannot be resumed after
    /// an error.
    pub fn step(&mut self) -> Result<DriverState> {
        match self.state {
            DriverState::Terminated(_) => return Ok(self.state),
            DriverState::Initializing => self.initialize()?,
            DriverState::Running => self.generation_step()?,
        }
        Ok(self.state)
    }

    /// Steps until the run terminates.
    pub fn run(mut self) -> Result<LtgaResult> {
        loop {
            if let DriverState::Terminated(termination) = self.step()? {
                return Ok(self.into_result(termination));
            }
        }
    }

    /// Evaluates the initial population, then applies local search when
    /// enabled. Every individual is evaluated before any local search starts.
    fn initialize(&mut self) -> Result<()> {
        let n = self.population.len();
        let seeds = child_seeds(n, &mut self.rng);
        let evaluator = Evaluator::new(self.function, &self.budget);
        let sampled = self.population.individuals();

        let mut individuals = self.dispatch.map_slots(n, |i| {
            let mut genotype = sampled[i].clone();
            evaluator.evaluate_genotype(&mut genotype)?;
            Ok(genotype)
        })?;

        if self.config.local_search {
            let evaluated = &individuals;
            let stop = AtomicBool::new(false);
            individuals = self.dispatch.map_slots(n, |i| {
                let mut genotype = evaluated[i].clone();
                let mut rng = create_rng(seeds[i]);
                hard_local_search(&mut genotype, &evaluator, &mut rng, &stop)?;
                Ok(genotype)
            })?;
        }

        self.population.replace_all(individuals);
        self.best = self.population.best().clone();
        self.fitness_history.push(self.best.fitness());
        log::debug!(
            "initialized {} individuals of length {}: best {}, evaluations {}",
            n,
            self.population.problem_length(),
            self.best.fitness(),
            self.budget.used()
        );
        self.finish_step();
        Ok(())
    }

    fn generation_step(&mut self) -> Result<()> {
        if self.config.remove_duplicates {
            let evaluator = Evaluator::new(self.function, &self.budget);
            let removal = self.population.remove_duplicates(&evaluator, &mut self.rng)?;
            if removal.replaced > 0 {
                log::trace!(
                    "generation {}: replaced {} duplicate individuals",
                    self.generation + 1,
                    removal.replaced
                );
            }
            if removal.budget_exhausted {
                self.refresh_best();
                self.finish_step();
                return Ok(());
            }
        }

        let learned;
        let fos = match self.config.fixed_fos.as_ref() {
            Some(fixed) => fixed,
            None => {
                let order = random_order(self.population.problem_length(), &mut self.rng);
                let matrix = self.dispatch.mutual_information(&self.population, &order);
                learned = self.builder.build_from_matrix(matrix, &order, &mut self.rng);
                &learned
            }
        };
        if fos.is_empty() {
            self.linkage_exhausted = true;
            self.finish_step();
            return Ok(());
        }

        let n = self.population.len();
        let seeds = child_seeds(n, &mut self.rng);
        let stop = AtomicBool::new(false);
        let mixer =
            OptimalMixer::from_config(Evaluator::new(self.function, &self.budget), &self.config);
        let donors = self.population.individuals();
        let elitist = &self.best;
        let stretch = self.no_improvement_stretch;
        let fos_len = fos.len();

        let outcomes = self.dispatch.map_slots(n, |i| {
            let mut rng = create_rng(seeds[i]);
            mixer.mix(i, donors, fos, elitist, stretch, &mut rng, &stop)
        })?;

        let next: Vec<Genotype> = outcomes.into_iter().map(|o| o.genotype).collect();
        self.population.replace_all(next);
        self.generation += 1;

        if self.refresh_best() {
            self.no_improvement_stretch = 0;
        } else {
            self.no_improvement_stretch += 1;
        }
        self.fitness_history.push(self.best.fitness());

        log::debug!(
            "generation {}: best {}, evaluations {}, no-improvement stretch {}, fos size {}",
            self.generation,
            self.best.fitness(),
            self.budget.used(),
            self.no_improvement_stretch,
            fos_len
        );
        self.finish_step();
        Ok(())
    }

    /// Adopts the population's best if it strictly beats the best so far.
    fn refresh_best(&mut self) -> bool {
        let candidate = self.population.best();
        if candidate.fitness() > self.best.fitness() {
            self.best = candidate.clone();
            true
        } else {
            false
        }
    }

    fn finish_step(&mut self) {
        self.state = match self.check_termination() {
            Some(termination) => {
                log::info!(
                    "LTGA terminated ({:?}) after {} generations: best {}, evaluations {}",
                    termination,
                    self.generation,
                    self.best.fitness(),
                    self.budget.used()
                );
                DriverState::Terminated(termination)
            }
            None => DriverState::Running,
        };
    }

    /// Evaluates the termination criteria at the current barrier.
    ///
    /// When several hold, the first in this order wins: value reached,
    /// budget exhausted, converged, generation limit, time limit, cancelled.
    pub fn check_termination(&self) -> Option<Termination> {
        let config = &self.config;
        if let Some(target) = config.value_to_reach {
            if self.best.fitness() + config.fitness_tolerance >= target {
                return Some(Termination::ValueReached);
            }
        }
        if self.budget.is_exhausted() {
            return Some(Termination::BudgetExhausted);
        }
        if self.is_converged() {
            return Some(Termination::Converged);
        }
        if config.max_generations.is_some_and(|g| self.generation >= g) {
            return Some(Termination::GenerationLimit);
        }
        if config
            .time_limit_ms
            .is_some_and(|ms| self.started.elapsed().as_millis() >= u128::from(ms))
        {
            return Some(Termination::TimeLimit);
        }
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(Termination::Cancelled);
        }
        None
    }

    fn is_converged(&self) -> bool {
        let max_stretch = self.config.max_no_improvement_stretch;
        self.linkage_exhausted
            || self.population.fitness_variance() <= self.config.fitness_variance_tolerance
            || self.population.all_identical()
            || (max_stretch > 0 && self.no_improvement_stretch > max_stretch)
    }

    fn into_result(self, termination: Termination) -> LtgaResult {
        LtgaResult {
            best_fitness: self.best.fitness(),
            best: self.best,
            evaluations: self.budget.used(),
            generations: self.generation,
            termination,
            fitness_history: self.fitness_history,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
