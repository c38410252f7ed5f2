//! Gene-pool optimal mixing (GOM).
//!
//! For every subset of the FOS a random donor's bits are copied into the
//! individual; the change is kept if fitness does not decrease. Optional
//! forced improvements pull stagnating individuals towards the elitist, and an
//! optional bit-flip local search polishes the result.
//!
//! # References
//!
//! - Thierens & Bosman (2011), "Optimal mixing evolutionary algorithms",
//!   GECCO '11
//! - Bosman & Thierens (2012), "Linkage neighbors, optimal mixing and forced
//!   improvements in genetic algorithms", GECCO '12

use super::config::LtgaConfig;
use super::evaluation::Evaluator;
use super::linkage::Fos;
use super::types::{FitnessFunction, Genotype};
use crate::error::Result;
use crate::random::random_order;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Order in which an individual walks the FOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MixingOrder {
    /// As delivered by the linkage tree: leaves first, then merges bottom-up.
    #[default]
    Tree,
    /// A fresh random permutation for every individual.
    Random,
}

/// What happened to one individual during mixing.
#[derive(Debug, Clone)]
pub struct MixOutcome {
    /// The individual after mixing.
    pub genotype: Genotype,
    /// Fitness evaluations spent on it.
    pub evaluations: u64,
    /// Fitness strictly increased.
    pub improved: bool,
    /// Bits differ from the input.
    pub changed: bool,
    /// The value to reach was met by this individual.
    pub reached_target: bool,
    /// Mixing stopped because the evaluation budget ran out.
    pub budget_exhausted: bool,
}

impl MixOutcome {
    /// An outcome that leaves `genotype` as it was.
    pub fn unchanged(genotype: Genotype) -> Self {
        Self {
            genotype,
            evaluations: 0,
            improved: false,
            changed: false,
            reached_target: false,
            budget_exhausted: false,
        }
    }
}

/// Result of [`hard_local_search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalSearch {
    pub evaluations: u64,
    pub improved: bool,
    pub budget_exhausted: bool,
}

/// Applies GOM to single individuals.
pub struct OptimalMixer<'a, F: ?Sized> {
    evaluator: Evaluator<'a, F>,
    order: MixingOrder,
    value_to_reach: Option<f64>,
    fitness_tolerance: f64,
    forced_improvement: bool,
    local_search: bool,
}

impl<'a, F: FitnessFunction + ?Sized> OptimalMixer<'a, F> {
    /// Plain GOM in tree order, no target, no extras.
    pub fn new(evaluator: Evaluator<'a, F>) -> Self {
        Self {
            evaluator,
            order: MixingOrder::Tree,
            value_to_reach: None,
            fitness_tolerance: 0.0,
            forced_improvement: false,
            local_search: false,
        }
    }

    /// A mixer set up as `config` describes.
    pub fn from_config(evaluator: Evaluator<'a, F>, config: &LtgaConfig) -> Self {
        Self {
            evaluator,
            order: config.mixing_order,
            value_to_reach: config.value_to_reach,
            fitness_tolerance: config.fitness_tolerance,
            forced_improvement: config.forced_improvement,
            local_search: config.local_search,
        }
    }

    pub fn with_order(mut self, order: MixingOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_value_to_reach(mut self, target: f64, tolerance: f64) -> Self {
        self.value_to_reach = Some(target);
        self.fitness_tolerance = tolerance;
        self
    }

    pub fn with_forced_improvement(mut self, enabled: bool) -> Self {
        self.forced_improvement = enabled;
        self
    }

    pub fn with_local_search(mut self, enabled: bool) -> Self {
        self.local_search = enabled;
        self
    }

    pub fn evaluator(&self) -> &Evaluator<'a, F> {
        &self.evaluator
    }

    /// `true` when `fitness` meets the value to reach.
    pub fn reaches_target(&self, fitness: f64) -> bool {
        self.value_to_reach
            .is_some_and(|v| fitness + self.fitness_tolerance >= v)
    }

    /// Mixes `donors[target]` against the rest of `donors`.
    ///
    /// `donors` is the population as it was at the start of the generation
    /// and is never modified. `elitist` and `no_improvement_stretch` are only
    /// consulted by forced improvements. When `stop` is raised (by this or
    /// another worker reaching the value to reach) the remaining subsets are
    /// skipped, and so are forced improvement and local search.
    ///
    /// # Panics
    /// Panics if `target` is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn mix<R: Rng>(
        &self,
        target: usize,
        donors: &[Genotype],
        fos: &Fos,
        elitist: &Genotype,
        no_improvement_stretch: usize,
        rng: &mut R,
        stop: &AtomicBool,
    ) -> Result<MixOutcome> {
        let original = &donors[target];
        if stop.load(Ordering::Relaxed) {
            return Ok(MixOutcome::unchanged(original.clone()));
        }

        let mut accepted = original.clone();
        let mut trial: Vec<bool> = accepted.genes().to_vec();
        let mut outcome = MixOutcome::unchanged(original.clone());
        let mut gom_changed = false;

        let order: Vec<usize> = match self.order {
            MixingOrder::Tree => (0..fos.len()).collect(),
            MixingOrder::Random => random_order(fos.len(), rng),
        };

        for &k in &order {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let subset = fos.get(k);
            let donor = &donors[pick_donor(target, donors.len(), rng)];
            if !copy_bits(&mut trial, donor.genes(), subset) {
                continue;
            }
            let Some(fitness) = self.evaluator.evaluate(&trial)? else {
                outcome.budget_exhausted = true;
                break;
            };
            outcome.evaluations += 1;
            if fitness >= accepted.fitness() {
                accepted.copy_positions_from(&trial, subset);
                accepted.set_fitness(fitness);
                gom_changed = true;
                if self.check_target(fitness, stop) {
                    outcome.reached_target = true;
                    break;
                }
            } else {
                accepted.record_rejected_evaluation();
                copy_bits(&mut trial, accepted.genes(), subset);
            }
        }

        let halted = |outcome: &MixOutcome| {
            outcome.reached_target || outcome.budget_exhausted || stop.load(Ordering::Relaxed)
        };
        let stagnating = no_improvement_stretch as f64 > 1.0 + (donors.len() as f64).log10();
        if self.forced_improvement && !halted(&outcome) && (!gom_changed || stagnating) {
            self.force_improvement(
                &mut accepted,
                &mut trial,
                fos,
                elitist,
                rng,
                stop,
                &mut outcome,
            )?;
        }

        if self.local_search && !halted(&outcome) {
            let search = hard_local_search(&mut accepted, &self.evaluator, rng, stop)?;
            outcome.evaluations += search.evaluations;
            outcome.budget_exhausted = search.budget_exhausted;
            if search.improved && self.check_target(accepted.fitness(), stop) {
                outcome.reached_target = true;
            }
        }

        outcome.improved = accepted.fitness() > original.fitness();
        outcome.changed = accepted != *original;
        outcome.genotype = accepted;
        Ok(outcome)
    }

    /// Copies one elitist subset at a time, in random order, until the first
    /// strict improvement. Without one, the individual becomes a copy of the
    /// elitist unless that would lower its fitness.
    #[allow(clippy::too_many_arguments)]
    fn force_improvement<R: Rng>(
        &self,
        accepted: &mut Genotype,
        trial: &mut [bool],
        fos: &Fos,
        elitist: &Genotype,
        rng: &mut R,
        stop: &AtomicBool,
        outcome: &mut MixOutcome,
    ) -> Result<()> {
        for k in random_order(fos.len(), rng) {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            let subset = fos.get(k);
            if !copy_bits(trial, elitist.genes(), subset) {
                continue;
            }
            let Some(fitness) = self.evaluator.evaluate(trial)? else {
                outcome.budget_exhausted = true;
                copy_bits(trial, accepted.genes(), subset);
                break;
            };
            outcome.evaluations += 1;
            if fitness > accepted.fitness() {
                accepted.copy_positions_from(trial, subset);
                accepted.set_fitness(fitness);
                outcome.reached_target = self.check_target(fitness, stop);
                return Ok(());
            }
            accepted.record_rejected_evaluation();
            copy_bits(trial, accepted.genes(), subset);
        }

        if elitist.is_evaluated()
            && elitist.fitness() >= accepted.fitness()
            && *elitist != *accepted
        {
            accepted.assign_from(elitist);
            trial.copy_from_slice(accepted.genes());
        }
        Ok(())
    }

    fn check_target(&self, fitness: f64, stop: &AtomicBool) -> bool {
        if self.reaches_target(fitness) {
            log::trace!("value to reach met with fitness {fitness}; short-circuiting mixing");
            stop.store(true, Ordering::Relaxed);
            true
        } else {
            false
        }
    }
}

/// First-improvement bit-flip pass over every position in random order.
///
/// A flip is kept when fitness does not decrease. `genotype` must already be
/// evaluated. The pass ends early once `stop` is raised.
pub fn hard_local_search<F: FitnessFunction + ?Sized, R: Rng>(
    genotype: &mut Genotype,
    evaluator: &Evaluator<'_, F>,
    rng: &mut R,
    stop: &AtomicBool,
) -> Result<LocalSearch> {
    let mut result = LocalSearch::default();
    let start = genotype.fitness();
    for position in random_order(genotype.len(), rng) {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        genotype.flip(position);
        match evaluator.evaluate(genotype.genes())? {
            Some(fitness) => {
                result.evaluations += 1;
                if fitness >= genotype.fitness() {
                    genotype.set_fitness(fitness);
                } else {
                    genotype.flip(position);
                    genotype.record_rejected_evaluation();
                }
            }
            None => {
                genotype.flip(position);
                result.budget_exhausted = true;
                break;
            }
        }
    }
    result.improved = genotype.fitness() > start;
    Ok(result)
}

/// Uniform donor index other than `target` (unless it is the only one).
fn pick_donor<R: Rng>(target: usize, population_size: usize, rng: &mut R) -> usize {
    if population_size <= 1 {
        return target;
    }
    let r = rng.random_range(0..population_size - 1);
    if r >= target {
        r + 1
    } else {
        r
    }
}

/// Copies `src` into `dst` at `positions`; `true` if any bit changed.
fn copy_bits(dst: &mut [bool], src: &[bool], positions: &[usize]) -> bool {
    let mut changed = false;
    for &p in positions {
        if dst[p] != src[p] {
            dst[p] = src[p];
            changed = true;
        }
    }
    changed
}
