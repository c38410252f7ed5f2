//! Population of genotypes.

use super::evaluation::Evaluator;
use super::types::{FitnessFunction, Genotype};
use crate::error::{LtgaError, Result};
use rand::Rng;
use std::collections::HashSet;

/// An ordered, fixed-size collection of equal-length genotypes.
#[derive(Debug, Clone)]
pub struct Population {
    individuals: Vec<Genotype>,
    length: usize,
}

/// Result of a duplicate-removal pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DuplicateRemoval {
    /// Individuals replaced by fresh random genotypes.
    pub replaced: usize,
    /// Evaluations spent on the replacements.
    pub evaluations: u64,
    /// The pass stopped early because the budget ran out.
    pub budget_exhausted: bool,
}

impl Population {
    /// Wraps existing genotypes.
    ///
    /// # Errors
    /// Fails if `individuals` is empty or the genotypes differ in length.
    pub fn new(individuals: Vec<Genotype>) -> Result<Self> {
        let length = match individuals.first() {
            Some(first) => first.len(),
            None => return Err(LtgaError::config("population_size", "must be at least 1")),
        };
        if individuals.iter().any(|g| g.len() != length) {
            return Err(LtgaError::config(
                "population",
                "genotypes must all have the same length",
            ));
        }
        Ok(Self {
            individuals,
            length,
        })
    }

    /// Samples `size` unevaluated random genotypes of `length` bits.
    pub fn random<R: Rng>(size: usize, length: usize, rng: &mut R) -> Self {
        let individuals = (0..size).map(|_| Genotype::random(length, rng)).collect();
        Self {
            individuals,
            length,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Number of variables per genotype.
    pub fn problem_length(&self) -> usize {
        self.length
    }

    pub fn get(&self, index: usize) -> &Genotype {
        &self.individuals[index]
    }

    pub fn individuals(&self) -> &[Genotype] {
        &self.individuals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Genotype> {
        self.individuals.iter()
    }

    pub fn into_vec(self) -> Vec<Genotype> {
        self.individuals
    }

    /// Replaces all individuals at once (the generation barrier swap).
    ///
    /// # Panics
    /// Panics if the size or genotype length changes.
    pub fn replace_all(&mut self, individuals: Vec<Genotype>) {
        assert_eq!(
            individuals.len(),
            self.individuals.len(),
            "population size is fixed for the lifetime of a run"
        );
        debug_assert!(individuals.iter().all(|g| g.len() == self.length));
        self.individuals = individuals;
    }

    /// Index of the fittest individual; the first one on ties.
    pub fn best_index(&self) -> usize {
        let mut best = 0;
        for (i, g) in self.individuals.iter().enumerate() {
            if g.fitness() > self.individuals[best].fitness() {
                best = i;
            }
        }
        best
    }

    pub fn best(&self) -> &Genotype {
        &self.individuals[self.best_index()]
    }

    pub fn mean_fitness(&self) -> f64 {
        let sum: f64 = self.individuals.iter().map(Genotype::fitness).sum();
        sum / self.individuals.len() as f64
    }

    /// Population variance of the fitness values.
    pub fn fitness_variance(&self) -> f64 {
        let mean = self.mean_fitness();
        let sum: f64 = self
            .individuals
            .iter()
            .map(|g| (g.fitness() - mean) * (g.fitness() - mean))
            .sum();
        sum / self.individuals.len() as f64
    }

    /// `true` when every genotype carries the same bits.
    pub fn all_identical(&self) -> bool {
        match self.individuals.split_first() {
            Some((first, rest)) => rest.iter().all(|g| g == first),
            None => true,
        }
    }

    /// Indices of genotypes bit-identical to an earlier one.
    pub fn duplicate_indices(&self) -> Vec<usize> {
        let mut seen: HashSet<&[bool]> = HashSet::with_capacity(self.individuals.len());
        self.individuals
            .iter()
            .enumerate()
            .filter(|(_, g)| !seen.insert(g.genes()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Evaluates every genotype that has no fitness yet.
    ///
    /// Returns `false` if the budget ran out before all were evaluated.
    pub fn evaluate_missing<F: FitnessFunction + ?Sized>(
        &mut self,
        evaluator: &Evaluator<'_, F>,
    ) -> Result<bool> {
        for g in self.individuals.iter_mut().filter(|g| !g.is_evaluated()) {
            if !evaluator.evaluate_genotype(g)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Replaces every duplicate with a fresh, evaluated random genotype that
    /// differs from all retained ones.
    ///
    /// When the budget runs out, the remaining duplicates are kept.
    pub fn remove_duplicates<F: FitnessFunction + ?Sized, R: Rng>(
        &mut self,
        evaluator: &Evaluator<'_, F>,
        rng: &mut R,
    ) -> Result<DuplicateRemoval> {
        let duplicates = self.duplicate_indices();
        let mut outcome = DuplicateRemoval::default();
        if duplicates.is_empty() {
            return Ok(outcome);
        }

        let mut taken: HashSet<Vec<bool>> = self
            .individuals
            .iter()
            .map(|g| g.genes().to_vec())
            .collect();

        for index in duplicates {
            let mut fresh = unused_genotype(self.length, &taken, rng);
            if !evaluator.evaluate_genotype(&mut fresh)? {
                outcome.budget_exhausted = true;
                break;
            }
            log::trace!(
                "replaced duplicate at slot {index} with fitness {}",
                fresh.fitness()
            );
            taken.insert(fresh.genes().to_vec());
            self.individuals[index] = fresh;
            outcome.replaced += 1;
            outcome.evaluations += 1;
        }
        Ok(outcome)
    }
}

/// Samples a random genotype not in `taken`.
///
/// Falls back to enumerating bit patterns when rejection sampling keeps
/// colliding, which only happens when `taken` covers most of the space.
fn unused_genotype<R: Rng>(length: usize, taken: &HashSet<Vec<bool>>, rng: &mut R) -> Genotype {
    const MAX_ATTEMPTS: usize = 256;
    for _ in 0..MAX_ATTEMPTS {
        let candidate = Genotype::random(length, rng);
        if !taken.contains(candidate.genes()) {
            return candidate;
        }
    }
    if length < 64 {
        for pattern in 0..(1u64 << length) {
            let genes: Vec<bool> = (0..length).map(|j| (pattern >> j) & 1 == 1).collect();
            if !taken.contains(&genes) {
                return Genotype::new(genes);
            }
        }
    }
    Genotype::random(length, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltga::evaluation::EvaluationBudget;
    use crate::random::create_rng;

    struct OneMax(usize);

    impl FitnessFunction for OneMax {
        fn problem_length(&self) -> usize {
            self.0
        }
        fn evaluate(&self, genes: &[bool]) -> Result<f64> {
            Ok(genes.iter().filter(|&&b| b).count() as f64)
        }
    }

    fn evaluated(rows: &[&[u8]]) -> Population {
        let individuals = rows
            .iter()
            .map(|row| {
                let genes: Vec<bool> = row.iter().map(|&b| b == 1).collect();
                let fitness = genes.iter().filter(|&&b| b).count() as f64;
                Genotype::with_fitness(genes, fitness)
            })
            .collect();
        Population::new(individuals).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_and_ragged() {
        assert!(Population::new(vec![]).is_err());
        let ragged = vec![Genotype::new(vec![true]), Genotype::new(vec![true, false])];
        assert!(Population::new(ragged).is_err());
    }

    #[test]
    fn test_best_index_first_on_ties() {
        let pop = evaluated(&[&[0, 1, 0], &[1, 1, 0], &[0, 1, 1], &[0, 0, 0]]);
        assert_eq!(pop.best_index(), 1);
        assert_eq!(pop.best().fitness(), 2.0);
    }

    #[test]
    fn test_fitness_variance() {
        let pop = evaluated(&[&[0, 0], &[1, 1]]);
        assert!((pop.mean_fitness() - 1.0).abs() < 1e-12);
        assert!((pop.fitness_variance() - 1.0).abs() < 1e-12);

        let flat = evaluated(&[&[1, 0], &[0, 1]]);
        assert_eq!(flat.fitness_variance(), 0.0);
    }

    #[test]
    fn test_all_identical() {
        assert!(evaluated(&[&[1, 0], &[1, 0], &[1, 0]]).all_identical());
        assert!(!evaluated(&[&[1, 0], &[0, 1]]).all_identical());
    }

    #[test]
    fn test_duplicate_indices() {
        let pop = evaluated(&[&[1, 0], &[0, 1], &[1, 0], &[1, 0], &[0, 1], &[1, 1]]);
        assert_eq!(pop.duplicate_indices(), vec![2, 3, 4]);
    }

    #[test]
    fn test_remove_duplicates_leaves_distinct_population() {
        let mut pop = evaluated(&[&[1, 0, 1], &[1, 0, 1], &[1, 0, 1], &[0, 0, 0], &[0, 0, 0]]);
        let budget = EvaluationBudget::unlimited();
        let evaluator = Evaluator::new(&OneMax(3), &budget);
        let mut rng = create_rng(11);

        let outcome = pop.remove_duplicates(&evaluator, &mut rng).unwrap();

        assert_eq!(outcome.replaced, 3);
        assert_eq!(outcome.evaluations, 3);
        assert_eq!(budget.used(), 3);
        assert!(pop.duplicate_indices().is_empty());
        assert!(pop.iter().all(Genotype::is_evaluated));
        // Survivors keep their slots.
        assert_eq!(pop.get(0).to_bit_string(), "101");
        assert_eq!(pop.get(3).to_bit_string(), "000");
    }

    #[test]
    fn test_remove_duplicates_fills_space_completely() {
        // Four slots over a two-bit space: the only valid outcome uses every pattern.
        let mut pop = evaluated(&[&[1, 1], &[1, 1], &[1, 1], &[1, 1]]);
        let budget = EvaluationBudget::unlimited();
        let evaluator = Evaluator::new(&OneMax(2), &budget);
        let mut rng = create_rng(5);
        pop.remove_duplicates(&evaluator, &mut rng).unwrap();

        let mut patterns: Vec<String> = pop.iter().map(Genotype::to_bit_string).collect();
        patterns.sort();
        assert_eq!(patterns, vec!["00", "01", "10", "11"]);
    }

    #[test]
    fn test_remove_duplicates_stops_on_budget() {
        let mut pop = evaluated(&[&[1, 0, 1, 1], &[1, 0, 1, 1], &[1, 0, 1, 1]]);
        let budget = EvaluationBudget::new(Some(1));
        let evaluator = Evaluator::new(&OneMax(4), &budget);
        let mut rng = create_rng(2);

        let outcome = pop.remove_duplicates(&evaluator, &mut rng).unwrap();

        assert_eq!(outcome.replaced, 1);
        assert!(outcome.budget_exhausted);
        assert_eq!(pop.duplicate_indices().len(), 1);
    }

    #[test]
    fn test_evaluate_missing() {
        let mut rng = create_rng(8);
        let mut pop = Population::random(6, 5, &mut rng);
        let budget = EvaluationBudget::unlimited();
        let evaluator = Evaluator::new(&OneMax(5), &budget);
        assert!(pop.evaluate_missing(&evaluator).unwrap());
        assert_eq!(budget.used(), 6);
        // Already evaluated individuals cost nothing.
        assert!(pop.evaluate_missing(&evaluator).unwrap());
        assert_eq!(budget.used(), 6);
        for g in pop.iter() {
            assert_eq!(g.fitness(), g.count_ones() as f64);
        }
    }
}
