//! Evaluation budget accounting.
//!
//! All fitness computations of a run go through one [`Evaluator`], which
//! charges a shared [`EvaluationBudget`] before calling the fitness function.
//! The budget is an atomic counter, so parallel workers may charge it without
//! further locking and the configured maximum is never exceeded.

use super::types::{FitnessFunction, Genotype};
use crate::error::{LtgaError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative evaluation counter with an optional hard limit.
#[derive(Debug)]
pub struct EvaluationBudget {
    used: AtomicU64,
    limit: Option<u64>,
}

impl EvaluationBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            used: AtomicU64::new(0),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Evaluations charged so far.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Evaluations still available, `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|l| l.saturating_sub(self.used()))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining(), Some(0))
    }

    /// Charges one evaluation. Returns `false` without charging when the
    /// limit has been reached.
    pub fn try_consume(&self) -> bool {
        match self.limit {
            None => {
                self.used.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(limit) => self
                .used
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |u| {
                    (u < limit).then_some(u + 1)
                })
                .is_ok(),
        }
    }
}

/// A fitness function bound to the budget of one run.
pub struct Evaluator<'a, F: ?Sized> {
    function: &'a F,
    budget: &'a EvaluationBudget,
}

impl<F: ?Sized> Clone for Evaluator<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: ?Sized> Copy for Evaluator<'_, F> {}

impl<'a, F: FitnessFunction + ?Sized> Evaluator<'a, F> {
    pub fn new(function: &'a F, budget: &'a EvaluationBudget) -> Self {
        Self { function, budget }
    }

    pub fn function(&self) -> &'a F {
        self.function
    }

    pub fn budget(&self) -> &'a EvaluationBudget {
        self.budget
    }

    /// Evaluates `genes`, or returns `Ok(None)` if the budget is exhausted.
    pub fn evaluate(&self, genes: &[bool]) -> Result<Option<f64>> {
        if !self.budget.try_consume() {
            return Ok(None);
        }
        let fitness = self.function.evaluate(genes)?;
        if !fitness.is_finite() {
            return Err(LtgaError::Evaluation(format!(
                "fitness function returned non-finite value {fitness}"
            )));
        }
        Ok(Some(fitness))
    }

    /// Evaluates `genotype` in place. Returns `false` if the budget is exhausted.
    pub fn evaluate_genotype(&self, genotype: &mut Genotype) -> Result<bool> {
        match self.evaluate(genotype.genes())? {
            Some(fitness) => {
                genotype.set_fitness(fitness);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
