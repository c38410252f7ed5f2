//! Additively decomposable landscapes defined by lookup tables.
//!
//! Fitness is the sum of subfunctions; each subfunction reads a handful of
//! variables, forms an index from their bits (first variable most
//! significant) and looks the contribution up in its table. NK landscapes
//! are the case where every subfunction reads `k + 1` variables.

use crate::error::{LtgaError, Result};
use crate::ltga::FitnessFunction;
use rand::Rng;

/// One term of an additive landscape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subfunction {
    variables: Vec<usize>,
    table: Vec<f64>,
}

impl Subfunction {
    /// # Errors
    /// The table must have exactly `2^variables.len()` entries, all finite.
    pub fn new(variables: Vec<usize>, table: Vec<f64>) -> Result<Self> {
        if variables.is_empty() || variables.len() >= usize::BITS as usize {
            return Err(LtgaError::config(
                "subfunction",
                "must read between 1 and 63 variables",
            ));
        }
        let expected = 1usize << variables.len();
        if table.len() != expected {
            return Err(LtgaError::config(
                "subfunction",
                format!(
                    "lookup table has {} entries, expected {expected}",
                    table.len()
                ),
            ));
        }
        if table.iter().any(|v| !v.is_finite()) {
            return Err(LtgaError::config("subfunction", "table values must be finite"));
        }
        Ok(Self { variables, table })
    }

    pub fn variables(&self) -> &[usize] {
        &self.variables
    }

    pub fn table(&self) -> &[f64] {
        &self.table
    }

    fn evaluate(&self, genes: &[bool]) -> f64 {
        let key = self
            .variables
            .iter()
            .fold(0usize, |key, &v| (key << 1) | usize::from(genes[v]));
        self.table[key]
    }
}

/// Sum of table-driven subfunctions over `length` variables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NkLandscape {
    length: usize,
    subfunctions: Vec<Subfunction>,
    optimum: Option<f64>,
    optimal_solution: Option<Vec<bool>>,
}

impl NkLandscape {
    /// # Errors
    /// Fails if a subfunction reads a variable outside `0..length`.
    pub fn new(length: usize, subfunctions: Vec<Subfunction>) -> Result<Self> {
        if let Some(v) = subfunctions
            .iter()
            .flat_map(|s| s.variables.iter().copied())
            .find(|&v| v >= length)
        {
            return Err(LtgaError::config(
                "subfunction",
                format!("variable {v} is outside 0..{length}"),
            ));
        }
        Ok(Self {
            length,
            subfunctions,
            optimum: None,
            optimal_solution: None,
        })
    }

    /// A random NK landscape: subfunction `i` reads variable `i` and its `k`
    /// cyclic successors; table entries are uniform in `[0, 1)`.
    ///
    /// # Errors
    /// `k` must be smaller than `length`.
    pub fn random<R: Rng>(length: usize, k: usize, rng: &mut R) -> Result<Self> {
        if k >= length {
            return Err(LtgaError::config(
                "k",
                format!("({k}) must be smaller than the number of variables ({length})"),
            ));
        }
        let subfunctions = (0..length)
            .map(|i| {
                let variables = (0..=k).map(|j| (i + j) % length).collect();
                let table = (0..1usize << (k + 1)).map(|_| rng.random::<f64>()).collect();
                Subfunction::new(variables, table)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(length, subfunctions)
    }

    /// Records the known optimal value.
    pub fn with_optimum(mut self, value: f64) -> Self {
        self.optimum = Some(value);
        self
    }

    /// Records a known optimal solution.
    pub fn with_optimal_solution(mut self, genes: Vec<bool>) -> Self {
        self.optimal_solution = Some(genes);
        self
    }

    pub fn subfunctions(&self) -> &[Subfunction] {
        &self.subfunctions
    }

    pub fn optimal_solution(&self) -> Option<&[bool]> {
        self.optimal_solution.as_deref()
    }
}

impl FitnessFunction for NkLandscape {
    fn problem_length(&self) -> usize {
        self.length
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        if genes.len() != self.length {
            return Err(LtgaError::Evaluation(format!(
                "expected {} variables, got {}",
                self.length,
                genes.len()
            )));
        }
        Ok(self.subfunctions.iter().map(|s| s.evaluate(genes)).sum())
    }

    fn optimum_known(&self) -> Option<f64> {
        self.optimum
    }
}
