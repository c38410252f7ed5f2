use crate::error::Result;
use crate::ltga::FitnessFunction;

/// Number of 1-bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OneMax {
    length: usize,
}

impl OneMax {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl FitnessFunction for OneMax {
    fn problem_length(&self) -> usize {
        self.length
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        Ok(genes.iter().filter(|&&b| b).count() as f64)
    }

    fn optimum_known(&self) -> Option<f64> {
        Some(self.length as f64)
    }
}
