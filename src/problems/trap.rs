//! Concatenated deceptive trap functions.
//!
//! The genotype is split into `L / k` blocks of `k` bits. A block scores 1
//! when all its bits are set and `(k - 1 - u) / k` otherwise, where `u` is the
//! number of set bits, so every block's gradient leads away from the optimum.

use crate::error::{LtgaError, Result};
use crate::ltga::FitnessFunction;

/// Deceptive trap of order `k` with tight or loose encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeceptiveTrap {
    length: usize,
    k: usize,
    tight: bool,
}

impl DeceptiveTrap {
    /// Blocks occupy contiguous positions: block `i` is `i*k .. (i+1)*k`.
    pub fn tight(length: usize, k: usize) -> Self {
        Self {
            length,
            k,
            tight: true,
        }
    }

    /// Blocks are interleaved: block `i` is `i, i + m, i + 2m, ...` with
    /// `m = L / k`.
    pub fn loose(length: usize, k: usize) -> Self {
        Self {
            length,
            k,
            tight: false,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_tight(&self) -> bool {
        self.tight
    }

    /// Variable indices of every block, in block order.
    pub fn blocks(&self) -> Vec<Vec<usize>> {
        let m = self.length / self.k.max(1);
        (0..m)
            .map(|i| {
                (0..self.k)
                    .map(|j| if self.tight { i * self.k + j } else { i + m * j })
                    .collect()
            })
            .collect()
    }
}

impl FitnessFunction for DeceptiveTrap {
    fn problem_length(&self) -> usize {
        self.length
    }

    fn evaluate(&self, genes: &[bool]) -> Result<f64> {
        let k = self.k;
        if k == 0 || genes.len() % k != 0 {
            return Err(LtgaError::Evaluation(format!(
                "deceptive trap: number of parameters ({}) is not a multiple of {k}",
                genes.len()
            )));
        }
        let m = genes.len() / k;
        let total = (0..m)
            .map(|i| {
                let u = (0..k)
                    .filter(|&j| genes[if self.tight { i * k + j } else { i + m * j }])
                    .count();
                if u == k {
                    1.0
                } else {
                    (k - 1 - u) as f64 / k as f64
                }
            })
            .sum();
        Ok(total)
    }

    fn optimum_known(&self) -> Option<f64> {
        (self.k > 0 && self.length % self.k == 0).then(|| (self.length / self.k) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_tight_block_scores() {
        let f = DeceptiveTrap::tight(10, 5);
        assert_eq!(f.evaluate(&bits("1111111111")).unwrap(), 2.0);
        assert_eq!(f.evaluate(&bits("0000000000")).unwrap(), 1.6);
        assert!((f.evaluate(&bits("1111100000")).unwrap() - 1.8).abs() < 1e-12);
        // One block with a single 1: (5-1-1)/5.
        assert!((f.evaluate(&bits("1000011111")).unwrap() - 1.6).abs() < 1e-12);
        assert_eq!(f.optimum_known(), Some(2.0));
    }

    #[test]
    fn test_loose_encoding_interleaves() {
        let f = DeceptiveTrap::loose(10, 5);
        // Positions 0,2,4,6,8 form block 0.
        assert!((f.evaluate(&bits("1010101010")).unwrap() - 1.8).abs() < 1e-12);
        assert_eq!(f.blocks()[1], vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_length_must_be_multiple_of_k() {
        let f = DeceptiveTrap::tight(7, 5);
        assert!(matches!(
            f.evaluate(&[true; 7]),
            Err(LtgaError::Evaluation(_))
        ));
        assert_eq!(f.optimum_known(), None);
    }
}
