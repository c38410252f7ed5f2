//! Benchmark fitness functions.
//!
//! These are the standard test problems for linkage-learning GAs. They are
//! ordinary [`FitnessFunction`] implementations; nothing in the search relies
//! on them.
//!
//! | Problem | Structure |
//! |---------|-----------|
//! | [`OneMax`] | no linkage |
//! | [`DeceptiveTrap`] | disjoint deceptive blocks, tight or loose |
//! | [`NkLandscape`] | overlapping table-driven subfunctions |
//! | [`MaxCut`] | weighted graph cut |

mod maxcut;
mod nk;
mod onemax;
mod trap;

pub use maxcut::MaxCut;
pub use nk::{NkLandscape, Subfunction};
pub use onemax::OneMax;
pub use trap::DeceptiveTrap;

use crate::error::{LtgaError, Result};
use crate::ltga::FitnessFunction;
use std::fmt;
use std::str::FromStr;

/// Block size of the built-in deceptive trap.
pub const TRAP_BLOCK_SIZE: usize = 5;

/// Names under which the benchmark problems are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Problem {
    OneMax,
    DeceptiveTrap5Tight,
    NkLandscapes,
    MaxCut,
    OptimalFixedFos,
}

impl Problem {
    pub const ALL: [Problem; 5] = [
        Problem::OneMax,
        Problem::DeceptiveTrap5Tight,
        Problem::NkLandscapes,
        Problem::MaxCut,
        Problem::OptimalFixedFos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Problem::OneMax => "ONEMAX",
            Problem::DeceptiveTrap5Tight => "DECEPTIVE_TRAP_5_TIGHT_ENCODING",
            Problem::NkLandscapes => "NK_LANDSCAPES",
            Problem::MaxCut => "MAXCUT",
            Problem::OptimalFixedFos => "OPTIMAL_FIXED_FOS",
        }
    }

    /// Whether the problem is fully defined by its length.
    pub fn is_builtin(self) -> bool {
        matches!(self, Problem::OneMax | Problem::DeceptiveTrap5Tight)
    }

    /// Instantiates a problem that needs nothing but its length.
    ///
    /// # Errors
    /// Problems backed by instance data (NK tables, graphs) and the
    /// fixed-FOS variant cannot be built from a length alone.
    pub fn builtin(self, length: usize) -> Result<Box<dyn FitnessFunction>> {
        match self {
            Problem::OneMax => Ok(Box::new(OneMax::new(length))),
            Problem::DeceptiveTrap5Tight => {
                if length % TRAP_BLOCK_SIZE != 0 {
                    return Err(LtgaError::config(
                        "problem_length",
                        format!("({length}) must be a multiple of {TRAP_BLOCK_SIZE}"),
                    ));
                }
                Ok(Box::new(DeceptiveTrap::tight(length, TRAP_BLOCK_SIZE)))
            }
            Problem::NkLandscapes | Problem::MaxCut => Err(LtgaError::config(
                "problem",
                format!("{self} requires instance data"),
            )),
            Problem::OptimalFixedFos => Err(LtgaError::config(
                "problem",
                format!("{self} is not supported"),
            )),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Problem {
    type Err = LtgaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Problem::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LtgaError::config("problem", format!("unknown name {wanted:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for p in Problem::ALL {
            assert_eq!(p.to_string().parse::<Problem>().unwrap(), p);
        }
        assert_eq!("onemax".parse::<Problem>().unwrap(), Problem::OneMax);
        assert!("SPHERE".parse::<Problem>().is_err());
    }

    #[test]
    fn test_builtin_problems() {
        let f = Problem::OneMax.builtin(8).unwrap();
        assert_eq!(f.problem_length(), 8);
        assert_eq!(f.optimum_known(), Some(8.0));

        let trap = Problem::DeceptiveTrap5Tight.builtin(10).unwrap();
        assert_eq!(trap.optimum_known(), Some(2.0));
        assert_eq!(trap.evaluate(&[true; 10]).unwrap(), 2.0);

        assert!(Problem::DeceptiveTrap5Tight.builtin(12).is_err());
    }

    #[test]
    fn test_instance_problems_are_not_builtin() {
        assert!(!Problem::MaxCut.is_builtin());
        assert!(matches!(
            Problem::NkLandscapes.builtin(10),
            Err(LtgaError::Configuration { param: "problem", .. })
        ));
        assert!(Problem::OptimalFixedFos.builtin(10).is_err());
    }
}
