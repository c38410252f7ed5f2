//! Error type shared by every module of the crate.

use thiserror::Error;

/// Failures that abort a run.
///
/// Budget exhaustion, convergence and the other normal stopping conditions
/// are not errors; they are reported as a
/// [`Termination`](crate::ltga::Termination) on a successful result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LtgaError {
    /// A configuration parameter is out of range. Raised at construction,
    /// before any evaluation is spent.
    #[error("invalid configuration: {param} {reason}")]
    Configuration {
        param: &'static str,
        reason: String,
    },

    /// The fitness function signalled a failure or produced a non-finite value.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// A worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl LtgaError {
    pub(crate) fn config(param: &'static str, reason: impl Into<String>) -> Self {
        LtgaError::Configuration {
            param,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LtgaError>;
