use thiserror::Error;

use tdm_choice::ChoiceError;
use tdm_core::KernelError;
use tdm_sampling::SamplingError;
use tdm_schedule::ScheduleError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("{what} length {got} does not match {expected}")]
    CountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("model handle {0} was never registered")]
    UnknownModel(usize),

    /// A precondition of a model call was violated (missing entity, bad
    /// argument).  Stops the household, never the batch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("choice error: {0}")]
    Choice(#[from] ChoiceError),

    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

pub type SimResult<T> = Result<T, SimError>;
