use thiserror::Error;

use tdm_core::{CoefficientId, ComponentId, NestId};

#[derive(Debug, Error, PartialEq)]
pub enum ChoiceError {
    #[error("alternative {alternative}: term {coefficient} has non-finite value {value}")]
    NonFiniteUtility { alternative: usize, coefficient: CoefficientId, value: f64 },

    #[error("alternative {alternative}: evaluated utility {utility} is not finite")]
    UtilityOverflow { alternative: usize, utility: f64 },

    #[error("{nest}: theta {theta} outside (0, 1]")]
    InvalidTheta { nest: NestId, theta: f64 },

    #[error("{nest} is its own ancestor")]
    NestCycle { nest: NestId },

    #[error("alternative {alternative} references {component}, which was never created")]
    UnknownComponent { alternative: usize, component: ComponentId },

    #[error("model `{model}` is not in estimation mode")]
    NotInEstimationMode { model: String },
}

pub type ChoiceResult<T> = Result<T, ChoiceError>;
