//! `tdm-choice` — the utility-accumulation and nested-logit engine.
//!
//! Every model in the kernel builds its choice set through one
//! [`ChoiceProbabilityCalculator`]: it asks for alternatives by index, adds
//! weighted utility terms (directly or through shared components), declares
//! nests, and then either computes a logsum or simulates a choice.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                        |
//! |-----------------|-----------------------------------------------------------------|
//! | [`calculator`]  | `ChoiceProbabilityCalculator`: building, evaluation, draws      |
//! | [`alternative`] | `Alternative`, `AlternativeMut`, `DomainChoice`                 |
//! | [`component`]   | `Component`, `ComponentMut` (shared sub-expressions)            |
//! | [`nest`]        | `Nest`, `NestMut`                                               |
//! | [`terms`]       | `UtilityTerm`                                                   |
//! | [`estimation`]  | observation records, `EstimationSummary`, `ObservedTally`       |
//! | [`region`]      | `RegionAdjustments` strategy, `NoAdjustments`, chaining         |
//! | [`error`]       | `ChoiceError`, `ChoiceResult<T>`                                |
//!
//! # Invocation lifecycle
//!
//! ```text
//! reset → start_observation(key)
//!       → get_alternative / create_*_component / add_* ...
//!       → compute_logsum | simulate_choice | write_observation
//! ```
//!
//! Building never fails.  Bad inputs (non-finite term values, unknown
//! components, θ outside `(0, 1]`) surface as [`ChoiceError`] from the
//! evaluating call.  "Nothing available" is not an error: the logsum is
//! `0.0` and `simulate_choice` returns `Ok(None)`.

pub mod alternative;
pub mod calculator;
pub mod component;
pub mod error;
pub mod estimation;
pub mod nest;
pub mod region;
pub mod terms;

#[cfg(test)]
mod tests;

pub use alternative::{Alternative, AlternativeMut, DomainChoice};
pub use calculator::ChoiceProbabilityCalculator;
pub use component::{Component, ComponentMut};
pub use error::{ChoiceError, ChoiceResult};
pub use estimation::{
    AlternativeTally, CoefficientTally, EstimationSummary, ObservationOutcome, ObservationRecord,
    ObservedAlternative, ObservedCounts, ObservedTally, RejectionReason,
};
pub use nest::{Nest, NestMut};
pub use region::{
    AdjustmentContext, ChainedAdjustments, DomainChoiceConstants, NoAdjustments, RegionAdjustments,
    RegionAdjustmentsExt,
};
pub use terms::UtilityTerm;
