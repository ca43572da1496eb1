//! `tdm-sampling` — importance-sampled destination choice sets.
//!
//! Location models cannot enumerate every parcel in a region, so they ask a
//! [`DestinationSampler`] for a fixed number of weighted draws.  Each
//! distinct drawn parcel becomes one alternative on the model's
//! [`ChoiceProbabilityCalculator`][tdm_choice::ChoiceProbabilityCalculator],
//! carrying an adjustment factor that makes the sampled logit consistent
//! with full enumeration.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                           |
//! |--------------|--------------------------------------------------------------------|
//! | [`segment`]  | `SegmentZone`, `Segment`, `SamplingUniverse` and its builder       |
//! | [`sampler`]  | `DestinationSampler`, `SampleItem`, `SamplingUtilities`            |
//! | [`error`]    | `SamplingError`, `SamplingResult<T>`                               |
//!
//! # Feature flags
//!
//! | Feature   | Effect                                              |
//! |-----------|-----------------------------------------------------|
//! | `fx-hash` | `ParcelMap` uses `rustc_hash::FxHashMap`            |

pub mod error;
pub mod sampler;
pub mod segment;

#[cfg(test)]
mod tests;

pub use error::{SamplingError, SamplingResult};
pub use sampler::{DestinationSampler, DrawProbability, SampleItem, SampleKind, SamplingUtilities};
pub use segment::{
    size_from_factors, ParcelLocation, ParcelMap, ParcelSize, SamplingUniverse, SamplingUniverseBuilder, Segment,
    SegmentSpec, SegmentZone, WeightSkim,
};
