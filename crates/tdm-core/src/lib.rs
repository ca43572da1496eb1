//! `tdm-core` — foundational types for the travel-demand choice kernel.
//!
//! This crate is a dependency of every other `tdm-*` crate.  It has no
//! `tdm-*` dependencies and only a handful of external ones (`rand`,
//! `thiserror`, `log`, `serde`, `serde_json`).
//!
//! # What lives here
//!
//! | Module            | Contents                                                     |
//! |-------------------|--------------------------------------------------------------|
//! | [`ids`]           | `EntityId`, `CoefficientId`, `NestId`, `ComponentId`, `ParcelId`, `ZoneId`, `SegmentId` |
//! | [`rng`]           | `RandomStream` keyed by (seed, entity, decision offset)      |
//! | [`coefficients`]  | `Coefficient`, `CoefficientKind`, `CoefficientTable`         |
//! | [`config`]        | `KernelConfig`, `OddballConfig`, `ShadowPriceConfig`         |
//! | [`modes`]         | `Mode`, `PathType`, `Purpose`, `DestinationScale`            |
//! | [`impedance`]     | `ImpedanceLookup` trait, `SkimValue`                         |
//! | [`error`]         | `KernelError`, `KernelResult`                                |

pub mod coefficients;
pub mod config;
pub mod error;
pub mod ids;
pub mod impedance;
pub mod modes;
pub mod rng;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use coefficients::{Coefficient, CoefficientKind, CoefficientTable};
pub use config::{KernelConfig, OddballConfig, ShadowPriceConfig};
pub use error::{KernelError, KernelResult};
pub use ids::{CoefficientId, ComponentId, EntityId, NestId, ParcelId, SegmentId, ZoneId};
pub use impedance::{ImpedanceLookup, SkimValue};
pub use modes::{DestinationScale, Mode, PathType, Purpose};
pub use rng::RandomStream;

/// Smallest magnitude treated as non-zero by probability and size arithmetic.
pub const EPSILON: f64 = 1e-10;
