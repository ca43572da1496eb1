//! `RegionAdjustments` — injected per-region utility tweaks.
//!
//! A region that needs alternative-specific corrections (a calibration
//! constant on one mode, a penalty on a particular district) supplies a
//! strategy object at configuration time.  Models call
//! `calculator.apply_region_adjustments(ctx.adjustments())` once the choice set is
//! built; the kernel never branches on region names.
//!
//! Strategies compose: `a.then(b)` applies `a` and then `b`.

use tdm_core::CoefficientId;

use crate::{AlternativeMut, DomainChoice};

/// Read-only facts about the invocation being adjusted.
#[derive(Copy, Clone, Debug)]
pub struct AdjustmentContext<'a> {
    /// Title of the model's calculator.
    pub model: &'a str,
    /// Observation key (the deciding entity).
    pub key:   u64,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Hook applied to every alternative of a built choice set.
///
/// Implementations must be `Send + Sync`: one instance is shared by all
/// worker threads.
pub trait RegionAdjustments: Send + Sync {
    fn apply(&self, alternative: &mut AlternativeMut<'_>, ctx: &AdjustmentContext<'_>);
}

// ── No-op ─────────────────────────────────────────────────────────────────────

/// Leaves every alternative untouched.
pub struct NoAdjustments;

impl RegionAdjustments for NoAdjustments {
    #[inline]
    fn apply(&self, _alternative: &mut AlternativeMut<'_>, _ctx: &AdjustmentContext<'_>) {}
}

// ── Alternative-specific constants ────────────────────────────────────────────

/// Adds `coefficient × 1.0` to every alternative of `model` whose domain
/// choice matches.
pub struct DomainChoiceConstants {
    model:     String,
    constants: Vec<(DomainChoice, CoefficientId)>,
}

impl DomainChoiceConstants {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), constants: Vec::new() }
    }

    pub fn with_constant(mut self, choice: DomainChoice, coefficient: CoefficientId) -> Self {
        self.constants.push((choice, coefficient));
        self
    }
}

impl RegionAdjustments for DomainChoiceConstants {
    fn apply(&self, alternative: &mut AlternativeMut<'_>, ctx: &AdjustmentContext<'_>) {
        if ctx.model != self.model {
            return;
        }
        let Some(choice) = alternative.domain_choice() else {
            return;
        };
        for &(target, coefficient) in &self.constants {
            if target == choice {
                alternative.add_utility_term(coefficient, 1.0);
            }
        }
    }
}

// ── Chaining ──────────────────────────────────────────────────────────────────

/// Applies two strategies in sequence.  Build with `first.then(second)`.
pub struct ChainedAdjustments<A: RegionAdjustments, B: RegionAdjustments> {
    first:  A,
    second: B,
}

impl<A: RegionAdjustments, B: RegionAdjustments> RegionAdjustments for ChainedAdjustments<A, B> {
    fn apply(&self, alternative: &mut AlternativeMut<'_>, ctx: &AdjustmentContext<'_>) {
        self.first.apply(alternative, ctx);
        self.second.apply(alternative, ctx);
    }
}

/// Extension trait that adds `.then(other)` to any `RegionAdjustments`.
pub trait RegionAdjustmentsExt: RegionAdjustments + Sized {
    fn then<B: RegionAdjustments>(self, other: B) -> ChainedAdjustments<Self, B> {
        ChainedAdjustments { first: self, second: other }
    }
}

impl<R: RegionAdjustments + Sized> RegionAdjustmentsExt for R {}
