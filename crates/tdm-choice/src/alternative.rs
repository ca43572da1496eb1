//! Choice-set members.
//!
//! An [`Alternative`] lives in a slot owned by the calculator and is reused
//! across invocations; [`AlternativeMut`] is the short-lived builder handle
//! models receive from `get_alternative`.

use serde::Serialize;

use tdm_core::{CoefficientId, CoefficientTable, ComponentId, Mode, NestId, ParcelId};

use crate::nest::{self, Nest};
use crate::terms::{TermSums, UtilityTerm};

/// What an alternative stands for in the model's domain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainChoice {
    Mode { mode: Mode },
    Parcel { parcel: ParcelId },
    /// Discretized arrival and departure periods.
    TimePair { arrival_period: u16, departure_period: u16 },
    /// Anything else a model enumerates (tour counts, pattern ids, ...).
    Index { index: u32 },
}

#[derive(Clone, Debug, Default)]
pub struct Alternative {
    pub(crate) index:           usize,
    pub(crate) present:         bool,
    pub(crate) available:       bool,
    pub(crate) chosen:          bool,
    pub(crate) oddball:         bool,
    /// Nest declarations are ignored (oddball with nesting switched off).
    pub(crate) nest_locked:     bool,
    pub(crate) sums:            TermSums,
    pub(crate) components:      Vec<ComponentId>,
    pub(crate) size_components: Vec<ComponentId>,
    pub(crate) nest:            Option<NestId>,
    pub(crate) domain_choice:   Option<DomainChoice>,
    pub(crate) utility:         f64,
    pub(crate) probability:     f64,
}

impl Alternative {
    pub(crate) fn reset(&mut self, index: usize, available: bool, chosen: bool) {
        self.index = index;
        self.present = true;
        self.available = available;
        self.chosen = chosen;
        self.oddball = false;
        self.nest_locked = false;
        self.sums.clear();
        self.components.clear();
        self.size_components.clear();
        self.nest = None;
        self.domain_choice = None;
        self.utility = 0.0;
        self.probability = 0.0;
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Flagged as the observed choice (estimation mode).
    #[inline]
    pub fn is_chosen(&self) -> bool {
        self.chosen
    }

    #[inline]
    pub fn is_oddball(&self) -> bool {
        self.oddball
    }

    #[inline]
    pub fn nest(&self) -> Option<NestId> {
        self.nest
    }

    #[inline]
    pub fn domain_choice(&self) -> Option<DomainChoice> {
        self.domain_choice
    }

    /// Utility from the last evaluation, components and `ln(size)` included.
    /// Zero for unavailable alternatives.
    #[inline]
    pub fn utility(&self) -> f64 {
        self.utility
    }

    /// Probability from the last evaluation; zero when unavailable.
    #[inline]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Accumulated size from this alternative's own terms.
    #[inline]
    pub fn size(&self) -> f64 {
        self.sums.size
    }

    /// Terms recorded on this alternative (estimation mode).
    pub fn terms(&self) -> &[UtilityTerm] {
        &self.sums.recorded
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn size_components(&self) -> &[ComponentId] {
        &self.size_components
    }
}

/// Builder handle for one alternative.
pub struct AlternativeMut<'a> {
    pub(crate) alternative: &'a mut Alternative,
    pub(crate) nests:       &'a mut Vec<Nest>,
    pub(crate) table:       &'a CoefficientTable,
    pub(crate) record:      bool,
}

impl AlternativeMut<'_> {
    #[inline]
    pub fn index(&self) -> usize {
        self.alternative.index
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.alternative.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.alternative.available = available;
    }

    #[inline]
    pub fn is_chosen(&self) -> bool {
        self.alternative.chosen
    }

    /// Running utility of this alternative's own terms.
    #[inline]
    pub fn utility(&self) -> f64 {
        self.alternative.sums.utility
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.alternative.sums.size
    }

    #[inline]
    pub fn domain_choice(&self) -> Option<DomainChoice> {
        self.alternative.domain_choice
    }

    pub fn set_domain_choice(&mut self, choice: DomainChoice) {
        self.alternative.domain_choice = Some(choice);
    }

    /// Add `coefficient * value`.  Never fails: an unknown coefficient is
    /// skipped and a non-finite value is reported at evaluation.
    pub fn add_utility_term(&mut self, coefficient: CoefficientId, value: f64) {
        self.alternative.sums.add(self.table, coefficient, value, self.record);
    }

    /// Fold a shared component's utility in at evaluation time.  The
    /// component itself is never modified.
    pub fn add_utility_component(&mut self, component: ComponentId) {
        self.alternative.components.push(component);
    }

    pub fn add_size_component(&mut self, component: ComponentId) {
        self.alternative.size_components.push(component);
    }

    /// Place this alternative in `nest` with dissimilarity coefficient
    /// `theta`.  Repeating the same declaration changes nothing.
    ///
    /// Membership is recorded on the alternative, so there is no position
    /// within the nest to pass: a nest's children are whichever present
    /// alternatives name it, and declaration order does not affect the
    /// result.
    pub fn add_nested_alternative(&mut self, nest: NestId, theta: CoefficientId) {
        if self.alternative.nest_locked {
            return;
        }
        if nest::declare(self.nests, nest, Some(theta)) {
            self.alternative.nest = Some(nest);
        }
    }
}
