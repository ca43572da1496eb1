//! `ChoiceProbabilityCalculator`: one reusable choice set per model.
//!
//! # Evaluation
//!
//! For every available alternative `a`:
//!
//! ```text
//! V_a = own terms + Σ utility components + ln(size_a) · size_function_multiplier
//! ```
//!
//! (the `ln(size)` term only when `size_a ≥ ε`).  Nests are then folded
//! bottom-up.  For nest `n` with dissimilarity `θ_n` and children `c`
//! (alternatives contribute `V_c`, child nests contribute `S_c`):
//!
//! ```text
//! S_n       = ln Σ_c exp(θ_n · U_c)        (log-sum-exp, empty children omitted)
//! logsum_n  = S_n / θ_n
//! P(c | n)  = exp(θ_n · U_c − S_n)
//! ```
//!
//! The root behaves as a nest with `θ = 1`; its `S` is the logsum returned
//! by [`compute_logsum`][ChoiceProbabilityCalculator::compute_logsum].
//! Every exponent is formed relative to the running maximum, so no utility
//! magnitude overflows; there is no clamp inside the engine.

use std::sync::Arc;

use tdm_core::{
    CoefficientId, CoefficientTable, ComponentId, KernelConfig, NestId, OddballConfig, RandomStream, EPSILON,
};

use crate::alternative::{Alternative, AlternativeMut};
use crate::component::{self, Component, ComponentMut};
use crate::estimation::{
    EstimationSummary, ObservationOutcome, ObservationRecord, ObservedAlternative, ObservedTally,
    RejectionReason,
};
use crate::nest::{self, Nest, NestMut};
use crate::region::{AdjustmentContext, RegionAdjustments};
use crate::{ChoiceError, ChoiceResult, UtilityTerm};

// ── Log-sum-exp accumulator ───────────────────────────────────────────────────

/// Streaming `ln Σ exp(x)`, rescaled whenever a new maximum arrives.
#[derive(Copy, Clone, Debug)]
struct LogSumExp {
    max: f64,
    sum: f64,
}

impl Default for LogSumExp {
    fn default() -> Self {
        Self { max: f64::NEG_INFINITY, sum: 0.0 }
    }
}

impl LogSumExp {
    #[inline]
    fn push(&mut self, x: f64) {
        if x > self.max {
            self.sum = self.sum * (self.max - x).exp() + 1.0;
            self.max = x;
        } else {
            self.sum += (x - self.max).exp();
        }
    }

    /// `None` when nothing was pushed.
    #[inline]
    fn value(self) -> Option<f64> {
        (self.sum > 0.0).then(|| self.max + self.sum.ln())
    }
}

// ── Calculator ────────────────────────────────────────────────────────────────

pub struct ChoiceProbabilityCalculator {
    title:              String,
    coefficients:       Arc<CoefficientTable>,
    estimation:         bool,
    test_estimation:    bool,
    oddball:            OddballConfig,
    key:                u64,
    alternatives:       Vec<Alternative>,
    nests:              Vec<Nest>,
    utility_components: Vec<Component>,
    size_components:    Vec<Component>,
    logsum:             Option<f64>,
    theta_warned:       bool,
    summary:            EstimationSummary,
    tally:              ObservedTally,
}

impl ChoiceProbabilityCalculator {
    pub fn new(title: impl Into<String>, coefficients: Arc<CoefficientTable>, config: &KernelConfig) -> Self {
        let title = title.into();
        Self {
            summary:            EstimationSummary::new(title.clone()),
            title,
            coefficients,
            estimation:         config.is_in_estimation_mode,
            test_estimation:    config.test_estimation_in_application_mode,
            oddball:            config.oddball.clone(),
            key:                0,
            alternatives:       Vec::new(),
            nests:              Vec::new(),
            utility_components: Vec::new(),
            size_components:    Vec::new(),
            logsum:             None,
            theta_warned:       false,
            tally:              ObservedTally::default(),
        }
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn coefficients(&self) -> &CoefficientTable {
        &self.coefficients
    }

    #[inline]
    pub fn is_in_estimation_mode(&self) -> bool {
        self.estimation
    }

    /// Key of the current observation (usually the deciding entity's id).
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn summary(&self) -> &EstimationSummary {
        &self.summary
    }

    pub fn tally(&self) -> &ObservedTally {
        &self.tally
    }

    /// Root logsum from the last evaluation, if nothing changed since.
    #[inline]
    pub fn last_logsum(&self) -> Option<f64> {
        self.logsum
    }

    /// Drop every alternative, nest and component from the previous
    /// invocation.  Slot allocations are kept.
    pub fn reset(&mut self) {
        self.alternatives.iter_mut().for_each(|a| a.present = false);
        self.nests.iter_mut().for_each(|n| n.present = false);
        self.utility_components.iter_mut().for_each(|c| c.present = false);
        self.size_components.iter_mut().for_each(|c| c.present = false);
        self.logsum = None;
    }

    pub fn start_observation(&mut self, key: u64) {
        self.key = key;
    }

    // ── Building ──────────────────────────────────────────────────────────

    fn handle(&mut self, index: usize) -> AlternativeMut<'_> {
        AlternativeMut {
            alternative: &mut self.alternatives[index],
            nests:       &mut self.nests,
            table:       &self.coefficients,
            record:      self.estimation,
        }
    }

    /// Slot `index`, reset for this invocation.
    pub fn get_alternative(&mut self, index: usize, available: bool, is_chosen: bool) -> AlternativeMut<'_> {
        if self.alternatives.len() <= index {
            self.alternatives.resize_with(index + 1, Alternative::default);
        }
        self.alternatives[index].reset(index, available, is_chosen);
        self.logsum = None;
        self.handle(index)
    }

    /// Like [`get_alternative`][Self::get_alternative] for the stay-home /
    /// no-location alternative, applying the oddball toggles: in estimation
    /// mode it can be forced unavailable and un-nested, and with
    /// `oddball.nested` off it never joins a nest.
    pub fn get_oddball_alternative(&mut self, index: usize, available: bool, is_chosen: bool) -> AlternativeMut<'_> {
        let excluded = self.estimation && self.oddball.unavailable_in_estimation;
        let locked = excluded || !self.oddball.nested;
        let handle = self.get_alternative(index, available && !excluded, is_chosen);
        handle.alternative.oddball = true;
        handle.alternative.nest_locked = locked;
        handle
    }

    /// Reopen an alternative built earlier in this invocation.
    pub fn alternative_mut(&mut self, index: usize) -> Option<AlternativeMut<'_>> {
        if !self.alternatives.get(index).is_some_and(|a| a.present) {
            return None;
        }
        self.logsum = None;
        Some(self.handle(index))
    }

    pub fn alternative(&self, index: usize) -> Option<&Alternative> {
        self.alternatives.get(index).filter(|a| a.present)
    }

    /// Alternatives built in this invocation, in index order.
    pub fn alternatives(&self) -> impl Iterator<Item = &Alternative> {
        self.alternatives.iter().filter(|a| a.present)
    }

    pub fn create_utility_component(&mut self, id: ComponentId) -> ComponentMut<'_> {
        self.logsum = None;
        ComponentMut {
            component: component::create(&mut self.utility_components, id),
            table:     &self.coefficients,
            record:    self.estimation,
        }
    }

    pub fn get_utility_component(&self, id: ComponentId) -> Option<&Component> {
        component::lookup(&self.utility_components, id)
    }

    pub fn create_size_component(&mut self, id: ComponentId) -> ComponentMut<'_> {
        self.logsum = None;
        ComponentMut {
            component: component::create(&mut self.size_components, id),
            table:     &self.coefficients,
            record:    self.estimation,
        }
    }

    pub fn get_size_component(&self, id: ComponentId) -> Option<&Component> {
        component::lookup(&self.size_components, id)
    }

    /// Handle for nesting `id` inside a parent nest.  Creates the nest when
    /// no alternative has declared it yet.
    pub fn nest_mut(&mut self, id: NestId) -> Option<NestMut<'_>> {
        if !nest::declare(&mut self.nests, id, None) {
            return None;
        }
        self.logsum = None;
        Some(NestMut { nests: &mut self.nests, id })
    }

    pub fn nest(&self, id: NestId) -> Option<&Nest> {
        self.nests.get(id.index()).filter(|n| n.present)
    }

    /// Run region-specific tweaks over every alternative built so far.
    pub fn apply_region_adjustments(&mut self, adjustments: &dyn RegionAdjustments) {
        let title = self.title.clone();
        let key = self.key;
        for index in 0..self.alternatives.len() {
            if !self.alternatives[index].present {
                continue;
            }
            let ctx = AdjustmentContext { model: &title, key };
            adjustments.apply(&mut self.handle(index), &ctx);
        }
        self.logsum = None;
    }

    // ── Evaluation ────────────────────────────────────────────────────────

    /// Root logsum of the current choice set; `0.0` when nothing is
    /// available.  Leaves every alternative's probability populated.
    pub fn compute_logsum(&mut self) -> ChoiceResult<f64> {
        Ok(self.evaluate()?.unwrap_or(0.0))
    }

    /// Draw one alternative.
    ///
    /// A single uniform is drawn (even when nothing is available, so the
    /// stream position never depends on the choice set) and probabilities
    /// are subtracted in index order; the last available alternative
    /// absorbs rounding.  `Ok(None)` means no alternative was available.
    pub fn simulate_choice(&mut self, stream: &mut RandomStream) -> ChoiceResult<Option<&Alternative>> {
        let chosen = self.draw(stream)?;
        Ok(chosen.map(|index| &self.alternatives[index]))
    }

    /// [`simulate_choice`][Self::simulate_choice] that also tallies the
    /// draw against the `observed` alternative when
    /// `test_estimation_in_application_mode` is on.
    pub fn simulate_choice_with_observed(
        &mut self,
        stream:   &mut RandomStream,
        observed: usize,
    ) -> ChoiceResult<Option<&Alternative>> {
        let chosen = self.draw(stream)?;
        if let Some(chosen) = chosen {
            if self.test_estimation {
                self.tally_observed(chosen, observed);
            }
        }
        Ok(chosen.map(|index| &self.alternatives[index]))
    }

    fn draw(&mut self, stream: &mut RandomStream) -> ChoiceResult<Option<usize>> {
        self.evaluate()?;
        let mut random = stream.uniform01();
        let mut chosen = None;
        for alternative in self.alternatives.iter().filter(|a| a.present && a.available) {
            chosen = Some(alternative.index);
            random -= alternative.probability;
            if random < 0.0 {
                break;
            }
        }
        if chosen.is_none() {
            log::debug!("{}: no available alternative for key {}", self.title, self.key);
        }
        Ok(chosen)
    }

    /// `observed` outside the current choice set (including a `usize::MAX`
    /// "not observed" marker) is not tallied.
    fn tally_observed(&mut self, chosen: usize, observed: usize) {
        if !self.alternatives.get(observed).is_some_and(|a| a.present) {
            log::debug!("{}: observed alternative {observed} is not in the choice set for key {}", self.title, self.key);
            return;
        }
        let mut observed_available = false;
        let mut other_available = false;
        for alternative in self.alternatives.iter().filter(|a| a.present) {
            if alternative.index == observed {
                observed_available = alternative.available;
            } else if alternative.available {
                other_available = true;
            }
        }

        if !observed_available {
            self.tally.counts_mut(observed).chosen_not_available += 1;
            return;
        }
        if !other_available {
            self.tally.counts_mut(observed).chosen_only_available += 1;
            return;
        }
        self.tally.counts_mut(observed).chosen_and_available += 1;
        self.tally.counts_mut(chosen).predicted += 1;

        for index in 0..self.alternatives.len() {
            let alternative = &self.alternatives[index];
            if alternative.present && alternative.available {
                let probability = alternative.probability;
                let counts = self.tally.counts_mut(index);
                counts.available += 1;
                counts.total_probability += probability;
            }
        }
    }

    /// Full evaluation.  Returns the root `S`, or `None` when nothing is
    /// available.
    fn evaluate(&mut self) -> ChoiceResult<Option<f64>> {
        self.resolve_nests()?;
        self.evaluate_utilities()?;

        let max_depth = self.nests.iter().filter(|n| n.present).map(|n| n.depth).max();
        if let Some(max_depth) = max_depth {
            for depth in (0..=max_depth).rev() {
                self.fold_nests_at(depth);
            }
        }

        let mut root = LogSumExp::default();
        for alternative in self.alternatives.iter().filter(|a| a.present && a.available && a.nest.is_none()) {
            root.push(alternative.utility);
        }
        for nest in self.nests.iter().filter(|n| n.present && n.parent.is_none()) {
            if let Some(s) = nest.scaled_logsum {
                root.push(s);
            }
        }
        let Some(root_sum) = root.value() else {
            self.logsum = Some(0.0);
            return Ok(None);
        };

        self.assign_probabilities(root_sum, max_depth);
        self.logsum = Some(root_sum);
        Ok(Some(root_sum))
    }

    fn resolve_nests(&mut self) -> ChoiceResult<()> {
        let count = self.nests.len();
        for i in 0..count {
            if !self.nests[i].present {
                continue;
            }
            let id = self.nests[i].id;

            let mut depth = 0;
            let mut cursor = self.nests[i].parent;
            while let Some(parent) = cursor {
                depth += 1;
                if depth > count {
                    return Err(ChoiceError::NestCycle { nest: id });
                }
                cursor = self.nests.get(parent.index()).and_then(|n| n.parent);
            }

            let theta = match self.nests[i].theta_coefficient.and_then(|c| self.coefficients.get(c)) {
                Some(coefficient) => coefficient.value,
                None => {
                    if !self.theta_warned {
                        log::warn!("{}: {id} has no theta coefficient; using 1.0", self.title);
                        self.theta_warned = true;
                    }
                    1.0
                }
            };
            if theta.is_nan() || theta <= 0.0 || theta > 1.0 {
                return Err(ChoiceError::InvalidTheta { nest: id, theta });
            }

            let nest = &mut self.nests[i];
            nest.theta = theta;
            nest.depth = depth;
            nest.scaled_logsum = None;
            nest.probability = 0.0;
        }
        Ok(())
    }

    fn evaluate_utilities(&mut self) -> ChoiceResult<()> {
        let multiplier = self.coefficients.size_function_multiplier();
        for alternative in self.alternatives.iter_mut().filter(|a| a.present) {
            alternative.utility = 0.0;
            alternative.probability = 0.0;
            if alternative.available {
                alternative.utility =
                    evaluated_utility(alternative, &self.utility_components, &self.size_components, multiplier)?;
            }
        }
        Ok(())
    }

    fn fold_nests_at(&mut self, depth: usize) {
        for i in 0..self.nests.len() {
            let nest = &self.nests[i];
            if !nest.present || nest.depth != depth {
                continue;
            }
            let (id, theta) = (nest.id, nest.theta);

            let mut acc = LogSumExp::default();
            for alternative in self.alternatives.iter().filter(|a| a.present && a.available && a.nest == Some(id)) {
                acc.push(theta * alternative.utility);
            }
            for child in self.nests.iter().filter(|n| n.present && n.parent == Some(id)) {
                if let Some(s) = child.scaled_logsum {
                    acc.push(theta * s);
                }
            }
            self.nests[i].scaled_logsum = acc.value();
        }
    }

    fn assign_probabilities(&mut self, root_sum: f64, max_depth: Option<usize>) {
        if let Some(max_depth) = max_depth {
            for depth in 0..=max_depth {
                for i in 0..self.nests.len() {
                    let nest = &self.nests[i];
                    if !nest.present || nest.depth != depth {
                        continue;
                    }
                    let probability = match (nest.scaled_logsum, nest.parent) {
                        (None, _) => 0.0,
                        (Some(s), None) => (s - root_sum).exp(),
                        (Some(s), Some(parent)) => {
                            let parent = &self.nests[parent.index()];
                            match parent.scaled_logsum {
                                Some(parent_sum) => (parent.theta * s - parent_sum).exp() * parent.probability,
                                None => 0.0,
                            }
                        }
                    };
                    self.nests[i].probability = probability;
                }
            }
        }

        let nests = &self.nests;
        for alternative in self.alternatives.iter_mut().filter(|a| a.present && a.available) {
            alternative.probability = match alternative.nest {
                None => (alternative.utility - root_sum).exp(),
                Some(id) => {
                    let nest = &nests[id.index()];
                    match nest.scaled_logsum {
                        Some(s) => (nest.theta * alternative.utility - s).exp() * nest.probability,
                        None => 0.0,
                    }
                }
            };
        }
    }

    // ── Estimation ────────────────────────────────────────────────────────

    /// Record the current choice set as an observation.
    ///
    /// Rejected observations are counted and logged, never fatal.
    pub fn write_observation(&mut self) -> ChoiceResult<ObservationOutcome> {
        if !self.estimation {
            return Err(ChoiceError::NotInEstimationMode { model: self.title.clone() });
        }
        if let Err(reason) = self.validate_observation() {
            return self.exclude_observation(reason);
        }

        let logsum = self.evaluate()?.unwrap_or(0.0);
        let uses_size = self.alternatives().any(|a| self.has_size_terms(a));

        let mut chosen = 0;
        let mut alternatives = Vec::new();
        for alternative in self.alternatives() {
            if alternative.chosen {
                chosen = alternative.index;
            }
            alternatives.push(ObservedAlternative {
                index:                alternative.index,
                available:            alternative.available,
                available_in_summary: alternative.available
                    && (!uses_size || self.has_non_zero_size_term(alternative)),
                chosen:               alternative.chosen,
                domain_choice:        alternative.domain_choice,
                utility:              alternative.utility,
                probability:          alternative.probability,
                terms:                self.all_terms(alternative),
            });
        }

        let record = ObservationRecord {
            model: self.title.clone(),
            key: self.key,
            chosen,
            logsum,
            alternatives,
        };
        self.summary.record(&record);
        Ok(ObservationOutcome::Accepted(record))
    }

    /// Skip the current observation for a record-level reason found by the
    /// model (bad parcel or zone references, origin equal to destination).
    /// Counted as rejected like a failed [`write_observation`][Self::write_observation].
    pub fn exclude_observation(&mut self, reason: RejectionReason) -> ChoiceResult<ObservationOutcome> {
        if !self.estimation {
            return Err(ChoiceError::NotInEstimationMode { model: self.title.clone() });
        }
        self.summary.rejected += 1;
        log::warn!("{}: observation {} rejected: {reason}", self.title, self.key);
        Ok(ObservationOutcome::Rejected(reason))
    }

    fn validate_observation(&self) -> Result<(), RejectionReason> {
        let mut chosen = self.alternatives().filter(|a| a.chosen);
        let Some(first) = chosen.next() else {
            return Err(RejectionReason::NoChosenAlternative);
        };
        let extra = chosen.count();
        if extra > 0 {
            return Err(RejectionReason::MultipleChosen(extra + 1));
        }
        if self.has_size_terms(first) && !self.has_non_zero_size_term(first) {
            return Err(RejectionReason::ZeroSizeChosen);
        }
        Ok(())
    }

    fn referenced_size_components<'a>(&'a self, alternative: &'a Alternative) -> impl Iterator<Item = &'a Component> + 'a {
        alternative
            .size_components
            .iter()
            .filter_map(|&id| component::lookup(&self.size_components, id))
    }

    fn has_size_terms(&self, alternative: &Alternative) -> bool {
        alternative.sums.has_size_terms()
            || self.referenced_size_components(alternative).any(|c| !c.sums.recorded.is_empty())
    }

    fn has_non_zero_size_term(&self, alternative: &Alternative) -> bool {
        alternative.sums.has_non_zero_size_term()
            || self
                .referenced_size_components(alternative)
                .any(|c| c.sums.recorded.iter().any(|t| t.value.abs() >= EPSILON))
    }

    fn all_terms(&self, alternative: &Alternative) -> Vec<UtilityTerm> {
        let mut terms = alternative.sums.recorded.clone();
        for &id in &alternative.components {
            if let Some(component) = component::lookup(&self.utility_components, id) {
                terms.extend_from_slice(&component.sums.recorded);
            }
        }
        for component in self.referenced_size_components(alternative) {
            terms.extend_from_slice(&component.sums.recorded);
        }
        terms
    }
}

fn evaluated_utility(
    alternative:        &Alternative,
    utility_components: &[Component],
    size_components:    &[Component],
    multiplier:         f64,
) -> ChoiceResult<f64> {
    let index = alternative.index;
    let non_finite = |(coefficient, value): (CoefficientId, f64)| ChoiceError::NonFiniteUtility { alternative: index, coefficient, value };

    if let Some(bad) = alternative.sums.non_finite {
        return Err(non_finite(bad));
    }

    let mut utility = alternative.sums.utility;
    let mut size = alternative.sums.size;

    for &id in &alternative.components {
        let component = component::lookup(utility_components, id)
            .ok_or(ChoiceError::UnknownComponent { alternative: index, component: id })?;
        if let Some(bad) = component.sums.non_finite {
            return Err(non_finite(bad));
        }
        utility += component.sums.utility;
    }
    for &id in &alternative.size_components {
        let component = component::lookup(size_components, id)
            .ok_or(ChoiceError::UnknownComponent { alternative: index, component: id })?;
        if let Some(bad) = component.sums.non_finite {
            return Err(non_finite(bad));
        }
        size += component.sums.size;
    }

    if size >= EPSILON {
        utility += size.ln() * multiplier;
    }
    if !utility.is_finite() {
        return Err(ChoiceError::UtilityOverflow { alternative: index, utility });
    }
    Ok(utility)
}
