//! Estimation-mode observation records and run-level tallies.
//!
//! In estimation mode a calculator does not simulate: for each observed
//! decision the model flags the chosen alternative, builds the full choice
//! set, and calls `write_observation`.  The returned [`ObservationRecord`]
//! is handed to an external writer; the calculator keeps an
//! [`EstimationSummary`] of everything it accepted.
//!
//! | Tally                  | Updated by                       |
//! |------------------------|----------------------------------|
//! | [`EstimationSummary`]  | `write_observation`              |
//! | [`ObservedTally`]      | `simulate_choice_with_observed`  |

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use tdm_core::{CoefficientId, EPSILON};

use crate::{DomainChoice, UtilityTerm};

// ── Observation records ───────────────────────────────────────────────────────

/// One candidate as seen by the estimation writer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservedAlternative {
    pub index:                usize,
    pub available:            bool,
    /// Available and, when the choice set uses size terms, carrying at least
    /// one non-zero size term.
    pub available_in_summary: bool,
    pub chosen:               bool,
    pub domain_choice:        Option<DomainChoice>,
    pub utility:              f64,
    pub probability:          f64,
    /// Own terms followed by the terms of every referenced component.
    pub terms:                Vec<UtilityTerm>,
}

/// A complete accepted observation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationRecord {
    pub model:        String,
    pub key:          u64,
    pub chosen:       usize,
    pub logsum:       f64,
    pub alternatives: Vec<ObservedAlternative>,
}

impl ObservationRecord {
    pub fn chosen_alternative(&self) -> Option<&ObservedAlternative> {
        self.alternatives.iter().find(|a| a.index == self.chosen)
    }
}

/// Why an observation was not written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RejectionReason {
    NoChosenAlternative,
    MultipleChosen(usize),
    /// The chosen alternative has size terms but all of them are zero.
    ZeroSizeChosen,
    /// A parcel the record refers to is missing or unknown.
    MissingParcel,
    /// The observed destination is the origin itself.
    SameOriginAndDestination,
    /// A zone the record refers to is outside the zone system.
    ZoneOutOfRange,
}

impl RejectionReason {
    /// Numeric exclusion tag carried into output files.
    pub fn code(self) -> u8 {
        match self {
            RejectionReason::NoChosenAlternative      => 1,
            RejectionReason::MultipleChosen(_)        => 2,
            RejectionReason::ZeroSizeChosen           => 3,
            RejectionReason::MissingParcel            => 4,
            RejectionReason::SameOriginAndDestination => 5,
            RejectionReason::ZoneOutOfRange           => 6,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoChosenAlternative      => write!(f, "no alternative flagged as chosen"),
            RejectionReason::MultipleChosen(n)        => write!(f, "{n} alternatives flagged as chosen"),
            RejectionReason::ZeroSizeChosen           => write!(f, "chosen alternative has zero size"),
            RejectionReason::MissingParcel            => write!(f, "missing or unknown parcel"),
            RejectionReason::SameOriginAndDestination => write!(f, "origin and destination are the same parcel"),
            RejectionReason::ZoneOutOfRange           => write!(f, "zone out of range"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObservationOutcome {
    Accepted(ObservationRecord),
    Rejected(RejectionReason),
}

impl ObservationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ObservationOutcome::Accepted(_))
    }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AlternativeTally {
    pub chosen:    u64,
    pub available: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CoefficientTally {
    pub total:    f64,
    pub non_zero: u64,
}

/// Accepted/rejected counts plus per-alternative and per-coefficient totals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EstimationSummary {
    pub model:        String,
    pub accepted:     u64,
    pub rejected:     u64,
    pub alternatives: Vec<AlternativeTally>,
    pub coefficients: BTreeMap<CoefficientId, CoefficientTally>,
}

impl EstimationSummary {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), ..Self::default() }
    }

    pub(crate) fn record(&mut self, record: &ObservationRecord) {
        self.accepted += 1;
        for alternative in &record.alternatives {
            let tally = self.alternative_mut(alternative.index);
            tally.chosen += u64::from(alternative.chosen);
            tally.available += u64::from(alternative.available_in_summary);

            for term in &alternative.terms {
                let tally = self.coefficients.entry(term.coefficient).or_default();
                tally.total += term.value;
                if term.value.abs() >= EPSILON {
                    tally.non_zero += 1;
                }
            }
        }
    }

    fn alternative_mut(&mut self, index: usize) -> &mut AlternativeTally {
        if self.alternatives.len() <= index {
            self.alternatives.resize(index + 1, AlternativeTally::default());
        }
        &mut self.alternatives[index]
    }

    /// Fold another worker's summary for the same model into this one.
    pub fn merge(&mut self, other: &EstimationSummary) {
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        for (index, tally) in other.alternatives.iter().enumerate() {
            let mine = self.alternative_mut(index);
            mine.chosen += tally.chosen;
            mine.available += tally.available;
        }
        for (id, tally) in &other.coefficients {
            let mine = self.coefficients.entry(*id).or_default();
            mine.total += tally.total;
            mine.non_zero += tally.non_zero;
        }
    }
}

/// Observed-vs-predicted counts for one alternative.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ObservedCounts {
    /// Observed choice was the only available alternative.
    pub chosen_only_available: u64,
    /// Observed choice was unavailable.
    pub chosen_not_available:  u64,
    /// Observed choice was available alongside others.
    pub chosen_and_available:  u64,
    /// Drawn by the simulation on a valid observation.
    pub predicted:             u64,
    /// Available on a valid observation.
    pub available:             u64,
    pub total_probability:     f64,
}

/// Per-alternative observed-vs-predicted tallies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservedTally {
    pub alternatives: Vec<ObservedCounts>,
}

impl ObservedTally {
    pub(crate) fn counts_mut(&mut self, index: usize) -> &mut ObservedCounts {
        if self.alternatives.len() <= index {
            self.alternatives.resize(index + 1, ObservedCounts::default());
        }
        &mut self.alternatives[index]
    }

    pub fn merge(&mut self, other: &ObservedTally) {
        for (index, counts) in other.alternatives.iter().enumerate() {
            let mine = self.counts_mut(index);
            mine.chosen_only_available += counts.chosen_only_available;
            mine.chosen_not_available += counts.chosen_not_available;
            mine.chosen_and_available += counts.chosen_and_available;
            mine.predicted += counts.predicted;
            mine.available += counts.available;
            mine.total_probability += counts.total_probability;
        }
    }
}
