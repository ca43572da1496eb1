//! Plain data row types written by output backends, and their conversions
//! from run records.

use serde::Serialize;

use tdm_choice::{DomainChoice, EstimationSummary, ObservationRecord};
use tdm_core::EntityId;
use tdm_sim::{HouseholdOutcome, PersonDay};

/// One alternative of an accepted observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub model:         String,
    pub key:           u64,
    pub alternative:   usize,
    pub available:     bool,
    pub chosen:        bool,
    /// `kind:value` label of the alternative, empty when none was set.
    pub domain_choice: String,
    pub utility:       f64,
    pub probability:   f64,
    /// Logsum of the whole choice set, repeated on every row.
    pub logsum:        f64,
}

/// One utility term of one alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermRow {
    pub model:       String,
    pub key:         u64,
    pub alternative: usize,
    pub coefficient: u16,
    pub value:       f64,
    pub is_size:     bool,
}

/// One person-day, or one abandoned household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonDayRow {
    pub household:      u32,
    /// `u32::MAX` on the row of an abandoned household.
    pub person:         u32,
    pub tours:          u32,
    pub stops:          u32,
    pub choices:        usize,
    /// `0` for a valid day, otherwise the invalid-day code.
    pub invalid_code:   u8,
    pub invalid_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub model:       String,
    pub accepted:    u64,
    pub rejected:    u64,
    pub alternative: usize,
    pub chosen:      u64,
    pub available:   u64,
}

// ── Conversions ───────────────────────────────────────────────────────────────

pub fn domain_label(choice: Option<DomainChoice>) -> String {
    match choice {
        None => String::new(),
        Some(DomainChoice::Mode { mode }) => format!("mode:{mode:?}"),
        Some(DomainChoice::Parcel { parcel }) => format!("parcel:{}", parcel.0),
        Some(DomainChoice::TimePair { arrival_period, departure_period }) => {
            format!("time:{arrival_period}-{departure_period}")
        }
        Some(DomainChoice::Index { index }) => format!("index:{index}"),
    }
}

impl ObservationRow {
    pub fn from_record(record: &ObservationRecord) -> Vec<ObservationRow> {
        record
            .alternatives
            .iter()
            .map(|alternative| ObservationRow {
                model:         record.model.clone(),
                key:           record.key,
                alternative:   alternative.index,
                available:     alternative.available,
                chosen:        alternative.chosen,
                domain_choice: domain_label(alternative.domain_choice),
                utility:       alternative.utility,
                probability:   alternative.probability,
                logsum:        record.logsum,
            })
            .collect()
    }
}

impl TermRow {
    pub fn from_record(record: &ObservationRecord) -> Vec<TermRow> {
        record
            .alternatives
            .iter()
            .flat_map(|alternative| {
                alternative.terms.iter().map(move |term| TermRow {
                    model:       record.model.clone(),
                    key:         record.key,
                    alternative: alternative.index,
                    coefficient: term.coefficient.0,
                    value:       term.value,
                    is_size:     term.is_size,
                })
            })
            .collect()
    }
}

impl PersonDayRow {
    pub fn from_day(day: &PersonDay) -> Self {
        Self {
            household:      day.household.0,
            person:         day.person.0,
            tours:          day.pattern.total_tours(),
            stops:          day.pattern.total_stops(),
            choices:        day.choices.len(),
            invalid_code:   day.invalid.as_ref().map_or(0, |r| r.code()),
            invalid_reason: day.invalid.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }

    /// Person-day rows for a household; a single marker row when the
    /// household was abandoned.
    pub fn from_outcome(outcome: &HouseholdOutcome) -> Vec<PersonDayRow> {
        match &outcome.failure {
            Some(reason) => vec![PersonDayRow {
                household:      outcome.household.0,
                person:         EntityId::INVALID.0,
                tours:          0,
                stops:          0,
                choices:        0,
                invalid_code:   reason.code(),
                invalid_reason: reason.to_string(),
            }],
            None => outcome.person_days.iter().map(PersonDayRow::from_day).collect(),
        }
    }
}

impl SummaryRow {
    pub fn from_summary(summary: &EstimationSummary) -> Vec<SummaryRow> {
        summary
            .alternatives
            .iter()
            .enumerate()
            .map(|(alternative, tally)| SummaryRow {
                model: summary.model.clone(),
                accepted: summary.accepted,
                rejected: summary.rejected,
                alternative,
                chosen: tally.chosen,
                available: tally.available,
            })
            .collect()
    }
}
