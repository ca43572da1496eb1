//! The seam between the kernel and the travel models, and the records a
//! household run produces.

use std::fmt;

use tdm_choice::{ChoiceProbabilityCalculator, DomainChoice, ObservationOutcome, ObservationRecord, RejectionReason};
use tdm_core::{EntityId, ParcelId, RandomStream};
use tdm_sampling::{SamplingError, SamplingResult};
use tdm_schedule::DayPattern;

use crate::{SimError, SimResult, SimulationContext, WorkerSlot};

/// Runs every decision of one household.
///
/// Implementations hold no per-household state: everything mutable lives in
/// the [`WorkerSlot`] (calculators) or in locals of the call (time windows,
/// person-day records).  Randomness must come from
/// [`SimulationContext::stream`] so results do not depend on which slot runs
/// the household.
pub trait HouseholdModel: Send + Sync {
    type Household: Send + Sync;

    fn household_id(&self, household: &Self::Household) -> EntityId;

    /// Simulate (or, in estimation mode, observe) the household.
    ///
    /// An `Err` abandons only this household; the runner records it as
    /// failed and moves on.
    fn simulate_household(
        &self,
        household: &Self::Household,
        ctx:       &SimulationContext,
        slot:      &mut WorkerSlot,
    ) -> SimResult<HouseholdOutcome>;
}

// ── Invalid days ──────────────────────────────────────────────────────────────

/// Why a person-day (or a whole household) was dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidDayReason {
    NoAlternativeAvailable { model: String },
    SamplingExhausted { anchor: ParcelId },
    EstimationRecordExcluded { model: String, reason: RejectionReason },
    Failed(String),
}

impl InvalidDayReason {
    /// Numeric tag carried into output files.
    pub fn code(&self) -> u8 {
        match self {
            InvalidDayReason::NoAlternativeAvailable { .. }   => 1,
            InvalidDayReason::SamplingExhausted { .. }        => 2,
            InvalidDayReason::EstimationRecordExcluded { .. } => 3,
            InvalidDayReason::Failed(_)                       => 4,
        }
    }
}

impl fmt::Display for InvalidDayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidDayReason::NoAlternativeAvailable { model } => write!(f, "{model}: no alternative available"),
            InvalidDayReason::SamplingExhausted { anchor } => write!(f, "sampling exhausted from {anchor}"),
            InvalidDayReason::EstimationRecordExcluded { model, reason } => write!(f, "{model}: {reason}"),
            InvalidDayReason::Failed(message) => f.write_str(message),
        }
    }
}

impl From<&SimError> for InvalidDayReason {
    fn from(error: &SimError) -> Self {
        match error {
            SimError::Sampling(SamplingError::SamplingExhausted { anchor, .. }) => {
                InvalidDayReason::SamplingExhausted { anchor: *anchor }
            }
            other => InvalidDayReason::Failed(other.to_string()),
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceRecord {
    pub model:         String,
    pub alternative:   usize,
    pub domain_choice: Option<DomainChoice>,
    pub probability:   f64,
}

/// Everything decided for one person on one day.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonDay {
    pub household: EntityId,
    pub person:    EntityId,
    pub pattern:   DayPattern,
    pub choices:   Vec<ChoiceRecord>,
    /// First reason the day was invalidated; later reasons are dropped.
    pub invalid:   Option<InvalidDayReason>,
}

impl PersonDay {
    pub fn new(household: EntityId, person: EntityId) -> Self {
        Self {
            household,
            person,
            pattern: DayPattern::default(),
            choices: Vec::new(),
            invalid: None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    pub fn invalidate(&mut self, reason: InvalidDayReason) {
        if self.invalid.is_none() {
            self.invalid = Some(reason);
        }
    }

    /// Draw from `calculator` and record the result.
    ///
    /// "Nothing available" is logged, invalidates the day and returns
    /// `Ok(None)`; callers skip the rest of the day's decisions.
    pub fn simulate_choice(
        &mut self,
        calculator: &mut ChoiceProbabilityCalculator,
        stream:     &mut RandomStream,
    ) -> SimResult<Option<ChoiceRecord>> {
        let model = calculator.title().to_owned();
        match calculator.simulate_choice(stream)? {
            Some(alternative) => {
                let record = ChoiceRecord {
                    model,
                    alternative:   alternative.index(),
                    domain_choice: alternative.domain_choice(),
                    probability:   alternative.probability(),
                };
                self.choices.push(record.clone());
                Ok(Some(record))
            }
            None => {
                log::warn!("{model}: no available alternative for person {} in household {}", self.person, self.household);
                self.invalidate(InvalidDayReason::NoAlternativeAvailable { model });
                Ok(None)
            }
        }
    }

    /// Unwrap a sampler result for `calculator`'s model.
    ///
    /// Exhaustion invalidates the day.  In estimation mode a record whose
    /// parcel or zone references are unusable is excluded: it counts as
    /// rejected on `calculator` and invalidates the day.  Both yield
    /// `Ok(None)`; any other sampling error is returned.
    pub fn sampled<T>(
        &mut self,
        calculator: &mut ChoiceProbabilityCalculator,
        result:     SamplingResult<T>,
    ) -> SimResult<Option<T>> {
        let error = match result {
            Ok(value) => return Ok(Some(value)),
            Err(SamplingError::SamplingExhausted { anchor, .. }) => {
                self.invalidate(InvalidDayReason::SamplingExhausted { anchor });
                return Ok(None);
            }
            Err(error) => error,
        };
        match exclusion_reason(&error) {
            Some(reason) if calculator.is_in_estimation_mode() => {
                log::debug!("household {} person {}: {error}", self.household, self.person);
                calculator.exclude_observation(reason)?;
                self.invalidate(InvalidDayReason::EstimationRecordExcluded {
                    model: calculator.title().to_owned(),
                    reason,
                });
                Ok(None)
            }
            _ => Err(error.into()),
        }
    }

    /// Write the calculator's current observation.  A rejected record
    /// invalidates the day and yields `None`.
    pub fn observe(&mut self, calculator: &mut ChoiceProbabilityCalculator) -> SimResult<Option<ObservationRecord>> {
        match calculator.write_observation()? {
            ObservationOutcome::Accepted(record) => Ok(Some(record)),
            ObservationOutcome::Rejected(reason) => {
                self.invalidate(InvalidDayReason::EstimationRecordExcluded {
                    model: calculator.title().to_owned(),
                    reason,
                });
                Ok(None)
            }
        }
    }
}

/// Record-level sampling errors an estimation run skips instead of failing
/// the household.
fn exclusion_reason(error: &SamplingError) -> Option<RejectionReason> {
    match error {
        SamplingError::UnknownParcel(_)
        | SamplingError::MissingAnchor(_)
        | SamplingError::ChosenParcelMissing => Some(RejectionReason::MissingParcel),
        SamplingError::ChosenIsOrigin(_)     => Some(RejectionReason::SameOriginAndDestination),
        SamplingError::UnknownZone(_)        => Some(RejectionReason::ZoneOutOfRange),
        _                                    => None,
    }
}

/// Result of one household.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HouseholdOutcome {
    pub household:    EntityId,
    pub person_days:  Vec<PersonDay>,
    pub observations: Vec<ObservationRecord>,
    /// Set when the whole household was abandoned.
    pub failure:      Option<InvalidDayReason>,
}

impl HouseholdOutcome {
    pub fn new(household: EntityId) -> Self {
        Self { household, ..Self::default() }
    }

    pub fn failed(household: EntityId, reason: InvalidDayReason) -> Self {
        Self { household, failure: Some(reason), ..Self::default() }
    }

    pub fn invalid_days(&self) -> usize {
        self.person_days.iter().filter(|d| !d.is_valid()).count()
    }
}
