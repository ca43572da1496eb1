//! The toy region's household model: usual work location, departure
//! period and commute mode for every worker.

use std::sync::Arc;

use tdm_choice::{AlternativeMut, ChoiceError, ChoiceProbabilityCalculator, DomainChoice};
use tdm_core::{
    CoefficientId, CoefficientTable, EntityId, ImpedanceLookup, KernelResult, Mode, NestId, ParcelId, PathType,
    Purpose, SegmentId,
};
use tdm_sampling::{DestinationSampler, SampleItem, SamplingUtilities};
use tdm_schedule::TimeWindow;
use tdm_sim::{HouseholdModel, HouseholdOutcome, ModelHandle, PersonDay, SimError, SimResult, SimulationContext, WorkerSlot};

use crate::region::{Household, Person};

// ── Coefficients ──────────────────────────────────────────────────────────────

pub const SAMPLING_ADJUSTMENT: CoefficientId = CoefficientId(0);
pub const SHADOW_PRICE:        CoefficientId = CoefficientId(1);
pub const MODE_LOGSUM:         CoefficientId = CoefficientId(2);

pub const TRAVEL_TIME:         CoefficientId = CoefficientId(0);
pub const BIKE_CONSTANT:       CoefficientId = CoefficientId(1);
pub const TRANSIT_CONSTANT:    CoefficientId = CoefficientId(2);
pub const HOV_CONSTANT:        CoefficientId = CoefficientId(3);
pub const AUTO_THETA:          CoefficientId = CoefficientId(4);
/// Applied through the region adjustments, not by the model.
pub const TRANSIT_CALIBRATION: CoefficientId = CoefficientId(5);

pub const PEAK_CONSTANT:       CoefficientId = CoefficientId(0);
pub const LATE_CONSTANT:       CoefficientId = CoefficientId(1);

const WORK_LOCATION_COEFFICIENTS: &str = r#"{
    "title": "work_location",
    "coefficients": [
        { "id": 0, "label": "sampling_adjustment", "value": 1.0, "fixed": true },
        { "id": 1, "label": "shadow_price",        "value": 1.0, "fixed": true },
        { "id": 2, "label": "mode_logsum",         "value": 0.6 }
    ]
}"#;

const MODE_COEFFICIENTS: &str = r#"{
    "title": "commute_mode",
    "coefficients": [
        { "id": 0, "label": "travel_time",         "value": -0.05 },
        { "id": 1, "label": "bike_constant",       "value": -1.2 },
        { "id": 2, "label": "transit_constant",    "value": -0.8 },
        { "id": 3, "label": "hov_constant",        "value": -1.5 },
        { "id": 4, "label": "auto_theta",          "value": 0.7, "kind": "nest" },
        { "id": 5, "label": "transit_calibration", "value": 0.3 }
    ]
}"#;

const DEPARTURE_COEFFICIENTS: &str = r#"{
    "title": "work_departure",
    "coefficients": [
        { "id": 0, "label": "peak_constant", "value": 0.8 },
        { "id": 1, "label": "late_constant", "value": -0.4 }
    ]
}"#;

pub struct Coefficients {
    pub work_location: Arc<CoefficientTable>,
    pub mode:          Arc<CoefficientTable>,
    pub departure:     Arc<CoefficientTable>,
}

impl Coefficients {
    pub fn load() -> KernelResult<Self> {
        Ok(Self {
            work_location: Arc::new(CoefficientTable::from_json_str(WORK_LOCATION_COEFFICIENTS)?),
            mode:          Arc::new(CoefficientTable::from_json_str(MODE_COEFFICIENTS)?),
            departure:     Arc::new(CoefficientTable::from_json_str(DEPARTURE_COEFFICIENTS)?),
        })
    }
}

// ── Choice-set builders ───────────────────────────────────────────────────────

const MODES: [Mode; 5] = [Mode::Walk, Mode::Bike, Mode::Sov, Mode::Hov2, Mode::Transit];
const AUTO_NEST: NestId = NestId(1);
const MAX_WALK_MILES: f64 = 3.0;

/// Work start periods: (first minute, exclusive end).
const WORK_PERIODS: [(u32, u32); 3] = [(420, 960), (480, 1020), (600, 1080)];

/// Build the commute mode choice set from `home` to `work` leaving at
/// `minute`.
fn add_mode_alternatives(
    calculator: &mut ChoiceProbabilityCalculator,
    skims:      &dyn ImpedanceLookup,
    home:       ParcelId,
    work:       ParcelId,
    minute:     u32,
    has_car:    bool,
) {
    let miles = skims.value("distance", Mode::Walk, PathType::FullNetwork, minute, home, work).variable;
    for (index, &mode) in MODES.iter().enumerate() {
        let available = match mode {
            Mode::Walk => miles <= MAX_WALK_MILES,
            Mode::Sov => has_car,
            _ => true,
        };
        let time = skims.value("ivtime", mode, PathType::FullNetwork, minute, home, work).variable;
        let mut alternative = calculator.get_alternative(index, available, false);
        alternative.set_domain_choice(DomainChoice::Mode { mode });
        alternative.add_utility_term(TRAVEL_TIME, time);
        match mode {
            Mode::Bike => alternative.add_utility_term(BIKE_CONSTANT, 1.0),
            Mode::Transit => alternative.add_utility_term(TRANSIT_CONSTANT, 1.0),
            Mode::Hov2 => alternative.add_utility_term(HOV_CONSTANT, 1.0),
            _ => {}
        }
        if mode.is_auto() {
            alternative.add_nested_alternative(AUTO_NEST, AUTO_THETA);
        }
    }
}

/// Adds the sampling correction, shadow price and a mode-choice logsum to
/// each sampled work location.  The logsum comes from the nested mode
/// calculator, rebuilt per location.
struct WorkLocationUtilities<'a> {
    ctx:     &'a SimulationContext,
    mode:    &'a mut ChoiceProbabilityCalculator,
    key:     u64,
    home:    ParcelId,
    has_car: bool,
    error:   Option<ChoiceError>,
}

impl SamplingUtilities for WorkLocationUtilities<'_> {
    fn set_utilities(&mut self, item: &SampleItem, alternative: &mut AlternativeMut<'_>) {
        alternative.add_utility_term(SAMPLING_ADJUSTMENT, item.adjustment_factor);
        alternative.add_utility_term(SHADOW_PRICE, self.ctx.shadow_prices().price(item.parcel));

        self.mode.reset();
        self.mode.start_observation(self.key);
        add_mode_alternatives(self.mode, self.ctx.impedance(), self.home, item.parcel, WORK_PERIODS[1].0, self.has_car);
        self.mode.apply_region_adjustments(self.ctx.adjustments());
        match self.mode.compute_logsum() {
            Ok(logsum) => alternative.add_utility_term(MODE_LOGSUM, logsum),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }
}

// ── Household model ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
pub struct Models {
    pub work_location: ModelHandle,
    pub mode:          ModelHandle,
    pub departure:     ModelHandle,
}

pub struct CommuteModel {
    pub models:      Models,
    pub sample_size: usize,
}

/// Stream offsets: one per decision point of a person.
const LOCATION_OFFSET:  u32 = 0;
const DEPARTURE_OFFSET: u32 = 1;
const MODE_OFFSET:      u32 = 2;

impl CommuteModel {
    fn simulate_worker(
        &self,
        household: &Household,
        person:    &Person,
        day:       &mut PersonDay,
        ctx:       &SimulationContext,
        slot:      &mut WorkerSlot,
    ) -> SimResult<()> {
        let universe = ctx.universe().ok_or_else(|| SimError::Config("work location needs a sampling universe".into()))?;
        day.pattern.set_tours(Purpose::Work, 1);

        // ① Work location, with a nested mode logsum per sampled parcel.
        let work = {
            let (location, mode) = slot.calculators_for_entity(self.models.work_location, self.models.mode, person.id)?;
            let mut stream = ctx.stream(person.id, LOCATION_OFFSET);
            let mut utilities = WorkLocationUtilities {
                ctx,
                mode,
                key: u64::from(person.id.0),
                home: household.home,
                has_car: household.has_car,
                error: None,
            };
            let sampled = DestinationSampler::new(universe, SegmentId(0), self.sample_size)
                .origin(household.home)
                .sample_tour_destinations(location, &mut stream, &mut utilities);
            if let Some(e) = utilities.error {
                return Err(e.into());
            }
            if day.sampled(location, sampled)?.is_none() {
                return Ok(());
            }
            location.apply_region_adjustments(ctx.adjustments());
            match day.simulate_choice(location, &mut stream)? {
                Some(record) => match record.domain_choice {
                    Some(DomainChoice::Parcel { parcel }) => parcel,
                    other => return Err(SimError::InvalidInput(format!("work location chose {other:?}"))),
                },
                None => return Ok(()),
            }
        };

        // ② Work period, constrained by what is already in the day.
        let mut window = TimeWindow::new(ctx.config().minutes_in_day);
        if person.id.0 % 10 == 2 {
            // Second household members drop a child off before work.
            window.reserve(450, 500)?;
        }
        let calculator = slot.get_calculator_for_entity(self.models.departure, person.id)?;
        for (index, &(start, end)) in WORK_PERIODS.iter().enumerate() {
            let available = window.entire_span_is_available(start, end - 1);
            let mut alternative = calculator.get_alternative(index, available, false);
            alternative.set_domain_choice(DomainChoice::Index { index: index as u32 });
            match index {
                0 | 1 => alternative.add_utility_term(PEAK_CONSTANT, 1.0),
                _ => alternative.add_utility_term(LATE_CONSTANT, 1.0),
            }
        }
        let Some(record) = day.simulate_choice(calculator, &mut ctx.stream(person.id, DEPARTURE_OFFSET))? else {
            return Ok(());
        };
        let (start, end) = WORK_PERIODS[record.alternative];
        window.reserve(start, end)?;

        // ③ Commute mode at the chosen departure.
        let calculator = slot.get_calculator_for_entity(self.models.mode, person.id)?;
        add_mode_alternatives(calculator, ctx.impedance(), household.home, work, start, household.has_car);
        calculator.apply_region_adjustments(ctx.adjustments());
        day.simulate_choice(calculator, &mut ctx.stream(person.id, MODE_OFFSET))?;
        Ok(())
    }
}

impl HouseholdModel for CommuteModel {
    type Household = Household;

    fn household_id(&self, household: &Household) -> EntityId {
        household.id
    }

    fn simulate_household(
        &self,
        household: &Household,
        ctx:       &SimulationContext,
        slot:      &mut WorkerSlot,
    ) -> SimResult<HouseholdOutcome> {
        let mut outcome = HouseholdOutcome::new(household.id);
        for person in &household.persons {
            let mut day = PersonDay::new(household.id, person.id);
            if person.worker {
                self.simulate_worker(household, person, &mut day, ctx, slot)?;
            }
            outcome.person_days.push(day);
        }
        Ok(outcome)
    }
}
