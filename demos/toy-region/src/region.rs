//! Synthetic land use, skims and population for the toy region.
//!
//! Nine zones on a one-mile grid, four parcels each.  Employment is
//! concentrated in the centre zone; households live everywhere.

use tdm_core::{
    EntityId, ImpedanceLookup, KernelConfig, Mode, ParcelId, PathType, RandomStream, SkimValue, ZoneId,
};
use tdm_sampling::{SamplingResult, SamplingUniverse, SegmentSpec};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const GRID_SIDE:        u32 = 3;
pub const PARCELS_PER_ZONE: u32 = 4;
const PARCEL_OFFSET_MILES:  f64 = 0.2;
const INTRAZONAL_MILES:     f64 = 0.25;
const TRANSIT_WAIT_MINUTES: f64 = 10.0;
/// Auto times grow by this factor in the AM and PM peaks.
const PEAK_FACTOR:          f64 = 1.3;

// ── Land use ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Parcel {
    pub id:         ParcelId,
    pub zone:       ZoneId,
    pub x:          f64,
    pub y:          f64,
    pub employment: f64,
}

pub struct Region {
    pub parcels: Vec<Parcel>,
}

impl Region {
    pub fn synthetic() -> Self {
        let centre = GRID_SIDE * GRID_SIDE / 2;
        let mut parcels = Vec::new();
        for zone in 0..GRID_SIDE * GRID_SIDE {
            let (zx, zy) = (f64::from(zone % GRID_SIDE), f64::from(zone / GRID_SIDE));
            for p in 0..PARCELS_PER_ZONE {
                let id = zone * PARCELS_PER_ZONE + p;
                let employment = match (zone == centre, p) {
                    (true, _) => 400.0 + 100.0 * f64::from(p),
                    (false, 0) => 80.0,
                    (false, 1) => 20.0,
                    (false, _) => 0.0,
                };
                parcels.push(Parcel {
                    id:   ParcelId(id),
                    zone: ZoneId(zone),
                    x:    zx + PARCEL_OFFSET_MILES * f64::from(p % 2),
                    y:    zy + PARCEL_OFFSET_MILES * f64::from(p / 2),
                    employment,
                });
            }
        }
        Self { parcels }
    }

    pub fn zone_count(&self) -> u32 {
        GRID_SIDE * GRID_SIDE
    }

    pub fn parcel(&self, id: ParcelId) -> Option<&Parcel> {
        self.parcels.get(id.index())
    }

    pub fn total_employment(&self) -> f64 {
        self.parcels.iter().map(|p| p.employment).sum()
    }

    /// Segment 0 samples work locations by employment.
    pub fn universe(&self, config: &KernelConfig, skims: &dyn ImpedanceLookup) -> SamplingResult<SamplingUniverse> {
        let mut builder = SamplingUniverse::builder(config);
        for zone in 0..self.zone_count() {
            builder = builder.zone(ParcelId(zone * PARCELS_PER_ZONE));
        }
        for parcel in &self.parcels {
            builder = builder.parcel(parcel.id, parcel.zone);
        }
        let work = SegmentSpec::new(100.0).sizes(self.parcels.iter().map(|p| (p.id, p.employment)));
        builder.segment(work).build(skims)
    }

    pub fn skims(&self) -> GridSkims {
        GridSkims { coordinates: self.parcels.iter().map(|p| (p.x, p.y)).collect() }
    }

    /// `count` households with one to three members placed on random
    /// parcels.  Draws are keyed by household id, so the population does
    /// not depend on `count`.
    pub fn households(&self, count: u32, seed: u64) -> Vec<Household> {
        (1..=count)
            .map(|id| {
                let mut stream = RandomStream::new(seed, EntityId(id), 0);
                let home = ParcelId(stream.gen_range(0..self.parcels.len() as u32));
                let size: u32 = stream.gen_range(1..=3);
                let has_car = stream.uniform01() < 0.8;
                let persons = (1..=size)
                    .map(|n| Person { id: EntityId(id * 10 + n), worker: stream.uniform01() < 0.7 })
                    .collect();
                Household { id: EntityId(id), home, has_car, persons }
            })
            .collect()
    }
}

// ── Population ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Person {
    pub id:     EntityId,
    pub worker: bool,
}

#[derive(Clone, Debug)]
pub struct Household {
    pub id:      EntityId,
    pub home:    ParcelId,
    pub has_car: bool,
    pub persons: Vec<Person>,
}

// ── Skims ─────────────────────────────────────────────────────────────────────

/// Straight-line skims between parcel centroids.
pub struct GridSkims {
    coordinates: Vec<(f64, f64)>,
}

fn speed_mph(mode: Mode) -> f64 {
    match mode {
        Mode::Walk                   => 3.0,
        Mode::Bike                   => 10.0,
        Mode::Transit | Mode::ParkAndRide | Mode::SchoolBus => 12.0,
        Mode::Sov | Mode::Hov2 | Mode::Hov3 => 25.0,
    }
}

fn is_peak(minute: u32) -> bool {
    (420..=540).contains(&minute) || (960..=1080).contains(&minute)
}

impl ImpedanceLookup for GridSkims {
    fn value(
        &self,
        variable:    &str,
        mode:        Mode,
        _path_type:  PathType,
        time:        u32,
        origin:      ParcelId,
        destination: ParcelId,
    ) -> SkimValue {
        let (Some(&(ox, oy)), Some(&(dx, dy))) =
            (self.coordinates.get(origin.index()), self.coordinates.get(destination.index()))
        else {
            return SkimValue::default();
        };
        let miles = f64::hypot(ox - dx, oy - dy).max(INTRAZONAL_MILES);

        let variable = match variable {
            "distance" => miles,
            "ivtime" | "time" => {
                let mut minutes = miles / speed_mph(mode) * 60.0;
                if mode.is_auto() && is_peak(time) {
                    minutes *= PEAK_FACTOR;
                }
                if mode == Mode::Transit {
                    minutes += TRANSIT_WAIT_MINUTES;
                }
                minutes
            }
            _ => 0.0,
        };
        SkimValue { variable, blend_variable: 0.0 }
    }
}
