//! Per-segment zone aggregates and the builder that precomputes them.
//!
//! A segment (one per purpose / person-type stratum) stores, for every zone:
//!
//! | Field            | Meaning                                                        |
//! |------------------|----------------------------------------------------------------|
//! | `sizes`          | attractiveness of each parcel in the zone, by sequence         |
//! | `total_size`     | sum of the sizes at or above `min_parcel_size`                 |
//! | `weights`        | sampling weight from this zone to every destination zone       |
//! | `total_weight`   | sum of `weights`                                               |
//!
//! Weights decay with the impedance from the zone's key parcel:
//!
//! ```text
//! weight(o → d) = exp(-2 · time(o, d) · 100 / weight_factor) · total_size(d)
//! ```
//!
//! and are zero for unconnected pairs (`time < ε`).  Sizes and weights are
//! also kept ranked in descending order so draws walk the heavy entries
//! first.

use tdm_core::{
    DestinationScale, ImpedanceLookup, KernelConfig, Mode, ParcelId, PathType, SegmentId, ZoneId, EPSILON,
};

use crate::{SamplingError, SamplingResult};

#[cfg(feature = "fx-hash")]
pub type ParcelMap<V> = rustc_hash::FxHashMap<ParcelId, V>;
#[cfg(not(feature = "fx-hash"))]
pub type ParcelMap<V> = std::collections::HashMap<ParcelId, V>;

/// `100 · Σ exp(factor_k) · attribute_k`, the standard size function.
pub fn size_from_factors(factors: &[f64], attributes: &[f64]) -> f64 {
    100.0 * factors.iter().zip(attributes).map(|(f, a)| f.exp() * a).sum::<f64>()
}

// ── SegmentZone ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParcelSize {
    pub parcel: ParcelId,
    pub size:   f64,
}

#[derive(Clone, Debug)]
pub struct SegmentZone {
    id:             ZoneId,
    key:            ParcelId,
    total_size:     f64,
    total_weight:   f64,
    sizes:          Vec<ParcelSize>,
    ranked_sizes:   Vec<u32>,
    weights:        Vec<f64>,
    ranked_weights: Vec<ZoneId>,
}

impl SegmentZone {
    fn new(id: ZoneId, key: ParcelId, parcel_count: usize, zone_count: usize) -> Self {
        Self {
            id,
            key,
            total_size:     0.0,
            total_weight:   0.0,
            sizes:          Vec::with_capacity(parcel_count),
            ranked_sizes:   Vec::new(),
            weights:        vec![0.0; zone_count],
            ranked_weights: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// The parcel that represents the whole zone at zone scale and in skim
    /// lookups.
    #[inline]
    pub fn key(&self) -> ParcelId {
        self.key
    }

    #[inline]
    pub fn total_size(&self) -> f64 {
        self.total_size
    }

    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Size of the parcel at `sequence`; zero when out of range.
    #[inline]
    pub fn size(&self, sequence: u32) -> f64 {
        self.sizes.get(sequence as usize).map_or(0.0, |p| p.size)
    }

    #[inline]
    pub fn weight(&self, destination: ZoneId) -> f64 {
        self.weights.get(destination.index()).copied().unwrap_or(0.0)
    }

    pub fn parcels(&self) -> &[ParcelSize] {
        &self.sizes
    }

    /// `(sequence, parcel size)` from largest to smallest.
    pub fn ranked_sizes(&self) -> impl Iterator<Item = (u32, ParcelSize)> + '_ {
        self.ranked_sizes.iter().map(|&seq| (seq, self.sizes[seq as usize]))
    }

    /// `(destination zone, weight)` from heaviest to lightest.
    pub fn ranked_weights(&self) -> impl Iterator<Item = (ZoneId, f64)> + '_ {
        self.ranked_weights.iter().map(|&zone| (zone, self.weights[zone.index()]))
    }

    fn rank_sizes(&mut self) {
        let sizes = &self.sizes;
        let mut ranked: Vec<u32> = (0..sizes.len() as u32).collect();
        ranked.sort_by(|&a, &b| sizes[b as usize].size.total_cmp(&sizes[a as usize].size));
        self.ranked_sizes = ranked;
    }

    fn rank_weights(&mut self) {
        let weights = &self.weights;
        let mut ranked: Vec<ZoneId> = (0..weights.len() as u32).map(ZoneId).collect();
        ranked.sort_by(|a, b| weights[b.index()].total_cmp(&weights[a.index()]));
        self.ranked_weights = ranked;
    }
}

// ── Segment ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Segment {
    id:            SegmentId,
    weight_factor: f64,
    zones:         Vec<SegmentZone>,
}

impl Segment {
    #[inline]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    #[inline]
    pub fn weight_factor(&self) -> f64 {
        self.weight_factor
    }

    pub fn zone(&self, id: ZoneId) -> SamplingResult<&SegmentZone> {
        self.zones.get(id.index()).ok_or(SamplingError::UnknownZone(id))
    }

    pub fn zones(&self) -> &[SegmentZone] {
        &self.zones
    }
}

/// Where a parcel sits: its zone and its position within that zone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParcelLocation {
    pub zone:     ZoneId,
    pub sequence: u32,
}

/// Every segment of one run, plus the sampling settings they were built with.
/// Read-only once built.
#[derive(Clone, Debug)]
pub struct SamplingUniverse {
    scale:           DestinationScale,
    min_parcel_size: f64,
    max_attempts:    u32,
    zone_count:      usize,
    parcels:         ParcelMap<ParcelLocation>,
    segments:        Vec<Segment>,
}

impl SamplingUniverse {
    pub fn builder(config: &KernelConfig) -> SamplingUniverseBuilder {
        SamplingUniverseBuilder::new(config)
    }

    #[inline]
    pub fn scale(&self) -> DestinationScale {
        self.scale
    }

    #[inline]
    pub fn min_parcel_size(&self) -> f64 {
        self.min_parcel_size
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[inline]
    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    pub fn parcel_count(&self) -> usize {
        self.parcels.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn location(&self, parcel: ParcelId) -> SamplingResult<ParcelLocation> {
        self.parcels.get(&parcel).copied().ok_or(SamplingError::UnknownParcel(parcel))
    }

    pub fn segment(&self, id: SegmentId) -> SamplingResult<&Segment> {
        self.segments.get(id.index()).ok_or(SamplingError::UnknownSegment(id))
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// The impedance measure weights decay with.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightSkim {
    pub variable:                String,
    pub mode:                    Mode,
    pub path_type:               PathType,
    pub minute:                  u32,
    /// Only used for the intrazonal `distance` fallback at zone scale.
    pub distance_units_per_mile: f64,
}

impl Default for WeightSkim {
    fn default() -> Self {
        Self {
            variable:                "ivtime".into(),
            mode:                    Mode::Sov,
            path_type:               PathType::FullNetwork,
            minute:                  480,
            distance_units_per_mile: 1.0,
        }
    }
}

impl WeightSkim {
    /// Stand-in for a missing intrazonal impedance at zone scale.
    fn intrazonal_default(&self) -> Option<f64> {
        match self.variable.as_str() {
            "distance" => Some(0.25 * self.distance_units_per_mile),
            "ivtime" | "time" | "ivtfree" => Some(match self.mode {
                Mode::Walk => 5.0,
                Mode::Bike => 2.0,
                m if m.is_auto() => 1.0,
                _ => 0.0,
            }),
            _ => None,
        }
    }
}

/// Parcel sizes and weight decay for one segment.  Parcels without an
/// entry have size zero.
#[derive(Clone, Debug, Default)]
pub struct SegmentSpec {
    weight_factor: f64,
    sizes:         Vec<(ParcelId, f64)>,
}

impl SegmentSpec {
    pub fn new(weight_factor: f64) -> Self {
        Self { weight_factor, sizes: Vec::new() }
    }

    pub fn size(mut self, parcel: ParcelId, size: f64) -> Self {
        self.sizes.push((parcel, size));
        self
    }

    pub fn sizes(mut self, sizes: impl IntoIterator<Item = (ParcelId, f64)>) -> Self {
        self.sizes.extend(sizes);
        self
    }
}

/// Fluent builder for [`SamplingUniverse`].
///
/// Zones are numbered in the order they are added (`ZoneId(0)`, `ZoneId(1)`,
/// …).  Parcels are sequenced within their zone in the order they are added.
///
/// ```rust,ignore
/// let universe = SamplingUniverse::builder(&config)
///     .zone(ParcelId(0))
///     .zone(ParcelId(10))
///     .parcel(ParcelId(0), ZoneId(0))
///     .parcel(ParcelId(10), ZoneId(1))
///     .segment(SegmentSpec::new(30.0).size(ParcelId(10), 250.0))
///     .build(&skims)?;
/// ```
pub struct SamplingUniverseBuilder {
    scale:           DestinationScale,
    min_parcel_size: f64,
    max_attempts:    u32,
    skim:            WeightSkim,
    zones:           Vec<ParcelId>,
    parcels:         Vec<(ParcelId, ZoneId)>,
    segments:        Vec<SegmentSpec>,
}

impl SamplingUniverseBuilder {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            scale:           config.destination_scale,
            min_parcel_size: config.min_parcel_size,
            max_attempts:    config.max_sampling_attempts,
            skim:            WeightSkim::default(),
            zones:           Vec::new(),
            parcels:         Vec::new(),
            segments:        Vec::new(),
        }
    }

    pub fn skim(mut self, skim: WeightSkim) -> Self {
        self.skim = skim;
        self
    }

    /// Add the next zone, represented by `key`.
    pub fn zone(mut self, key: ParcelId) -> Self {
        self.zones.push(key);
        self
    }

    pub fn parcel(mut self, parcel: ParcelId, zone: ZoneId) -> Self {
        self.parcels.push((parcel, zone));
        self
    }

    /// Add the next segment (`SegmentId(0)`, `SegmentId(1)`, …).
    pub fn segment(mut self, spec: SegmentSpec) -> Self {
        self.segments.push(spec);
        self
    }

    pub fn build(self, impedance: &dyn ImpedanceLookup) -> SamplingResult<SamplingUniverse> {
        let zone_count = self.zones.len();

        // ── Locate parcels ────────────────────────────────────────────────
        let mut parcels = ParcelMap::default();
        let mut counts = vec![0u32; zone_count];
        for &(parcel, zone) in &self.parcels {
            let count = counts.get_mut(zone.index()).ok_or(SamplingError::UnknownZone(zone))?;
            if parcels.insert(parcel, ParcelLocation { zone, sequence: *count }).is_some() {
                return Err(SamplingError::DuplicateParcel(parcel));
            }
            *count += 1;
        }

        // ── Impedance between key parcels, shared by every segment ────────
        let mut times = vec![0.0; zone_count * zone_count];
        for (o, &origin) in self.zones.iter().enumerate() {
            for (d, &destination) in self.zones.iter().enumerate() {
                let mut time = impedance
                    .value(&self.skim.variable, self.skim.mode, self.skim.path_type, self.skim.minute, origin, destination)
                    .variable;
                if o == d && self.scale == DestinationScale::Zone && time < EPSILON {
                    time = self.skim.intrazonal_default().unwrap_or(time);
                }
                times[o * zone_count + d] = time;
            }
        }

        // ── Segments ──────────────────────────────────────────────────────
        let mut segments = Vec::with_capacity(self.segments.len());
        for (index, spec) in self.segments.iter().enumerate() {
            let id = SegmentId(index as u16);
            if !(spec.weight_factor > 0.0 && spec.weight_factor.is_finite()) {
                return Err(SamplingError::InvalidWeightFactor { segment: id, weight_factor: spec.weight_factor });
            }

            let mut zones: Vec<SegmentZone> = self
                .zones
                .iter()
                .enumerate()
                .map(|(z, &key)| SegmentZone::new(ZoneId(z as u32), key, counts[z] as usize, zone_count))
                .collect();
            for &(parcel, zone) in &self.parcels {
                zones[zone.index()].sizes.push(ParcelSize { parcel, size: 0.0 });
            }
            for &(parcel, size) in &spec.sizes {
                let location = parcels.get(&parcel).ok_or(SamplingError::UnknownParcel(parcel))?;
                zones[location.zone.index()].sizes[location.sequence as usize].size = size;
            }
            for zone in &mut zones {
                zone.total_size = zone
                    .sizes
                    .iter()
                    .filter(|p| p.size >= self.min_parcel_size)
                    .map(|p| p.size)
                    .sum();
                zone.rank_sizes();
            }

            let totals: Vec<f64> = zones.iter().map(|z| z.total_size).collect();
            for (o, origin) in zones.iter_mut().enumerate() {
                for (d, &destination_size) in totals.iter().enumerate() {
                    let time = times[o * zone_count + d];
                    let weight = if time < EPSILON {
                        0.0
                    } else {
                        (-2.0 * time * 100.0 / spec.weight_factor).exp() * destination_size
                    };
                    origin.weights[d] = weight;
                    origin.total_weight += weight;
                }
                origin.rank_weights();
            }

            log::debug!(
                "segment {id}: {zone_count} zones, total size {:.1}",
                totals.iter().sum::<f64>()
            );
            segments.push(Segment { id, weight_factor: spec.weight_factor, zones });
        }

        Ok(SamplingUniverse {
            scale: self.scale,
            min_parcel_size: self.min_parcel_size,
            max_attempts: self.max_attempts,
            zone_count,
            parcels,
            segments,
        })
    }
}
