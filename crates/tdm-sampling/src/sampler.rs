//! Importance-sampled destination choice sets.
//!
//! # Draw
//!
//! Each of the `sample_size` draws gets its own stream, seeded from
//! `stream.seed_values(sample_size)[i]`, so a rejected attempt never shifts
//! the other draws.  One attempt:
//!
//! 1. `r = u · total_weight(anchor zone)`; walk the anchor's ranked weights
//!    until the running total exceeds `r`.  When `r ≤ 0.001` the anchor's
//!    own zone is used.
//! 2. At zone scale the zone's key parcel is the result.
//! 3. Otherwise `r = u · (total_size − excluded_size)` and the zone's ranked
//!    sizes are walked the same way, skipping the anchor and excluded
//!    parcels (parcel scale only).  The hit is kept only if its size is at
//!    least `min_parcel_size`.
//!
//! An attempt that finds nothing is retried up to `max_sampling_attempts`
//! times; after that the sampler returns
//! [`SamplingExhausted`][crate::SamplingError::SamplingExhausted].
//!
//! # Correction
//!
//! Draws of the same parcel are coalesced and counted.  Each item's
//! utility is corrected by
//!
//! ```text
//! tour:  -ln(n · p / freq)
//! stop:  -ln((n₁ · p₁ + n₂ · p₂) / freq)
//! ```
//!
//! where `p` is the probability of drawing the parcel from the anchor.

use tdm_choice::{AlternativeMut, ChoiceProbabilityCalculator, DomainChoice};
use tdm_core::{DestinationScale, ParcelId, RandomStream, SegmentId, ZoneId, EPSILON};

use crate::segment::{ParcelLocation, ParcelMap, Segment, SegmentZone};
use crate::{SamplingError, SamplingResult, SamplingUniverse};

/// Draws scaled below this fall back to the anchor zone (first stage) or
/// are rejected (second stage).
const MIN_SCALED_DRAW: f64 = 0.001;

// ── Sample items ──────────────────────────────────────────────────────────────

/// How an item entered the sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Drawn,
    /// Appended because the observed choice was not drawn.
    Chosen,
    /// The person's usual location, always placed at index `sample_size`.
    Usual,
}

/// Probability of drawing the item in a single draw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DrawProbability {
    Tour(f64),
    /// From the tour origin and from the trip origin.
    Stop { tour: f64, trip: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleItem {
    pub alternative_index: usize,
    pub parcel:            ParcelId,
    pub zone:              ZoneId,
    pub kind:              SampleKind,
    /// Parcel size in the segment (zone total at zone scale).
    pub size:              f64,
    pub probability:       DrawProbability,
    pub draw_frequency:    u32,
    pub adjustment_factor: f64,
    pub available:         bool,
    pub is_chosen:         bool,
}

/// Caller-side hook that attaches model terms to each sampled alternative.
///
/// `alternative` already carries its availability, chosen flag and a
/// `DomainChoice::Parcel`; `item.adjustment_factor` is meant to enter the
/// utility with a fixed coefficient of one.
pub trait SamplingUtilities {
    fn set_utilities(&mut self, item: &SampleItem, alternative: &mut AlternativeMut<'_>);
}

impl<F> SamplingUtilities for F
where
    F: FnMut(&SampleItem, &mut AlternativeMut<'_>),
{
    fn set_utilities(&mut self, item: &SampleItem, alternative: &mut AlternativeMut<'_>) {
        self(item, alternative)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

#[derive(Copy, Clone)]
struct Anchor<'s> {
    parcel:   ParcelId,
    location: ParcelLocation,
    zone:     &'s SegmentZone,
}

impl Anchor<'_> {
    fn size(&self) -> f64 {
        self.zone.size(self.location.sequence)
    }
}

#[derive(Copy, Clone)]
enum Anchors<'s> {
    Tour(Anchor<'s>),
    Stop { tour: Anchor<'s>, trip: Anchor<'s> },
}

#[derive(Copy, Clone, Debug)]
struct Draw {
    parcel:        ParcelId,
    zone:          ZoneId,
    size:          f64,
    excluded_size: f64,
}

/// Coalescing, insertion-ordered sample.
struct Sample {
    sample_size: usize,
    next_index:  usize,
    items:       Vec<SampleItem>,
    excluded:    Vec<f64>,
    positions:   ParcelMap<usize>,
}

impl Sample {
    fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            next_index: 0,
            items:      Vec::with_capacity(sample_size + 2),
            excluded:   Vec::with_capacity(sample_size + 2),
            positions:  ParcelMap::default(),
        }
    }

    /// Position of the new item, or `None` when the parcel was already in
    /// the sample and only its frequency went up.
    fn add(&mut self, draw: Draw, kind: SampleKind, is_chosen: bool) -> Option<usize> {
        if let Some(&position) = self.positions.get(&draw.parcel) {
            self.items[position].draw_frequency += 1;
            return None;
        }

        let alternative_index = match kind {
            SampleKind::Drawn => {
                let index = self.next_index;
                self.next_index += 1;
                index
            }
            SampleKind::Chosen => {
                // A full sample gives up its last item to the observed choice.
                if self.items.len() == self.sample_size {
                    if let Some(last) = self.items.pop() {
                        self.excluded.pop();
                        self.positions.remove(&last.parcel);
                    }
                }
                self.items.len()
            }
            SampleKind::Usual => self.sample_size,
        };

        let position = self.items.len();
        self.items.push(SampleItem {
            alternative_index,
            parcel:            draw.parcel,
            zone:              draw.zone,
            kind,
            size:              draw.size,
            probability:       DrawProbability::Tour(0.0),
            draw_frequency:    1,
            adjustment_factor: 0.0,
            available:         true,
            is_chosen,
        });
        self.excluded.push(draw.excluded_size);
        self.positions.insert(draw.parcel, position);
        Some(position)
    }
}

// ── DestinationSampler ────────────────────────────────────────────────────────

/// Builds a sampled destination choice set on a calculator.
///
/// ```rust,ignore
/// let items = DestinationSampler::new(&universe, segment, 20)
///     .origin(home)
///     .excluded(work)
///     .chosen(observed)
///     .sample_tour_destinations(&mut calculator, &mut stream, &mut utilities)?;
/// ```
///
/// Call it on a calculator that was reset for this decision.  Alternatives
/// are created at indices `0..sample_size` (plus `sample_size` for the usual
/// location); further alternatives such as the oddball belong after that.
pub struct DestinationSampler<'u> {
    universe:    &'u SamplingUniverse,
    segment:     SegmentId,
    sample_size: usize,
    origin:      Option<ParcelId>,
    excluded:    Option<ParcelId>,
    usual:       Option<ParcelId>,
    chosen:      Option<ParcelId>,
    tour_origin: Option<ParcelId>,
    trip_origin: Option<ParcelId>,
}

impl<'u> DestinationSampler<'u> {
    pub fn new(universe: &'u SamplingUniverse, segment: SegmentId, sample_size: usize) -> Self {
        Self {
            universe,
            segment,
            sample_size,
            origin:      None,
            excluded:    None,
            usual:       None,
            chosen:      None,
            tour_origin: None,
            trip_origin: None,
        }
    }

    /// Anchor for tour destinations.
    pub fn origin(mut self, parcel: ParcelId) -> Self {
        self.origin = Some(parcel);
        self
    }

    /// A parcel that may not be drawn besides the origin (e.g. the usual
    /// work location when sampling work-based destinations).
    pub fn excluded(mut self, parcel: ParcelId) -> Self {
        self.excluded = Some(parcel);
        self
    }

    pub fn usual(mut self, parcel: ParcelId) -> Self {
        self.usual = Some(parcel);
        self
    }

    /// The observed destination.  Required in estimation mode.
    pub fn chosen(mut self, parcel: ParcelId) -> Self {
        self.chosen = Some(parcel);
        self
    }

    pub fn tour_origin(mut self, parcel: ParcelId) -> Self {
        self.tour_origin = Some(parcel);
        self
    }

    pub fn trip_origin(mut self, parcel: ParcelId) -> Self {
        self.trip_origin = Some(parcel);
        self
    }

    /// Sample tour destinations around `origin` and build one alternative
    /// per distinct parcel.  Returns the items in the order they entered
    /// the sample.
    pub fn sample_tour_destinations<U>(
        &self,
        calculator: &mut ChoiceProbabilityCalculator,
        stream:     &mut RandomStream,
        utilities:  &mut U,
    ) -> SamplingResult<Vec<SampleItem>>
    where
        U: SamplingUtilities + ?Sized,
    {
        let segment = self.universe.segment(self.segment)?;
        let origin = self.anchor(segment, self.origin.ok_or(SamplingError::MissingAnchor("origin"))?)?;
        let excluded = self.excluded.map(|p| self.anchor(segment, p)).transpose()?;
        let estimation = calculator.is_in_estimation_mode();
        if estimation {
            self.check_chosen(origin.parcel)?;
        }

        let seeds = stream.seed_values(self.sample_size);
        let mut draws = Vec::with_capacity(self.sample_size);
        for &seed in &seeds {
            let mut draw_stream = RandomStream::from_seed(seed);
            draws.push(self.draw_until_valid(segment, &mut draw_stream, &origin, excluded.as_ref())?);
        }

        let anchors = Anchors::Tour(origin);
        let mut sample = Sample::new(self.sample_size);
        for draw in draws {
            let is_chosen = self.chosen == Some(draw.parcel);
            self.place(calculator, segment, &anchors, &mut sample, draw, SampleKind::Drawn, is_chosen);
        }

        let usual = self.usual.map(|p| self.anchor(segment, p)).transpose()?;
        match (estimation, self.chosen) {
            (true, Some(chosen)) => {
                let chosen = self.anchor(segment, chosen)?;
                let chosen_is_usual = usual.is_some_and(|u| u.parcel == chosen.parcel);
                let kind = if chosen_is_usual { SampleKind::Usual } else { SampleKind::Chosen };
                self.place(calculator, segment, &anchors, &mut sample, anchor_draw(&chosen), kind, true);
                if let Some(usual) = usual.filter(|_| !chosen_is_usual) {
                    self.place(calculator, segment, &anchors, &mut sample, anchor_draw(&usual), SampleKind::Usual, false);
                }
            }
            _ => {
                if let Some(usual) = usual {
                    self.place(calculator, segment, &anchors, &mut sample, anchor_draw(&usual), SampleKind::Usual, false);
                }
            }
        }

        Ok(self.finish(calculator, sample, utilities))
    }

    /// Sample intermediate-stop destinations: the first half of the draws
    /// is anchored at the tour origin (excluding the trip origin), the rest
    /// at the trip origin (excluding the tour origin).
    pub fn sample_intermediate_stop_destinations<U>(
        &self,
        calculator: &mut ChoiceProbabilityCalculator,
        stream:     &mut RandomStream,
        utilities:  &mut U,
    ) -> SamplingResult<Vec<SampleItem>>
    where
        U: SamplingUtilities + ?Sized,
    {
        let segment = self.universe.segment(self.segment)?;
        let tour = self.anchor(segment, self.tour_origin.ok_or(SamplingError::MissingAnchor("tour origin"))?)?;
        let trip = self.anchor(segment, self.trip_origin.ok_or(SamplingError::MissingAnchor("trip origin"))?)?;
        let estimation = calculator.is_in_estimation_mode();
        if estimation {
            self.check_chosen(trip.parcel)?;
        }

        let first_half = self.sample_size / 2;
        let seeds = stream.seed_values(self.sample_size);
        let mut draws = Vec::with_capacity(self.sample_size);
        for (i, &seed) in seeds.iter().enumerate() {
            let mut draw_stream = RandomStream::from_seed(seed);
            let (from, skip) = if i < first_half { (&tour, &trip) } else { (&trip, &tour) };
            draws.push(self.draw_until_valid(segment, &mut draw_stream, from, Some(skip))?);
        }

        let anchors = Anchors::Stop { tour, trip };
        let mut sample = Sample::new(self.sample_size);
        for draw in draws {
            let is_chosen = self.chosen == Some(draw.parcel);
            self.place(calculator, segment, &anchors, &mut sample, draw, SampleKind::Drawn, is_chosen);
        }
        if let (true, Some(chosen)) = (estimation, self.chosen) {
            let chosen = self.anchor(segment, chosen)?;
            self.place(calculator, segment, &anchors, &mut sample, anchor_draw(&chosen), SampleKind::Chosen, true);
        }

        Ok(self.finish(calculator, sample, utilities))
    }

    /// Estimation records need a chosen parcel, and at parcel scale it may
    /// not be the origin of the move.
    fn check_chosen(&self, origin: ParcelId) -> SamplingResult<()> {
        let chosen = self.chosen.ok_or(SamplingError::ChosenParcelMissing)?;
        if chosen == origin && self.universe.scale() == DestinationScale::Parcel {
            return Err(SamplingError::ChosenIsOrigin(chosen));
        }
        Ok(())
    }

    // ── Drawing ───────────────────────────────────────────────────────────

    fn anchor<'s>(&self, segment: &'s Segment, parcel: ParcelId) -> SamplingResult<Anchor<'s>> {
        let location = self.universe.location(parcel)?;
        Ok(Anchor { parcel, location, zone: segment.zone(location.zone)? })
    }

    fn draw_until_valid(
        &self,
        segment:  &Segment,
        stream:   &mut RandomStream,
        origin:   &Anchor<'_>,
        excluded: Option<&Anchor<'_>>,
    ) -> SamplingResult<Draw> {
        for _ in 0..self.universe.max_attempts() {
            if let Some(draw) = self.draw(segment, stream, origin, excluded) {
                return Ok(draw);
            }
        }
        log::warn!(
            "destination sampling exhausted from {} (zone {}): total weight {}, total size {}",
            origin.parcel,
            origin.zone.id(),
            origin.zone.total_weight(),
            origin.zone.total_size(),
        );
        Err(SamplingError::SamplingExhausted {
            anchor:       origin.parcel,
            total_weight: origin.zone.total_weight(),
            total_size:   origin.zone.total_size(),
        })
    }

    fn draw(
        &self,
        segment:  &Segment,
        stream:   &mut RandomStream,
        origin:   &Anchor<'_>,
        excluded: Option<&Anchor<'_>>,
    ) -> Option<Draw> {
        let scale = self.universe.scale();

        // ── Zone ──────────────────────────────────────────────────────────
        let mut destination = None;
        let random = stream.uniform01() * origin.zone.total_weight();
        if random > MIN_SCALED_DRAW {
            let mut total = 0.0;
            for (zone, weight) in origin.zone.ranked_weights() {
                total += weight;
                if total <= random {
                    continue;
                }
                destination = segment.zones().get(zone.index());
                break;
            }
        }
        let destination = destination.unwrap_or(origin.zone);

        // Only parcels counted in the zone's total size come off it.
        let min_size = self.universe.min_parcel_size();
        let mut excluded_size = 0.0;
        if scale == DestinationScale::Parcel {
            if destination.id() == origin.location.zone && origin.size() >= min_size {
                excluded_size += origin.size();
            }
            if let Some(excluded) = excluded.filter(|e| e.location.zone == destination.id() && e.size() >= min_size) {
                excluded_size += excluded.size();
            }
        }

        if scale == DestinationScale::Zone {
            return Some(Draw {
                parcel: destination.key(),
                zone:   destination.id(),
                size:   destination.total_size(),
                excluded_size,
            });
        }

        // ── Parcel within the zone ────────────────────────────────────────
        let random = stream.uniform01() * (destination.total_size() - excluded_size);
        if random <= MIN_SCALED_DRAW {
            return None;
        }
        let mut total = 0.0;
        for (_, parcel) in destination.ranked_sizes() {
            let skipped = scale == DestinationScale::Parcel
                && (parcel.parcel == origin.parcel || excluded.is_some_and(|e| e.parcel == parcel.parcel));
            if !skipped {
                total += parcel.size;
            }
            if total <= random {
                continue;
            }
            return (parcel.size >= min_size).then_some(Draw {
                parcel: parcel.parcel,
                zone:   destination.id(),
                size:   parcel.size,
                excluded_size,
            });
        }
        None
    }

    // ── Building alternatives ─────────────────────────────────────────────

    /// Add `draw` to the sample and, when it is new, create its alternative
    /// and set its draw probability.
    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        calculator: &mut ChoiceProbabilityCalculator,
        segment:    &Segment,
        anchors:    &Anchors<'_>,
        sample:     &mut Sample,
        draw:       Draw,
        kind:       SampleKind,
        is_chosen:  bool,
    ) {
        let Some(position) = sample.add(draw, kind, is_chosen) else {
            return;
        };
        let estimation = calculator.is_in_estimation_mode();
        let item = &mut sample.items[position];
        let mut alternative = calculator.get_alternative(item.alternative_index, true, is_chosen);
        alternative.set_domain_choice(DomainChoice::Parcel { parcel: item.parcel });

        let Ok(destination) = segment.zone(item.zone) else {
            return;
        };
        // The observed choice is never reduced by the excluded size and gets
        // its availability from its own draw probability.
        let set_availability = estimation && self.chosen == Some(item.parcel);
        let excluded_size = if set_availability { 0.0 } else { sample.excluded[position] };
        let min_size = self.universe.min_parcel_size();
        let zone_scale = self.universe.scale() == DestinationScale::Zone;
        let parcel_probability = if zone_scale {
            1.0
        } else {
            item.size / (destination.total_size() - excluded_size).max(EPSILON)
        };

        let (probability, available) = match anchors {
            Anchors::Tour(origin) => {
                let weight = origin.zone.weight(destination.id());
                let p = weight / origin.zone.total_weight().max(EPSILON) * parcel_probability;
                let available = if zone_scale { p > 0.0 && weight > min_size } else { p > 0.0 && item.size >= min_size };
                (DrawProbability::Tour(p), available)
            }
            Anchors::Stop { tour, trip } => {
                let tour_weight = tour.zone.weight(destination.id());
                let p1 = tour_weight / tour.zone.total_weight().max(EPSILON) * parcel_probability;
                let p2 = trip.zone.weight(destination.id()) / trip.zone.total_weight().max(EPSILON) * parcel_probability;
                let reachable = p1 > 0.0 || p2 > 0.0;
                let available = if zone_scale { reachable && tour_weight > min_size } else { reachable && item.size >= min_size };
                (DrawProbability::Stop { tour: p1, trip: p2 }, available)
            }
        };

        item.probability = probability;
        if set_availability {
            item.available = available;
            alternative.set_available(available);
        }
    }

    /// Apply the sampling correction and hand every item to the caller.
    fn finish<U>(&self, calculator: &mut ChoiceProbabilityCalculator, mut sample: Sample, utilities: &mut U) -> Vec<SampleItem>
    where
        U: SamplingUtilities + ?Sized,
    {
        let n = self.sample_size as f64;
        let n1 = (self.sample_size / 2) as f64;
        let n2 = n - n1;

        for item in &mut sample.items {
            let frequency = f64::from(item.draw_frequency);
            match &mut item.probability {
                DrawProbability::Tour(p) => {
                    if *p >= EPSILON && n > 0.0 {
                        item.adjustment_factor = -(n * *p / frequency).ln();
                    }
                }
                DrawProbability::Stop { tour, trip } => {
                    if *tour < EPSILON && *trip < EPSILON {
                        *tour = 2.0 * EPSILON;
                        *trip = 2.0 * EPSILON;
                    }
                    let expected = n1 * *tour + n2 * *trip;
                    if expected > 0.0 {
                        item.adjustment_factor = -(expected / frequency).ln();
                    }
                }
            }

            if let Some(mut alternative) = calculator.alternative_mut(item.alternative_index) {
                utilities.set_utilities(item, &mut alternative);
            }
        }

        log::debug!(
            "{}: sampled {} distinct destinations from {} draws",
            calculator.title(),
            sample.items.len(),
            self.sample_size,
        );
        sample.items
    }
}

fn anchor_draw(anchor: &Anchor<'_>) -> Draw {
    Draw {
        parcel:        anchor.parcel,
        zone:          anchor.location.zone,
        size:          anchor.size(),
        excluded_size: 0.0,
    }
}
