//! Unit tests for tdm-sampling.
//!
//! The test region has three zones keyed by parcels 0, 10 and 20.  Skim
//! time between keys is `|a - b| / 10`, so zone 0 → 1 is one minute and
//! zone 0 → 2 two; intrazonal time is zero.  With a weight factor of 100
//! every weight is `exp(-2 · time) · size`.

#[cfg(test)]
mod helpers {
    use std::sync::Arc;

    use tdm_choice::{AlternativeMut, ChoiceProbabilityCalculator};
    use tdm_core::{
        Coefficient, CoefficientId, CoefficientTable, ImpedanceLookup, KernelConfig, Mode, ParcelId, PathType,
        SkimValue, ZoneId,
    };

    use crate::{SampleItem, SamplingUniverse, SamplingUtilities, SegmentSpec};

    pub const ADJUSTMENT: CoefficientId = CoefficientId(0);

    pub struct LinearSkims;

    impl ImpedanceLookup for LinearSkims {
        fn value(
            &self,
            _variable:   &str,
            _mode:       Mode,
            _path_type:  PathType,
            _time:       u32,
            origin:      ParcelId,
            destination: ParcelId,
        ) -> SkimValue {
            SkimValue {
                variable:       (f64::from(origin.0) - f64::from(destination.0)).abs() / 10.0,
                blend_variable: 0.0,
            }
        }
    }

    /// One minute between any two parcels, intrazonal included.
    pub struct FlatSkims;

    impl ImpedanceLookup for FlatSkims {
        fn value(&self, _: &str, _: Mode, _: PathType, _: u32, _: ParcelId, _: ParcelId) -> SkimValue {
            SkimValue { variable: 1.0, blend_variable: 0.0 }
        }
    }

    /// Adds the adjustment factor with a unit coefficient and remembers
    /// every call.
    #[derive(Default)]
    pub struct Recorder {
        pub calls: Vec<(ParcelId, u32)>,
    }

    impl SamplingUtilities for Recorder {
        fn set_utilities(&mut self, item: &SampleItem, alternative: &mut AlternativeMut<'_>) {
            alternative.add_utility_term(ADJUSTMENT, item.adjustment_factor);
            self.calls.push((item.parcel, item.draw_frequency));
        }
    }

    pub fn config() -> KernelConfig {
        KernelConfig { min_parcel_size: 1.0, max_sampling_attempts: 5, ..KernelConfig::default() }
    }

    pub fn estimation_config() -> KernelConfig {
        KernelConfig { is_in_estimation_mode: true, ..config() }
    }

    /// Segment 0 has sizes everywhere; segment 1 is empty.
    pub fn universe(config: &KernelConfig) -> SamplingUniverse {
        SamplingUniverse::builder(config)
            .zone(ParcelId(0))
            .zone(ParcelId(10))
            .zone(ParcelId(20))
            .parcel(ParcelId(0), ZoneId(0))
            .parcel(ParcelId(1), ZoneId(0))
            .parcel(ParcelId(2), ZoneId(0))
            .parcel(ParcelId(10), ZoneId(1))
            .parcel(ParcelId(11), ZoneId(1))
            .parcel(ParcelId(20), ZoneId(2))
            .parcel(ParcelId(21), ZoneId(2))
            .segment(SegmentSpec::new(100.0).sizes([
                (ParcelId(0), 50.0),
                (ParcelId(1), 100.0),
                (ParcelId(2), 0.5),
                (ParcelId(10), 200.0),
                (ParcelId(11), 100.0),
                (ParcelId(20), 300.0),
            ]))
            .segment(SegmentSpec::new(100.0))
            .build(&LinearSkims)
            .unwrap()
    }

    pub fn calculator(config: &KernelConfig) -> ChoiceProbabilityCalculator {
        let table = CoefficientTable::new("sampling", vec![Coefficient::new(ADJUSTMENT, 1.0)]).unwrap();
        ChoiceProbabilityCalculator::new("destination", Arc::new(table), config)
    }
}

#[cfg(test)]
mod segment {
    use approx::assert_relative_eq;
    use tdm_core::{DestinationScale, KernelConfig, ParcelId, SegmentId, ZoneId};

    use super::helpers::*;
    use crate::{size_from_factors, SamplingError, SamplingUniverse, SegmentSpec};

    #[test]
    fn small_parcels_are_kept_but_not_totalled() {
        let universe = universe(&config());
        let segment = universe.segment(SegmentId(0)).unwrap();
        let zone0 = segment.zone(ZoneId(0)).unwrap();
        assert_relative_eq!(zone0.total_size(), 150.0);
        assert_relative_eq!(zone0.size(2), 0.5);
        assert_eq!(zone0.parcels().len(), 3);
        assert_eq!(universe.parcel_count(), 7);
    }

    #[test]
    fn weights_decay_with_time() {
        let universe = universe(&config());
        let zone0 = universe.segment(SegmentId(0)).unwrap().zone(ZoneId(0)).unwrap();
        // Unconnected intrazonal pair.
        assert_eq!(zone0.weight(ZoneId(0)), 0.0);
        assert_relative_eq!(zone0.weight(ZoneId(1)), (-2.0f64).exp() * 300.0, epsilon = 1e-9);
        assert_relative_eq!(zone0.weight(ZoneId(2)), (-4.0f64).exp() * 300.0, epsilon = 1e-9);
        assert_relative_eq!(zone0.total_weight(), (-2.0f64).exp() * 300.0 + (-4.0f64).exp() * 300.0, epsilon = 1e-9);
    }

    #[test]
    fn rankings_are_descending() {
        let universe = universe(&config());
        let zone0 = universe.segment(SegmentId(0)).unwrap().zone(ZoneId(0)).unwrap();
        let sizes: Vec<f64> = zone0.ranked_sizes().map(|(_, p)| p.size).collect();
        assert_eq!(sizes, vec![100.0, 50.0, 0.5]);
        let zones: Vec<ZoneId> = zone0.ranked_weights().map(|(z, _)| z).collect();
        assert_eq!(zones, vec![ZoneId(1), ZoneId(2), ZoneId(0)]);
    }

    #[test]
    fn zone_scale_fills_missing_intrazonal_time() {
        let config = KernelConfig { destination_scale: DestinationScale::Zone, ..config() };
        let universe = universe(&config);
        let zone0 = universe.segment(SegmentId(0)).unwrap().zone(ZoneId(0)).unwrap();
        // Default skim is auto in-vehicle time: one minute intrazonal.
        assert_relative_eq!(zone0.weight(ZoneId(0)), (-2.0f64).exp() * 150.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_references_are_rejected() {
        let config = config();
        let err = SamplingUniverse::builder(&config)
            .zone(ParcelId(0))
            .parcel(ParcelId(0), ZoneId(3))
            .build(&LinearSkims)
            .unwrap_err();
        assert_eq!(err, SamplingError::UnknownZone(ZoneId(3)));

        let err = SamplingUniverse::builder(&config)
            .zone(ParcelId(0))
            .parcel(ParcelId(0), ZoneId(0))
            .segment(SegmentSpec::new(10.0).size(ParcelId(99), 1.0))
            .build(&LinearSkims)
            .unwrap_err();
        assert_eq!(err, SamplingError::UnknownParcel(ParcelId(99)));

        let err = SamplingUniverse::builder(&config)
            .zone(ParcelId(0))
            .segment(SegmentSpec::new(0.0))
            .build(&LinearSkims)
            .unwrap_err();
        assert!(matches!(err, SamplingError::InvalidWeightFactor { .. }));

        let universe = universe(&config);
        assert_eq!(universe.segment(SegmentId(9)).unwrap_err(), SamplingError::UnknownSegment(SegmentId(9)));
    }

    #[test]
    fn duplicate_parcels_are_rejected() {
        let err = SamplingUniverse::builder(&config())
            .zone(ParcelId(0))
            .zone(ParcelId(10))
            .parcel(ParcelId(0), ZoneId(0))
            .parcel(ParcelId(5), ZoneId(0))
            .parcel(ParcelId(5), ZoneId(1))
            .segment(SegmentSpec::new(100.0).size(ParcelId(5), 10.0))
            .build(&LinearSkims)
            .unwrap_err();
        assert_eq!(err, SamplingError::DuplicateParcel(ParcelId(5)));
    }

    #[test]
    fn size_function() {
        let size = size_from_factors(&[0.0, 2.0f64.ln()], &[1.0, 3.0]);
        assert_relative_eq!(size, 700.0, epsilon = 1e-9);
    }
}

#[cfg(test)]
mod tour {
    use std::collections::HashMap;

    use approx::assert_relative_eq;
    use tdm_choice::DomainChoice;
    use tdm_core::{DestinationScale, EntityId, KernelConfig, ParcelId, RandomStream, SegmentId, ZoneId};

    use super::helpers::*;
    use crate::{DestinationSampler, DrawProbability, SampleKind, SamplingError, SamplingUniverse, SegmentSpec};

    fn tour_probability(kind: DrawProbability) -> f64 {
        match kind {
            DrawProbability::Tour(p) => p,
            DrawProbability::Stop { .. } => panic!("expected a tour probability"),
        }
    }

    #[test]
    fn zero_sample_size_in_application_mode_is_empty() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 0)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(calculator.alternatives().count(), 0);
    }

    #[test]
    fn zero_sample_size_in_estimation_mode_keeps_the_choice() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 0)
            .origin(ParcelId(0))
            .chosen(ParcelId(11))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].parcel, ParcelId(11));
        assert_eq!(items[0].kind, SampleKind::Chosen);
        assert_eq!(items[0].alternative_index, 0);
        assert!(items[0].is_chosen);
        assert_eq!(items[0].adjustment_factor, 0.0);
        assert!(calculator.alternative(0).unwrap().is_chosen());
    }

    #[test]
    fn chosen_parcel_is_always_in_the_sample() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        for entity in 0..200 {
            calculator.reset();
            let mut stream = RandomStream::new(3, EntityId(entity), 0);
            let items = DestinationSampler::new(&universe, SegmentId(0), 3)
                .origin(ParcelId(0))
                .chosen(ParcelId(11))
                .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
                .unwrap();
            let chosen: Vec<_> = items.iter().filter(|i| i.is_chosen).collect();
            assert_eq!(chosen.len(), 1, "entity {entity}");
            assert_eq!(chosen[0].parcel, ParcelId(11));
            assert!(chosen[0].available);
            let alternative = calculator.alternative(chosen[0].alternative_index).unwrap();
            assert!(alternative.is_chosen());
            assert!(items.len() <= 3);
        }
    }

    #[test]
    fn estimation_needs_a_chosen_parcel() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let err = DestinationSampler::new(&universe, SegmentId(0), 5)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, SamplingError::ChosenParcelMissing);
    }

    #[test]
    fn chosen_origin_is_rejected_at_parcel_scale() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let err = DestinationSampler::new(&universe, SegmentId(0), 5)
            .origin(ParcelId(0))
            .chosen(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, SamplingError::ChosenIsOrigin(ParcelId(0)));
        assert_eq!(calculator.alternatives().count(), 0);

        // A zone may be chosen from within itself.
        let config = KernelConfig { destination_scale: DestinationScale::Zone, ..estimation_config() };
        let universe = super::helpers::universe(&config);
        let mut calculator = super::helpers::calculator(&config);
        let items = DestinationSampler::new(&universe, SegmentId(0), 5)
            .origin(ParcelId(0))
            .chosen(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        assert!(items.iter().any(|i| i.is_chosen && i.parcel == ParcelId(0)));
    }

    #[test]
    fn missing_origin_is_reported() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let err = DestinationSampler::new(&universe, SegmentId(0), 5)
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, SamplingError::MissingAnchor("origin"));
    }

    #[test]
    fn repeated_draws_are_coalesced() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(5, EntityId(9), 2);
        let mut recorder = Recorder::default();
        let items = DestinationSampler::new(&universe, SegmentId(0), 30)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut recorder)
            .unwrap();

        // Only three parcels can be drawn from zone 0.
        assert!(items.len() <= 3);
        let total: u32 = items.iter().map(|i| i.draw_frequency).sum();
        assert_eq!(total, 30);
        for (position, item) in items.iter().enumerate() {
            assert_eq!(item.alternative_index, position);
            assert_eq!(item.kind, SampleKind::Drawn);
            let alternative = calculator.alternative(position).unwrap();
            assert_eq!(alternative.domain_choice(), Some(DomainChoice::Parcel { parcel: item.parcel }));
        }
        assert_eq!(recorder.calls.len(), items.len());
    }

    #[test]
    fn adjustment_corrects_for_draw_probability() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(5, EntityId(1), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 10)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        for item in &items {
            let p = tour_probability(item.probability);
            let expected = -(10.0 * p / f64::from(item.draw_frequency)).ln();
            assert_relative_eq!(item.adjustment_factor, expected, epsilon = 1e-12);
            assert!(item.available);
        }
    }

    #[test]
    fn same_stream_same_sample() {
        let config = config();
        let universe = universe(&config);
        let run = || {
            let mut calculator = calculator(&config);
            let mut stream = RandomStream::new(11, EntityId(4), 7);
            DestinationSampler::new(&universe, SegmentId(0), 8)
                .origin(ParcelId(0))
                .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn inclusion_frequency_matches_draw_probability() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let draws = 20_000;
        let mut counts: HashMap<ParcelId, u32> = HashMap::new();
        let mut probabilities: HashMap<ParcelId, f64> = HashMap::new();
        for entity in 0..draws {
            calculator.reset();
            let mut stream = RandomStream::new(17, EntityId(entity), 0);
            let items = DestinationSampler::new(&universe, SegmentId(0), 1)
                .origin(ParcelId(0))
                .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
                .unwrap();
            assert_eq!(items.len(), 1);
            *counts.entry(items[0].parcel).or_default() += 1;
            probabilities.insert(items[0].parcel, tour_probability(items[0].probability));
        }

        let zone1 = 1.0 / (1.0 + (-2.0f64).exp());
        assert_relative_eq!(probabilities[&ParcelId(10)], zone1 * 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(probabilities[&ParcelId(11)], zone1 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(probabilities[&ParcelId(20)], 1.0 - zone1, epsilon = 1e-9);
        for (parcel, count) in &counts {
            let observed = f64::from(*count) / f64::from(draws);
            assert!(
                (observed - probabilities[parcel]).abs() < 0.015,
                "{parcel}: observed {observed}, expected {}",
                probabilities[parcel]
            );
        }
    }

    #[test]
    fn excluded_parcel_is_never_drawn() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        for entity in 0..100 {
            calculator.reset();
            let mut stream = RandomStream::new(2, EntityId(entity), 0);
            let items = DestinationSampler::new(&universe, SegmentId(0), 5)
                .origin(ParcelId(0))
                .excluded(ParcelId(10))
                .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
                .unwrap();
            assert!(items.iter().all(|i| i.parcel != ParcelId(10)));
            if let Some(item) = items.iter().find(|i| i.parcel == ParcelId(11)) {
                // Zone 1 minus the excluded parcel leaves only parcel 11.
                let zone1 = 1.0 / (1.0 + (-2.0f64).exp());
                assert_relative_eq!(tour_probability(item.probability), zone1, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn small_excluded_parcel_leaves_the_zone_size_alone() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        // Zone 0 as seen from zone 2.
        let near = 300.0 * (-2.0f64).exp();
        let zone0 = 150.0 * (-4.0f64).exp() / (150.0 * (-4.0f64).exp() + near);
        let mut found = false;
        for entity in 0..50 {
            calculator.reset();
            let mut stream = RandomStream::new(6, EntityId(entity), 0);
            let items = DestinationSampler::new(&universe, SegmentId(0), 10)
                .origin(ParcelId(20))
                .excluded(ParcelId(2))
                .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
                .unwrap();
            for item in items.iter().filter(|i| i.zone == ZoneId(0)) {
                let size = if item.parcel == ParcelId(1) { 100.0 } else { 50.0 };
                assert_relative_eq!(tour_probability(item.probability), zone0 * size / 150.0, epsilon = 1e-12);
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn small_origin_leaves_the_zone_size_alone() {
        let config = config();
        let universe = SamplingUniverse::builder(&config)
            .zone(ParcelId(0))
            .parcel(ParcelId(0), ZoneId(0))
            .parcel(ParcelId(1), ZoneId(0))
            .parcel(ParcelId(2), ZoneId(0))
            .segment(SegmentSpec::new(100.0).sizes([(ParcelId(0), 0.5), (ParcelId(1), 100.0), (ParcelId(2), 50.0)]))
            .build(&FlatSkims)
            .unwrap();
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(9, EntityId(1), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 6)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        assert!(!items.is_empty());
        for item in &items {
            let size = if item.parcel == ParcelId(1) { 100.0 } else { 50.0 };
            assert_ne!(item.parcel, ParcelId(0));
            assert_relative_eq!(tour_probability(item.probability), size / 150.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn usual_location_sits_after_the_sample() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(8, EntityId(3), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 4)
            .origin(ParcelId(0))
            .usual(ParcelId(1))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        let usual = items.last().unwrap();
        assert_eq!(usual.parcel, ParcelId(1));
        assert_eq!(usual.kind, SampleKind::Usual);
        assert_eq!(usual.alternative_index, 4);
        assert!(!usual.is_chosen);
        assert!(calculator.alternative(4).unwrap().is_available());
    }

    #[test]
    fn zone_scale_draws_key_parcels() {
        let config = KernelConfig { destination_scale: DestinationScale::Zone, ..config() };
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(8, EntityId(3), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 12)
            .origin(ParcelId(1))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        assert!(!items.is_empty());
        for item in &items {
            assert!([ParcelId(0), ParcelId(10), ParcelId(20)].contains(&item.parcel));
        }
    }

    #[test]
    fn empty_segment_exhausts() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(1, EntityId(0), 0);
        let err = DestinationSampler::new(&universe, SegmentId(1), 3)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(
            err,
            SamplingError::SamplingExhausted { anchor: ParcelId(0), total_weight: 0.0, total_size: 0.0 }
        );
    }

    #[test]
    fn sampled_set_can_be_simulated() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(21, EntityId(6), 0);
        let items = DestinationSampler::new(&universe, SegmentId(0), 6)
            .origin(ParcelId(0))
            .sample_tour_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        let chosen = calculator.simulate_choice(&mut stream).unwrap().unwrap();
        let Some(DomainChoice::Parcel { parcel }) = chosen.domain_choice() else {
            panic!("sampled alternatives carry their parcel");
        };
        assert!(items.iter().any(|i| i.parcel == parcel));
    }
}

#[cfg(test)]
mod stops {
    use approx::assert_relative_eq;
    use tdm_core::{EntityId, ParcelId, RandomStream, SegmentId};

    use super::helpers::*;
    use crate::{DestinationSampler, DrawProbability, SampleKind, SamplingError};

    #[test]
    fn split_anchors_and_adjustment() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(4, EntityId(2), 1);
        let items = DestinationSampler::new(&universe, SegmentId(0), 4)
            .tour_origin(ParcelId(0))
            .trip_origin(ParcelId(20))
            .sample_intermediate_stop_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();

        let total: u32 = items.iter().map(|i| i.draw_frequency).sum();
        assert_eq!(total, 4);
        for item in &items {
            let DrawProbability::Stop { tour, trip } = item.probability else {
                panic!("expected stop probabilities");
            };
            let expected = -((2.0 * tour + 2.0 * trip) / f64::from(item.draw_frequency)).ln();
            assert_relative_eq!(item.adjustment_factor, expected, epsilon = 1e-12);
            assert_eq!(item.kind, SampleKind::Drawn);
        }
    }

    #[test]
    fn chosen_stop_is_appended() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(4, EntityId(2), 1);
        let items = DestinationSampler::new(&universe, SegmentId(0), 2)
            .tour_origin(ParcelId(0))
            .trip_origin(ParcelId(20))
            .chosen(ParcelId(1))
            .sample_intermediate_stop_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap();
        let chosen = items.iter().find(|i| i.parcel == ParcelId(1)).unwrap();
        assert!(chosen.is_chosen);
        // Zone 0 is reachable from the trip origin only.
        assert!(chosen.available);
    }

    #[test]
    fn chosen_trip_origin_is_rejected() {
        let config = estimation_config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(4, EntityId(2), 1);
        let err = DestinationSampler::new(&universe, SegmentId(0), 2)
            .tour_origin(ParcelId(0))
            .trip_origin(ParcelId(20))
            .chosen(ParcelId(20))
            .sample_intermediate_stop_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, SamplingError::ChosenIsOrigin(ParcelId(20)));
    }

    #[test]
    fn both_anchors_are_required() {
        let config = config();
        let universe = universe(&config);
        let mut calculator = calculator(&config);
        let mut stream = RandomStream::new(4, EntityId(2), 1);
        let err = DestinationSampler::new(&universe, SegmentId(0), 2)
            .tour_origin(ParcelId(0))
            .sample_intermediate_stop_destinations(&mut calculator, &mut stream, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, SamplingError::MissingAnchor("trip origin"));
    }
}
