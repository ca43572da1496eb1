//! Unit tests for tdm-core primitives.

#[cfg(test)]
mod ids {
    use crate::{CoefficientId, EntityId, ParcelId, ZoneId};

    #[test]
    fn index_roundtrip() {
        let id = EntityId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(EntityId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(EntityId::INVALID.0, u32::MAX);
        assert_eq!(ParcelId::INVALID.0, u32::MAX);
        assert_eq!(CoefficientId::INVALID.0, u16::MAX);
        assert!(!ZoneId::default().is_valid());
    }

    #[test]
    fn coefficient_id_out_of_range() {
        assert!(CoefficientId::try_from(70_000usize).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(ParcelId(7).to_string(), "ParcelId(7)");
    }

    #[test]
    fn serde_transparent() {
        let json = serde_json::to_string(&ParcelId(12)).unwrap();
        assert_eq!(json, "12");
        let back: ParcelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ParcelId(12));
    }
}

#[cfg(test)]
mod rng {
    use crate::{EntityId, RandomStream};

    #[test]
    fn same_key_same_sequence() {
        let mut a = RandomStream::new(99, EntityId(5), 3);
        let mut b = RandomStream::new(99, EntityId(5), 3);
        for _ in 0..100 {
            assert_eq!(a.uniform01(), b.uniform01());
        }
    }

    #[test]
    fn different_offsets_diverge() {
        let mut a = RandomStream::new(99, EntityId(5), 0);
        let mut b = RandomStream::new(99, EntityId(5), 1);
        assert_ne!(a.uniform01(), b.uniform01());
    }

    #[test]
    fn different_entities_diverge() {
        let mut a = RandomStream::new(1, EntityId(0), 0);
        let mut b = RandomStream::new(1, EntityId(1), 0);
        assert_ne!(a.uniform01(), b.uniform01());
    }

    #[test]
    fn entity_and_offset_do_not_commute() {
        let mut a = RandomStream::new(1, EntityId(2), 3);
        let mut b = RandomStream::new(1, EntityId(3), 2);
        assert_ne!(a.uniform01(), b.uniform01());
    }

    #[test]
    fn uniform_in_open_interval() {
        let mut s = RandomStream::new(0, EntityId(0), 0);
        for _ in 0..10_000 {
            let u = s.uniform01();
            assert!(u > 0.0 && u < 1.0);
        }
    }

    #[test]
    fn substream_ignores_position() {
        let fresh = RandomStream::new(7, EntityId(1), 0);
        let mut used = RandomStream::new(7, EntityId(1), 0);
        for _ in 0..10 {
            used.uniform01();
        }
        let mut x = fresh.substream(4);
        let mut y = used.substream(4);
        assert_eq!(x.uniform01(), y.uniform01());
    }

    #[test]
    fn seed_values_reproducible() {
        let mut a = RandomStream::new(3, EntityId(8), 2);
        let mut b = RandomStream::new(3, EntityId(8), 2);
        let va = a.seed_values(16);
        assert_eq!(va.len(), 16);
        assert_eq!(va, b.seed_values(16));
    }

    #[test]
    fn normal_moments() {
        let mut s = RandomStream::new(11, EntityId(0), 0);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| s.normal(2.0, 0.5)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.02, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.02, "sd {}", var.sqrt());
    }

    #[test]
    fn log_normal_degenerate_inputs() {
        let mut s = RandomStream::new(11, EntityId(0), 0);
        assert_eq!(s.log_normal(0.0, 1.0), 0.0);
        assert_eq!(s.log_normal(1.0, -1.0), 0.0);
        assert!(s.log_normal(1.0, 0.3) > 0.0);
    }
}

#[cfg(test)]
mod coefficients {
    use approx::assert_relative_eq;

    use crate::{Coefficient, CoefficientId, CoefficientKind, CoefficientTable, KernelError};

    fn table() -> CoefficientTable {
        CoefficientTable::new(
            "toy",
            vec![
                Coefficient::new(CoefficientId(1), -0.5).with_label("time"),
                Coefficient::new(CoefficientId(4), 0.2).with_kind(CoefficientKind::SizeVariable),
                Coefficient::new(CoefficientId(5), 0.8).with_kind(CoefficientKind::SizeFunctionMultiplier),
            ],
        )
        .unwrap()
    }

    #[test]
    fn sparse_lookup() {
        let t = table();
        assert_eq!(t.get(CoefficientId(1)).map(|c| c.value), Some(-0.5));
        assert!(t.get(CoefficientId(2)).is_none());
        assert!(t.get(CoefficientId(400)).is_none());
        assert_eq!(t.id_span(), 6);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn size_function_multiplier_found() {
        assert_relative_eq!(table().size_function_multiplier(), 0.8);
        let empty = CoefficientTable::new("empty", vec![]).unwrap();
        assert_relative_eq!(empty.size_function_multiplier(), 1.0);
        assert!(empty.is_empty());
    }

    #[test]
    fn duplicate_rejected() {
        let result = CoefficientTable::new(
            "dup",
            vec![Coefficient::new(CoefficientId(1), 1.0), Coefficient::new(CoefficientId(1), 2.0)],
        );
        assert!(matches!(result, Err(KernelError::DuplicateCoefficient(CoefficientId(1)))));
    }

    #[test]
    fn value_missing_is_error() {
        assert!(matches!(
            table().value(CoefficientId(3)),
            Err(KernelError::CoefficientNotFound(_))
        ));
    }

    #[test]
    fn display_label_fallback() {
        let t = table();
        assert_eq!(t.get(CoefficientId(1)).unwrap().display_label(), "time");
        assert_eq!(t.get(CoefficientId(4)).unwrap().display_label(), "par_4");
    }

    #[test]
    fn json_round_trip() {
        let json = r#"{
            "title": "work location",
            "coefficients": [
                {"id": 1, "label": "adj", "value": 1.0, "fixed": true},
                {"id": 2, "value": -0.1},
                {"id": 9, "value": 0.6, "kind": "nest"}
            ]
        }"#;
        let t = CoefficientTable::from_json_str(json).unwrap();
        assert_eq!(t.title(), "work location");
        assert!(t.get(CoefficientId(1)).unwrap().fixed);
        assert_eq!(t.get(CoefficientId(9)).unwrap().kind, CoefficientKind::Nest);
    }

    #[test]
    fn json_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coefficients.json");
        std::fs::write(&path, r#"{"title": "t", "coefficients": [{"id": 0, "value": 2.5}]}"#).unwrap();
        let t = CoefficientTable::from_json_path(&path).unwrap();
        assert_relative_eq!(t.value(CoefficientId(0)).unwrap(), 2.5);
    }
}

#[cfg(test)]
mod config {
    use crate::{DestinationScale, KernelConfig};

    #[test]
    fn defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.minutes_in_day, 1440);
        assert_eq!(cfg.max_sampling_attempts, 1000);
        assert_eq!(cfg.destination_scale, DestinationScale::Parcel);
        assert!(cfg.oddball.nested);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = KernelConfig::from_json_str(
            r#"{"seed": 7, "destination_scale": "zone", "oddball": {"nested": false}}"#,
        )
        .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.destination_scale, DestinationScale::Zone);
        assert!(!cfg.oddball.nested);
        assert!(cfg.oddball.unavailable_in_estimation);
        assert_eq!(cfg.households_per_batch, 256);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(KernelConfig::from_json_str(r#"{"minutes_in_day": 0}"#).is_err());
        assert!(KernelConfig::from_json_str(r#"{"num_threads": 0}"#).is_err());
        assert!(KernelConfig::from_json_str(r#"{"seed": "x"}"#).is_err());
    }

    #[test]
    fn clamp_utility() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.clamp_utility(-500.0), -80.0);
        assert_eq!(cfg.clamp_utility(3.0), 3.0);
    }

    #[test]
    fn worker_count_resolves() {
        let mut cfg = KernelConfig::default();
        cfg.num_threads = Some(3);
        assert_eq!(cfg.worker_count(), 3);
        cfg.num_threads = None;
        assert!(cfg.worker_count() >= 1);
    }
}

#[cfg(test)]
mod modes {
    use crate::{Mode, Purpose};

    #[test]
    fn labels() {
        assert_eq!(Mode::ParkAndRide.to_string(), "park_and_ride");
        assert_eq!(Purpose::PersonalBusiness.as_str(), "personal_business");
    }

    #[test]
    fn auto_modes() {
        assert!(Mode::Sov.is_auto());
        assert!(!Mode::Transit.is_auto());
    }

    #[test]
    fn tour_index() {
        assert_eq!(Purpose::Work.tour_index(), Some(0));
        assert_eq!(Purpose::Social.tour_index(), Some(6));
        assert_eq!(Purpose::NoneOrHome.tour_index(), None);
    }
}
