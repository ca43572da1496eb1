//! Unit tests for tdm-choice.

#[cfg(test)]
mod helpers {
    use std::sync::Arc;

    use tdm_core::{Coefficient, CoefficientId, CoefficientKind, CoefficientTable, KernelConfig};

    use crate::ChoiceProbabilityCalculator;

    /// Unit utility coefficient: `add_utility_term(UNIT, v)` adds exactly `v`.
    pub const UNIT: CoefficientId = CoefficientId(0);
    pub const HALF: CoefficientId = CoefficientId(1);
    pub const THETA: CoefficientId = CoefficientId(2);
    pub const BASE_SIZE: CoefficientId = CoefficientId(3);
    pub const SIZE: CoefficientId = CoefficientId(4);
    pub const SIZE_MULT: CoefficientId = CoefficientId(5);
    pub const UPPER_THETA: CoefficientId = CoefficientId(6);
    pub const BAD_THETA: CoefficientId = CoefficientId(7);
    pub const UNDEFINED: CoefficientId = CoefficientId(40);

    pub fn table() -> Arc<CoefficientTable> {
        Arc::new(
            CoefficientTable::new("test", vec![
                Coefficient::new(UNIT, 1.0),
                Coefficient::new(HALF, 0.5),
                Coefficient::new(THETA, 0.5).with_kind(CoefficientKind::Nest),
                Coefficient::new(BASE_SIZE, 0.0).with_kind(CoefficientKind::BaseSizeVariable),
                Coefficient::new(SIZE, 3.0_f64.ln()).with_kind(CoefficientKind::SizeVariable),
                Coefficient::new(SIZE_MULT, 0.5).with_kind(CoefficientKind::SizeFunctionMultiplier),
                Coefficient::new(UPPER_THETA, 0.8).with_kind(CoefficientKind::Nest),
                Coefficient::new(BAD_THETA, 1.5).with_kind(CoefficientKind::Nest),
            ])
            .unwrap(),
        )
    }

    pub fn calculator() -> ChoiceProbabilityCalculator {
        ChoiceProbabilityCalculator::new("test", table(), &KernelConfig::default())
    }

    pub fn estimation_calculator() -> ChoiceProbabilityCalculator {
        let config = KernelConfig { is_in_estimation_mode: true, ..KernelConfig::default() };
        ChoiceProbabilityCalculator::new("test", table(), &config)
    }

    /// Flat choice set with the given utilities, all available.
    pub fn flat(calc: &mut ChoiceProbabilityCalculator, utilities: &[f64]) {
        calc.reset();
        for (i, &u) in utilities.iter().enumerate() {
            calc.get_alternative(i, true, false).add_utility_term(UNIT, u);
        }
    }

    pub fn probabilities(calc: &ChoiceProbabilityCalculator) -> Vec<f64> {
        calc.alternatives().map(|a| a.probability()).collect()
    }
}

#[cfg(test)]
mod multinomial {
    use approx::assert_abs_diff_eq;
    use tdm_core::{EntityId, RandomStream};

    use super::helpers::*;

    #[test]
    fn two_alternative_softmax() {
        let mut calc = calculator();
        flat(&mut calc, &[2.0, 1.0]);
        let logsum = calc.compute_logsum().unwrap();

        assert_abs_diff_eq!(logsum, (2.0_f64.exp() + 1.0_f64.exp()).ln(), epsilon = 1e-12);
        let p = probabilities(&calc);
        assert_abs_diff_eq!(p[0], 0.731, epsilon = 5e-4);
        assert_abs_diff_eq!(p[1], 0.269, epsilon = 5e-4);
    }

    #[test]
    fn unavailable_alternatives_get_zero() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_term(UNIT, 1.0);
        calc.get_alternative(1, false, false).add_utility_term(UNIT, 50.0);
        calc.get_alternative(2, true, false).add_utility_term(UNIT, 1.0);
        calc.compute_logsum().unwrap();

        let p = probabilities(&calc);
        assert_eq!(p[1], 0.0);
        assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn nothing_available() {
        let mut calc = calculator();
        calc.get_alternative(0, false, false).add_utility_term(UNIT, 1.0);
        assert_eq!(calc.compute_logsum().unwrap(), 0.0);

        let mut stream = RandomStream::new(1, EntityId(1), 0);
        assert!(calc.simulate_choice(&mut stream).unwrap().is_none());
    }

    #[test]
    fn empty_choice_set() {
        let mut calc = calculator();
        assert_eq!(calc.compute_logsum().unwrap(), 0.0);
    }

    #[test]
    fn huge_utilities_do_not_overflow() {
        let mut calc = calculator();
        flat(&mut calc, &[1000.0, 999.0]);
        let logsum = calc.compute_logsum().unwrap();
        assert!(logsum.is_finite());
        let p = probabilities(&calc);
        assert_abs_diff_eq!(p[0], 0.7310585786, epsilon = 1e-9);
        assert_abs_diff_eq!(p[0] + p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_value_term_is_noop() {
        let mut calc = calculator();
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_utility_term(HALF, 2.0);
        alt.add_utility_term(HALF, 0.0);
        assert_eq!(alt.utility(), 1.0);
    }

    #[test]
    fn undefined_coefficient_is_skipped() {
        let mut calc = calculator();
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_utility_term(UNDEFINED, 5.0);
        assert_eq!(alt.utility(), 0.0);
    }

    #[test]
    fn reset_drops_previous_invocation() {
        let mut calc = calculator();
        flat(&mut calc, &[1.0, 2.0, 3.0]);
        calc.reset();
        calc.get_alternative(0, true, false);
        assert_eq!(calc.alternatives().count(), 1);
        assert!(calc.alternative(2).is_none());
    }
}

#[cfg(test)]
mod nested {
    use approx::assert_abs_diff_eq;
    use tdm_core::NestId;

    use super::helpers::*;
    use crate::ChoiceError;

    const NEST: NestId = NestId(0);

    #[test]
    fn nest_logsum_and_unnested_probability() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_term(UNIT, 1.0);
        calc.get_alternative(1, true, false).add_utility_term(UNIT, 1.2);
        calc.get_alternative(2, true, false).add_utility_term(UNIT, 0.8);
        calc.alternative_mut(0).unwrap().add_nested_alternative(NEST, THETA);
        calc.alternative_mut(1).unwrap().add_nested_alternative(NEST, THETA);

        let root = calc.compute_logsum().unwrap();

        let nest_logsum = (1.0 / 0.5) * (0.5_f64.exp() + 0.6_f64.exp()).ln();
        assert_abs_diff_eq!(calc.nest(NEST).unwrap().logsum().unwrap(), nest_logsum, epsilon = 1e-12);

        let nest_term = 0.5 * nest_logsum;
        let expected_root = (0.8_f64.exp() + nest_term.exp()).ln();
        assert_abs_diff_eq!(root, expected_root, epsilon = 1e-12);

        let p_unnested = 0.8_f64.exp() / (0.8_f64.exp() + nest_term.exp());
        let p = probabilities(&calc);
        assert_abs_diff_eq!(p[2], p_unnested, epsilon = 1e-12);

        // Within-nest split follows exp(θV).
        let within = 0.5_f64.exp() / (0.5_f64.exp() + 0.6_f64.exp());
        assert_abs_diff_eq!(p[0], (1.0 - p_unnested) * within, epsilon = 1e-12);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn repeated_declaration_is_idempotent() {
        let build = |repeat: bool| {
            let mut calc = calculator();
            for (i, u) in [1.0, 1.2].into_iter().enumerate() {
                let mut alt = calc.get_alternative(i, true, false);
                alt.add_utility_term(UNIT, u);
                alt.add_nested_alternative(NEST, THETA);
                if repeat {
                    alt.add_nested_alternative(NEST, THETA);
                }
            }
            calc.get_alternative(2, true, false).add_utility_term(UNIT, 0.8);
            calc.compute_logsum().unwrap()
        };
        assert_eq!(build(false), build(true));
    }

    #[test]
    fn declaration_order_within_a_nest_does_not_matter() {
        // The same three options, built with the nest members in opposite
        // index order.
        let build = |members: [(usize, f64); 2]| {
            let mut calc = calculator();
            for (index, u) in members {
                let mut alt = calc.get_alternative(index, true, false);
                alt.add_utility_term(UNIT, u);
                alt.add_nested_alternative(NEST, THETA);
            }
            calc.get_alternative(2, true, false).add_utility_term(UNIT, 0.8);
            let logsum = calc.compute_logsum().unwrap();
            let p = probabilities(&calc);
            (logsum, p)
        };
        let (a_logsum, a) = build([(0, 1.0), (1, 1.2)]);
        let (b_logsum, b) = build([(1, 1.0), (0, 1.2)]);
        assert_abs_diff_eq!(a_logsum, b_logsum, epsilon = 1e-12);
        assert_abs_diff_eq!(a[0], b[1], epsilon = 1e-12);
        assert_abs_diff_eq!(a[1], b[0], epsilon = 1e-12);
        assert_abs_diff_eq!(a[2], b[2], epsilon = 1e-12);
    }

    #[test]
    fn empty_nest_is_omitted() {
        let mut calc = calculator();
        let mut a = calc.get_alternative(0, false, false);
        a.add_utility_term(UNIT, 3.0);
        a.add_nested_alternative(NEST, THETA);
        calc.get_alternative(1, true, false).add_utility_term(UNIT, 1.0);

        let root = calc.compute_logsum().unwrap();
        assert_abs_diff_eq!(root, 1.0, epsilon = 1e-12);
        assert!(calc.nest(NEST).unwrap().logsum().is_none());
        assert_eq!(calc.nest(NEST).unwrap().probability(), 0.0);
        assert_abs_diff_eq!(calc.alternative(1).unwrap().probability(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn two_level_nesting() {
        let inner = NestId(1);
        let outer = NestId(2);
        let mut calc = calculator();
        for (i, u) in [0.3, 0.9].into_iter().enumerate() {
            let mut alt = calc.get_alternative(i, true, false);
            alt.add_utility_term(UNIT, u);
            alt.add_nested_alternative(inner, THETA);
        }
        {
            let mut alt = calc.get_alternative(2, true, false);
            alt.add_utility_term(UNIT, 0.1);
            alt.add_nested_alternative(outer, UPPER_THETA);
        }
        calc.get_alternative(3, true, false).add_utility_term(UNIT, -0.4);
        calc.nest_mut(inner).unwrap().add_nested_alternative(outer, UPPER_THETA);

        let root = calc.compute_logsum().unwrap();

        let s_inner = ((0.5 * 0.3_f64).exp() + (0.5 * 0.9_f64).exp()).ln();
        let s_outer = ((0.8 * s_inner).exp() + (0.8 * 0.1_f64).exp()).ln();
        let expected = (s_outer.exp() + (-0.4_f64).exp()).ln();
        assert_abs_diff_eq!(root, expected, epsilon = 1e-12);

        let p = probabilities(&calc);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        let p_outer = (s_outer - root).exp();
        let p_inner = (0.8 * s_inner - s_outer).exp() * p_outer;
        assert_abs_diff_eq!(calc.nest(inner).unwrap().probability(), p_inner, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], (0.5 * 0.9 - s_inner).exp() * p_inner, epsilon = 1e-12);
    }

    #[test]
    fn missing_theta_defaults_to_one() {
        let mut calc = calculator();
        for (i, u) in [1.0, 2.0].into_iter().enumerate() {
            let mut alt = calc.get_alternative(i, true, false);
            alt.add_utility_term(UNIT, u);
            alt.add_nested_alternative(NEST, UNDEFINED);
        }
        let root = calc.compute_logsum().unwrap();
        assert_eq!(calc.nest(NEST).unwrap().theta(), 1.0);
        assert_abs_diff_eq!(root, (1.0_f64.exp() + 2.0_f64.exp()).ln(), epsilon = 1e-12);
    }

    #[test]
    fn theta_above_one_is_rejected() {
        let mut calc = calculator();
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_utility_term(UNIT, 1.0);
        alt.add_nested_alternative(NEST, BAD_THETA);
        assert_eq!(
            calc.compute_logsum(),
            Err(ChoiceError::InvalidTheta { nest: NEST, theta: 1.5 })
        );
    }

    #[test]
    fn nest_cycle_is_reported() {
        let mut calc = calculator();
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_utility_term(UNIT, 1.0);
        alt.add_nested_alternative(NestId(0), THETA);
        calc.nest_mut(NestId(0)).unwrap().add_nested_alternative(NestId(1), THETA);
        calc.nest_mut(NestId(1)).unwrap().add_nested_alternative(NestId(0), THETA);
        assert!(matches!(calc.compute_logsum(), Err(ChoiceError::NestCycle { .. })));
    }

    #[test]
    fn invalid_nest_id_is_ignored() {
        let mut calc = calculator();
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_nested_alternative(NestId::INVALID, THETA);
        assert!(calc.alternative(0).unwrap().nest().is_none());
        assert!(calc.nest_mut(NestId::INVALID).is_none());
    }
}

#[cfg(test)]
mod terms {
    use approx::assert_abs_diff_eq;
    use tdm_core::{CoefficientId, ComponentId};

    use super::helpers::*;
    use crate::ChoiceError;

    #[test]
    fn size_terms_enter_as_scaled_log() {
        let mut calc = calculator();
        {
            let mut alt = calc.get_alternative(0, true, false);
            alt.add_utility_term(UNIT, 1.0);
            alt.add_utility_term(BASE_SIZE, 4.0);
            alt.add_utility_term(SIZE, 2.0); // 2 * exp(ln 3) = 6
            alt.add_utility_term(SIZE_MULT, 100.0); // never a term
            assert_abs_diff_eq!(alt.size(), 10.0, epsilon = 1e-12);
            assert_eq!(alt.utility(), 1.0);
        }
        calc.compute_logsum().unwrap();
        let expected = 1.0 + 10.0_f64.ln() * 0.5;
        assert_abs_diff_eq!(calc.alternative(0).unwrap().utility(), expected, epsilon = 1e-12);
    }

    #[test]
    fn tiny_size_adds_nothing() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_term(BASE_SIZE, 1e-12);
        calc.compute_logsum().unwrap();
        assert_eq!(calc.alternative(0).unwrap().utility(), 0.0);
    }

    #[test]
    fn shared_component_folds_into_every_referencing_alternative() {
        let mut calc = calculator();
        let shared = ComponentId(3);
        calc.create_utility_component(shared).add_utility_term(HALF, 2.0);

        for i in 0..3 {
            let mut alt = calc.get_alternative(i, true, false);
            alt.add_utility_term(UNIT, i as f64);
            alt.add_utility_component(shared);
        }
        calc.compute_logsum().unwrap();

        for i in 0..3 {
            assert_abs_diff_eq!(calc.alternative(i).unwrap().utility(), i as f64 + 1.0, epsilon = 1e-12);
        }
        // The component itself is untouched.
        assert_eq!(calc.get_utility_component(shared).unwrap().utility(), 1.0);
    }

    #[test]
    fn size_component_adds_to_size() {
        let mut calc = calculator();
        let c = ComponentId(0);
        calc.create_size_component(c).add_utility_term(BASE_SIZE, 3.0);
        let mut alt = calc.get_alternative(0, true, false);
        alt.add_utility_term(BASE_SIZE, 1.0);
        alt.add_size_component(c);
        calc.compute_logsum().unwrap();
        assert_abs_diff_eq!(calc.alternative(0).unwrap().utility(), 4.0_f64.ln() * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn unknown_component_is_reported_at_evaluation() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_component(ComponentId(9));
        assert_eq!(
            calc.compute_logsum(),
            Err(ChoiceError::UnknownComponent { alternative: 0, component: ComponentId(9) })
        );
    }

    #[test]
    fn non_finite_value_is_reported_at_evaluation() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_term(UNIT, 1.0);
        calc.get_alternative(1, true, false).add_utility_term(HALF, f64::NAN);
        match calc.compute_logsum() {
            Err(ChoiceError::NonFiniteUtility { alternative, coefficient, value }) => {
                assert_eq!(alternative, 1);
                assert_eq!(coefficient, HALF);
                assert!(value.is_nan());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_finite_on_unavailable_alternative_is_ignored() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).add_utility_term(UNIT, 1.0);
        calc.get_alternative(1, false, false).add_utility_term(UNIT, f64::INFINITY);
        assert!(calc.compute_logsum().is_ok());
    }

    #[test]
    fn non_finite_in_component_is_reported() {
        let mut calc = calculator();
        calc.create_utility_component(ComponentId(0)).add_utility_term(CoefficientId(0), f64::INFINITY);
        calc.get_alternative(0, true, false).add_utility_component(ComponentId(0));
        assert!(matches!(
            calc.compute_logsum(),
            Err(ChoiceError::NonFiniteUtility { alternative: 0, .. })
        ));
    }
}

#[cfg(test)]
mod simulation {
    use tdm_core::{EntityId, KernelConfig, RandomStream};

    use super::helpers::*;
    use crate::ChoiceProbabilityCalculator;

    #[test]
    fn same_key_same_choice() {
        let mut calc = calculator();
        for entity in 0..50 {
            flat(&mut calc, &[0.2, 0.5, -0.3, 1.1]);
            let a = calc
                .simulate_choice(&mut RandomStream::new(7, EntityId(entity), 2))
                .unwrap()
                .map(|a| a.index());
            flat(&mut calc, &[0.2, 0.5, -0.3, 1.1]);
            let b = calc
                .simulate_choice(&mut RandomStream::new(7, EntityId(entity), 2))
                .unwrap()
                .map(|a| a.index());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn only_available_alternatives_are_drawn() {
        let mut calc = calculator();
        for entity in 0..200 {
            calc.reset();
            calc.get_alternative(0, false, false).add_utility_term(UNIT, 5.0);
            calc.get_alternative(1, true, false).add_utility_term(UNIT, 0.0);
            calc.get_alternative(2, false, false);
            let chosen = calc
                .simulate_choice(&mut RandomStream::new(3, EntityId(entity), 0))
                .unwrap()
                .unwrap();
            assert_eq!(chosen.index(), 1);
        }
    }

    #[test]
    fn empirical_shares_match_probabilities() {
        let mut calc = calculator();
        let n = 20_000;
        let mut counts = [0u32; 3];
        for entity in 0..n {
            flat(&mut calc, &[1.0, 0.0, -1.0]);
            let chosen = calc
                .simulate_choice(&mut RandomStream::new(11, EntityId(entity), 0))
                .unwrap()
                .unwrap()
                .index();
            counts[chosen] += 1;
        }
        let probs = probabilities(&calc);
        for (count, p) in counts.iter().zip(probs) {
            let share = *count as f64 / n as f64;
            assert!((share - p).abs() < 0.015, "share {share} vs p {p}");
        }
    }

    #[test]
    fn observed_tally() {
        let config = KernelConfig { test_estimation_in_application_mode: true, ..KernelConfig::default() };
        let mut calc = ChoiceProbabilityCalculator::new("test", table(), &config);

        flat(&mut calc, &[0.0, 0.0]);
        let chosen = calc
            .simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(0), 0), 1)
            .unwrap()
            .unwrap()
            .index();
        let tally = calc.tally();
        assert_eq!(tally.alternatives[1].chosen_and_available, 1);
        assert_eq!(tally.alternatives[chosen].predicted, 1);
        assert_eq!(tally.alternatives[0].available, 1);
        assert!((tally.alternatives[0].total_probability - 0.5).abs() < 1e-12);

        // Observed alternative unavailable.
        calc.reset();
        calc.get_alternative(0, true, false);
        calc.get_alternative(1, false, false);
        calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(1), 0), 1).unwrap();
        assert_eq!(calc.tally().alternatives[1].chosen_not_available, 1);

        // Observed alternative the only one available.
        calc.reset();
        calc.get_alternative(0, false, false);
        calc.get_alternative(1, true, false);
        calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(2), 0), 1).unwrap();
        assert_eq!(calc.tally().alternatives[1].chosen_only_available, 1);
    }

    #[test]
    fn observed_outside_the_choice_set_is_not_tallied() {
        let config = KernelConfig { test_estimation_in_application_mode: true, ..KernelConfig::default() };
        let mut calc = ChoiceProbabilityCalculator::new("test", table(), &config);

        flat(&mut calc, &[0.0, 0.0]);
        let chosen = calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(0), 0), usize::MAX).unwrap();
        assert!(chosen.is_some());
        assert!(calc.tally().alternatives.is_empty());

        flat(&mut calc, &[0.0, 0.0]);
        calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(1), 0), 1_000_000).unwrap();
        assert!(calc.tally().alternatives.is_empty());

        // A slot left over from an earlier, larger choice set is not present.
        flat(&mut calc, &[0.0, 0.0, 0.0]);
        flat(&mut calc, &[0.0, 0.0]);
        calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(2), 0), 2).unwrap();
        assert!(calc.tally().alternatives.is_empty());
    }

    #[test]
    fn tally_off_by_default() {
        let mut calc = calculator();
        flat(&mut calc, &[0.0, 0.0]);
        calc.simulate_choice_with_observed(&mut RandomStream::new(1, EntityId(0), 0), 1).unwrap();
        assert!(calc.tally().alternatives.is_empty());
    }
}

#[cfg(test)]
mod estimation {
    use tdm_core::{ComponentId, KernelConfig};

    use super::helpers::*;
    use crate::{ChoiceError, ChoiceProbabilityCalculator, DomainChoice, ObservationOutcome, RejectionReason};

    #[test]
    fn accepted_observation_records_every_candidate() {
        let mut calc = estimation_calculator();
        calc.reset();
        calc.start_observation(42);
        calc.create_utility_component(ComponentId(0)).add_utility_term(HALF, 1.0);
        for i in 0..3 {
            let mut alt = calc.get_alternative(i, i != 2, i == 1);
            alt.add_utility_term(UNIT, i as f64);
            alt.add_utility_term(HALF, 0.0);
            alt.add_utility_component(ComponentId(0));
            alt.set_domain_choice(DomainChoice::Index { index: i as u32 });
        }

        let ObservationOutcome::Accepted(record) = calc.write_observation().unwrap() else {
            panic!("observation rejected");
        };
        assert_eq!(record.key, 42);
        assert_eq!(record.chosen, 1);
        assert_eq!(record.alternatives.len(), 3);
        let chosen = record.chosen_alternative().unwrap();
        assert!(chosen.probability > 0.0);
        // own UNIT, own HALF (zero), component HALF
        assert_eq!(chosen.terms.len(), 3);
        assert!(!record.alternatives[2].available_in_summary);

        let summary = calc.summary();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.alternatives[1].chosen, 1);
        assert_eq!(summary.alternatives[0].available, 1);
        assert_eq!(summary.alternatives[2].available, 0);
        let half = summary.coefficients[&HALF];
        assert_eq!(half.non_zero, 3);
        assert_eq!(half.total, 3.0);
    }

    #[test]
    fn rejections_are_counted() {
        let mut calc = estimation_calculator();
        calc.get_alternative(0, true, false);
        assert_eq!(
            calc.write_observation().unwrap(),
            ObservationOutcome::Rejected(RejectionReason::NoChosenAlternative)
        );

        calc.reset();
        calc.get_alternative(0, true, true);
        calc.get_alternative(1, true, true);
        assert_eq!(
            calc.write_observation().unwrap(),
            ObservationOutcome::Rejected(RejectionReason::MultipleChosen(2))
        );

        calc.reset();
        calc.get_alternative(0, true, true).add_utility_term(BASE_SIZE, 0.0);
        assert_eq!(
            calc.write_observation().unwrap(),
            ObservationOutcome::Rejected(RejectionReason::ZeroSizeChosen)
        );
        assert_eq!(calc.summary().rejected, 3);
        assert_eq!(calc.summary().accepted, 0);
    }

    #[test]
    fn zero_size_candidates_drop_out_of_summary_availability() {
        let mut calc = estimation_calculator();
        calc.get_alternative(0, true, true).add_utility_term(BASE_SIZE, 5.0);
        calc.get_alternative(1, true, false).add_utility_term(BASE_SIZE, 0.0);
        let ObservationOutcome::Accepted(record) = calc.write_observation().unwrap() else {
            panic!("observation rejected");
        };
        assert!(record.alternatives[0].available_in_summary);
        assert!(!record.alternatives[1].available_in_summary);
    }

    #[test]
    fn application_mode_refuses_to_write() {
        let mut calc = calculator();
        calc.get_alternative(0, true, true);
        assert!(matches!(calc.write_observation(), Err(ChoiceError::NotInEstimationMode { .. })));
    }

    #[test]
    fn oddball_forced_unavailable_and_unnested_in_estimation() {
        let mut calc = estimation_calculator();
        let mut alt = calc.get_oddball_alternative(0, true, false);
        alt.add_nested_alternative(tdm_core::NestId(0), THETA);
        assert!(!alt.is_available());
        let alt = calc.alternative(0).unwrap();
        assert!(alt.is_oddball());
        assert!(alt.nest().is_none());
    }

    #[test]
    fn oddball_nesting_toggle_in_application() {
        let mut config = KernelConfig::default();
        config.oddball.nested = false;
        let mut calc = ChoiceProbabilityCalculator::new("test", table(), &config);
        let mut alt = calc.get_oddball_alternative(0, true, false);
        alt.add_nested_alternative(tdm_core::NestId(0), THETA);
        assert!(alt.is_available());
        assert!(calc.alternative(0).unwrap().nest().is_none());

        let mut calc = calculator();
        calc.get_oddball_alternative(0, true, false).add_nested_alternative(tdm_core::NestId(0), THETA);
        assert_eq!(calc.alternative(0).unwrap().nest(), Some(tdm_core::NestId(0)));
    }

    #[test]
    fn summaries_merge() {
        let mut a = estimation_calculator();
        a.get_alternative(0, true, true).add_utility_term(UNIT, 1.0);
        a.write_observation().unwrap();
        let mut b = estimation_calculator();
        b.get_alternative(0, true, false);
        b.write_observation().unwrap();

        let mut merged = a.summary().clone();
        merged.merge(b.summary());
        assert_eq!(merged.accepted, 1);
        assert_eq!(merged.rejected, 1);
        assert_eq!(merged.coefficients[&UNIT].total, 1.0);
    }

    #[test]
    fn rejection_codes_are_distinct() {
        let codes = [
            RejectionReason::NoChosenAlternative.code(),
            RejectionReason::MultipleChosen(2).code(),
            RejectionReason::ZeroSizeChosen.code(),
            RejectionReason::MissingParcel.code(),
            RejectionReason::SameOriginAndDestination.code(),
            RejectionReason::ZoneOutOfRange.code(),
        ];
        assert_eq!(codes, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn excluded_records_count_as_rejected() {
        let mut calc = estimation_calculator();
        calc.start_observation(12);
        for reason in [
            RejectionReason::MissingParcel,
            RejectionReason::SameOriginAndDestination,
            RejectionReason::ZoneOutOfRange,
        ] {
            calc.reset();
            assert_eq!(calc.exclude_observation(reason).unwrap(), ObservationOutcome::Rejected(reason));
        }
        assert_eq!(calc.summary().rejected, 3);
        assert_eq!(calc.summary().accepted, 0);

        let mut application = calculator();
        assert!(matches!(
            application.exclude_observation(RejectionReason::MissingParcel),
            Err(ChoiceError::NotInEstimationMode { .. })
        ));
    }
}

#[cfg(test)]
mod region {
    use tdm_core::Mode;

    use super::helpers::*;
    use crate::{
        AdjustmentContext, AlternativeMut, DomainChoice, DomainChoiceConstants, NoAdjustments,
        RegionAdjustments, RegionAdjustmentsExt,
    };

    struct Penalty(f64);

    impl RegionAdjustments for Penalty {
        fn apply(&self, alternative: &mut AlternativeMut<'_>, _ctx: &AdjustmentContext<'_>) {
            alternative.add_utility_term(UNIT, -self.0);
        }
    }

    #[test]
    fn chained_adjustments_apply_in_order() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).set_domain_choice(DomainChoice::Mode { mode: Mode::Walk });
        calc.get_alternative(1, true, false).set_domain_choice(DomainChoice::Mode { mode: Mode::Sov });

        let adjustments = NoAdjustments
            .then(DomainChoiceConstants::new("test").with_constant(DomainChoice::Mode { mode: Mode::Sov }, HALF))
            .then(Penalty(0.25));
        calc.apply_region_adjustments(&adjustments);

        assert_eq!(calc.alternative_mut(0).unwrap().utility(), -0.25);
        assert_eq!(calc.alternative_mut(1).unwrap().utility(), 0.25);
    }

    #[test]
    fn constants_only_touch_their_model() {
        let mut calc = calculator();
        calc.get_alternative(0, true, false).set_domain_choice(DomainChoice::Index { index: 0 });
        let other = DomainChoiceConstants::new("other").with_constant(DomainChoice::Index { index: 0 }, UNIT);
        calc.apply_region_adjustments(&other);
        assert_eq!(calc.alternative_mut(0).unwrap().utility(), 0.0);
    }
}

#[cfg(test)]
mod properties {
    use proptest::prelude::*;
    use tdm_core::{EntityId, NestId, RandomStream};

    use super::helpers::*;

    proptest! {
        #[test]
        fn probabilities_sum_to_one(
            utilities in prop::collection::vec((-30.0f64..30.0, any::<bool>(), 0u16..3), 1..12),
        ) {
            let mut calc = calculator();
            for (i, &(u, available, nest)) in utilities.iter().enumerate() {
                let mut alt = calc.get_alternative(i, available, false);
                alt.add_utility_term(UNIT, u);
                if nest > 0 {
                    alt.add_nested_alternative(NestId(nest), THETA);
                }
            }
            calc.compute_logsum().unwrap();
            let any_available = utilities.iter().any(|&(_, a, _)| a);
            let total: f64 = calc.alternatives().map(|a| a.probability()).sum();
            if any_available {
                prop_assert!((total - 1.0).abs() < 1e-9, "total {}", total);
            } else {
                prop_assert_eq!(total, 0.0);
            }
            for alt in calc.alternatives().filter(|a| !a.is_available()) {
                prop_assert_eq!(alt.probability(), 0.0);
            }
        }

        #[test]
        fn unit_theta_nesting_matches_multinomial(
            utilities in prop::collection::vec((-10.0f64..10.0, 0u16..3), 1..10),
            entity in 0u32..1000,
        ) {
            let mut nested = calculator();
            let mut flat_calc = calculator();
            for (i, &(u, nest)) in utilities.iter().enumerate() {
                let mut alt = nested.get_alternative(i, true, false);
                alt.add_utility_term(UNIT, u);
                // UNDEFINED theta resolves to 1.0.
                alt.add_nested_alternative(NestId(nest), UNDEFINED);
                flat_calc.get_alternative(i, true, false).add_utility_term(UNIT, u);
            }
            let a = nested.compute_logsum().unwrap();
            let b = flat_calc.compute_logsum().unwrap();
            prop_assert!((a - b).abs() < 1e-9);
            for (x, y) in nested.alternatives().zip(flat_calc.alternatives()) {
                prop_assert!((x.probability() - y.probability()).abs() < 1e-9);
            }

            let ca = nested.simulate_choice(&mut RandomStream::new(5, EntityId(entity), 0)).unwrap().map(|a| a.index());
            let cb = flat_calc.simulate_choice(&mut RandomStream::new(5, EntityId(entity), 0)).unwrap().map(|a| a.index());
            prop_assert_eq!(ca, cb);
        }
    }
}
