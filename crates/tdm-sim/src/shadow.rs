//! Shadow prices: between-pass corrections that pull predicted location
//! choices toward target totals.
//!
//! After each full pass the predicted count per parcel is compared with the
//! target (employment, enrollment, …).  Parcels whose scaled target is below
//! `parcel_threshold` are compared at zone level instead.  The comparison
//! target is moved no further than the tolerances allow:
//!
//! ```text
//! targ  = prediction > total
//!           ? min(prediction, total · (1 + pct/100), total + abs)
//!           : max(prediction, total · (1 − pct/100), total − abs)
//! price = previous + ln(max(targ, 0.01) / max(prediction, 0.01))
//! ```
//!
//! Targets are first scaled by `Σ prediction / max(Σ target, 1)` so the
//! update only redistributes, never inflates, the region total.

use std::collections::BTreeMap;

use tdm_choice::DomainChoice;
use tdm_core::{ParcelId, ShadowPriceConfig, ZoneId};
use tdm_sampling::ParcelMap;

use crate::{HouseholdOutcome, RunObserver};

/// Floor applied to both sides of the price ratio.
const RATIO_FLOOR: f64 = 0.01;

/// One parcel's target and prediction for the last pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowPriceInput {
    pub parcel:     ParcelId,
    pub zone:       ZoneId,
    pub target:     f64,
    pub prediction: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowPriceChange {
    pub parcel:              ParcelId,
    pub previous:            f64,
    pub price:               f64,
    pub absolute_difference: f64,
    pub percent_difference:  f64,
}

/// Per-parcel shadow prices.  Models add `price(parcel)` to the utility of
/// the matching location alternative.
#[derive(Clone, Debug, Default)]
pub struct ShadowPrices {
    prices: ParcelMap<f64>,
}

impl ShadowPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero for parcels never priced.
    #[inline]
    pub fn price(&self, parcel: ParcelId) -> f64 {
        self.prices.get(&parcel).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, parcel: ParcelId, price: f64) {
        self.prices.insert(parcel, price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Apply one update step to every parcel in `inputs`.
    pub fn update(&mut self, inputs: &[ShadowPriceInput], config: &ShadowPriceConfig) -> Vec<ShadowPriceChange> {
        let total_target: f64 = inputs.iter().map(|i| i.target).sum();
        let total_prediction: f64 = inputs.iter().map(|i| i.prediction).sum();
        let factor = total_prediction / f64::max(total_target, 1.0);

        let mut zones: BTreeMap<ZoneId, (f64, f64)> = BTreeMap::new();
        for input in inputs.iter().filter(|i| i.target * factor < config.parcel_threshold) {
            let zone = zones.entry(input.zone).or_default();
            zone.0 += input.target;
            zone.1 += input.prediction;
        }

        let mut changes = Vec::with_capacity(inputs.len());
        for input in inputs {
            let (zone_target, zone_prediction) = zones.get(&input.zone).copied().unwrap_or_default();
            let parcel_total = input.target * factor;
            let (prediction, total) = if parcel_total >= config.parcel_threshold {
                (input.prediction, parcel_total)
            } else {
                (zone_prediction, zone_target * factor)
            };

            let targ = if prediction > total {
                prediction
                    .min(total * (1.0 + config.percent_tolerance / 100.0))
                    .min(total + config.absolute_tolerance)
            } else {
                prediction
                    .max(total * (1.0 - config.percent_tolerance / 100.0))
                    .max(total - config.absolute_tolerance)
            };

            let previous = self.price(input.parcel);
            let price = previous + (targ.max(RATIO_FLOOR) / prediction.max(RATIO_FLOOR)).ln();
            self.prices.insert(input.parcel, price);

            let absolute_difference = prediction - total;
            changes.push(ShadowPriceChange {
                parcel: input.parcel,
                previous,
                price,
                absolute_difference,
                percent_difference: absolute_difference / total.max(1.0),
            });
        }

        let worst = changes.iter().map(|c| c.absolute_difference.abs()).fold(0.0, f64::max);
        log::info!("shadow prices updated for {} parcels; largest absolute difference {worst:.2}", changes.len());
        changes
    }
}

// ── Predictions ───────────────────────────────────────────────────────────────

/// Counts the parcels chosen by one model over a pass.
#[derive(Clone, Debug)]
pub struct PredictionCounter {
    model:  String,
    counts: BTreeMap<ParcelId, u64>,
}

impl PredictionCounter {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), counts: BTreeMap::new() }
    }

    pub fn count(&self, parcel: ParcelId) -> u64 {
        self.counts.get(&parcel).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<ParcelId, u64> {
        &self.counts
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl RunObserver for PredictionCounter {
    fn on_household(&mut self, outcome: &HouseholdOutcome) {
        let chosen = outcome
            .person_days
            .iter()
            .flat_map(|day| &day.choices)
            .filter(|choice| choice.model == self.model);
        for choice in chosen {
            if let Some(DomainChoice::Parcel { parcel }) = choice.domain_choice {
                *self.counts.entry(parcel).or_default() += 1;
            }
        }
    }
}
