//! The `Sim` struct and its batch loop.

use tdm_core::EntityId;

use crate::{
    HouseholdModel, HouseholdOutcome, InvalidDayReason, ParallelCalculatorPool, PassStats, RunObserver, ShadowPrices,
    SimResult, SimulationContext, WorkerSlot,
};

/// Household batch runner.
///
/// One call to [`run`][Self::run] is one full simulation pass:
///
/// 1. Split the households into batches of `households_per_batch`.
/// 2. Take the next `slot_count` batches as a round; batch `i` of the round
///    runs on slot `i` (in parallel with the `parallel` feature).
/// 3. Report the round's outcomes to the observer in input order.
///
/// Because every random draw is keyed by entity and decision point, the
/// outcomes do not depend on the slot count or batch size.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<M: HouseholdModel> {
    pub context:    SimulationContext,
    pub pool:       ParallelCalculatorPool,
    pub model:      M,
    pub households: Vec<M::Household>,
    pub(crate) pass: u32,
}

impl<M: HouseholdModel> Sim<M> {
    // ── Public API ────────────────────────────────────────────────────────

    /// Passes completed so far.
    #[inline]
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Install the prices the next pass will read.
    pub fn set_shadow_prices(&mut self, prices: ShadowPrices) {
        self.context.set_shadow_prices(prices);
    }

    /// Run one pass over every household.
    pub fn run<O: RunObserver>(&mut self, observer: &mut O) -> SimResult<PassStats> {
        let pass = self.pass;
        let batch_size = self.context.config().households_per_batch.max(1);
        let slot_count = self.pool.slot_count();
        let mut stats = PassStats::default();

        log::info!(
            "pass {pass}: {} households in batches of {batch_size} on {slot_count} worker slots",
            self.households.len()
        );
        observer.on_pass_start(pass, self.households.len());

        let batches: Vec<&[M::Household]> = self.households.chunks(batch_size).collect();
        for (round_index, round) in batches.chunks(slot_count).enumerate() {
            let outcomes = run_round(&self.model, &self.context, self.pool.slots_mut(), round);
            for (offset, batch) in outcomes.into_iter().enumerate() {
                let count = batch.len();
                for outcome in &batch {
                    stats.record(outcome);
                    observer.on_household(outcome);
                }
                observer.on_batch_end(round_index * slot_count + offset, count);
            }
        }

        if self.context.config().is_in_estimation_mode {
            for summary in self.pool.estimation_summaries() {
                log::info!(
                    "{}: {} observations accepted, {} rejected",
                    summary.model,
                    summary.accepted,
                    summary.rejected
                );
                observer.on_estimation_summary(&summary);
            }
        }

        log::info!(
            "pass {pass} done: {} person-days, {} invalid, {} failed households",
            stats.person_days,
            stats.invalid_days,
            stats.failed_households
        );
        observer.on_pass_end(pass, &stats);
        self.pass += 1;
        Ok(stats)
    }
}

// ── Round processing ──────────────────────────────────────────────────────────

/// Run each batch of `round` on its own slot; outcomes come back in batch
/// order.
fn run_round<M: HouseholdModel>(
    model: &M,
    ctx:   &SimulationContext,
    slots: &mut [WorkerSlot],
    round: &[&[M::Household]],
) -> Vec<Vec<HouseholdOutcome>> {
    #[cfg(not(feature = "parallel"))]
    {
        round
            .iter()
            .zip(slots.iter_mut())
            .map(|(batch, slot)| run_batch(model, ctx, slot, batch))
            .collect()
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        round
            .par_iter()
            .zip(slots.par_iter_mut())
            .map(|(batch, slot)| run_batch(model, ctx, slot, batch))
            .collect()
    }
}

fn run_batch<M: HouseholdModel>(
    model: &M,
    ctx:   &SimulationContext,
    slot:  &mut WorkerSlot,
    batch: &[M::Household],
) -> Vec<HouseholdOutcome> {
    batch
        .iter()
        .map(|household| {
            let id: EntityId = model.household_id(household);
            match model.simulate_household(household, ctx, slot) {
                Ok(outcome) => outcome,
                Err(error) => {
                    log::warn!("household {id} abandoned: {error}");
                    HouseholdOutcome::failed(id, InvalidDayReason::from(&error))
                }
            }
        })
        .collect()
}
