//! Run observer trait for progress reporting and output collection.

use tdm_choice::EstimationSummary;

use crate::HouseholdOutcome;

/// Totals for one pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub households:        usize,
    pub failed_households: usize,
    pub person_days:       usize,
    pub invalid_days:      usize,
    pub observations:      usize,
}

impl PassStats {
    pub(crate) fn record(&mut self, outcome: &HouseholdOutcome) {
        self.households += 1;
        self.failed_households += usize::from(outcome.failure.is_some());
        self.person_days += outcome.person_days.len();
        self.invalid_days += outcome.invalid_days();
        self.observations += outcome.observations.len();
    }
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run].
///
/// Household outcomes arrive in input order whatever the slot count, batch
/// size or `parallel` feature.  All methods default to no-ops.
///
/// # Example — progress printer
///
/// ```rust,ignore
/// struct Progress;
///
/// impl RunObserver for Progress {
///     fn on_batch_end(&mut self, batch: usize, households: usize) {
///         log::info!("batch {batch}: {households} households");
///     }
/// }
/// ```
pub trait RunObserver {
    fn on_pass_start(&mut self, _pass: u32, _households: usize) {}

    fn on_household(&mut self, _outcome: &HouseholdOutcome) {}

    fn on_batch_end(&mut self, _batch: usize, _households: usize) {}

    /// Once per registered model at the end of an estimation-mode pass.
    fn on_estimation_summary(&mut self, _summary: &EstimationSummary) {}

    fn on_pass_end(&mut self, _pass: u32, _stats: &PassStats) {}
}

/// A [`RunObserver`] that does nothing.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
