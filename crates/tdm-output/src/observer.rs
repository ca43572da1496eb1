//! `SimOutputObserver<W>` — bridges `RunObserver` to an `OutputWriter`.

use tdm_choice::EstimationSummary;
use tdm_sim::{HouseholdOutcome, PassStats, RunObserver};

use crate::row::{ObservationRow, PersonDayRow, SummaryRow, TermRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`RunObserver`] that writes person-days, observations and estimation
/// summaries to any [`OutputWriter`] backend.
///
/// Errors from the writer are stored internally because `RunObserver`
/// methods have no return value.  After `sim.run()` returns, check for errors
/// with [`take_error`][Self::take_error].  The writer is finished at the end
/// of the pass, so attach one observer to one pass.
pub struct SimOutputObserver<W: OutputWriter> {
    writer:     W,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, last_error: None }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                log::error!("output write failed: {e}");
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> RunObserver for SimOutputObserver<W> {
    fn on_household(&mut self, outcome: &HouseholdOutcome) {
        let days = PersonDayRow::from_outcome(outcome);
        let result = self.writer.write_person_days(&days);
        self.store_err(result);

        if outcome.observations.is_empty() {
            return;
        }
        let observations: Vec<ObservationRow> =
            outcome.observations.iter().flat_map(ObservationRow::from_record).collect();
        let result = self.writer.write_observations(&observations);
        self.store_err(result);

        let terms: Vec<TermRow> = outcome.observations.iter().flat_map(TermRow::from_record).collect();
        if !terms.is_empty() {
            let result = self.writer.write_terms(&terms);
            self.store_err(result);
        }
    }

    fn on_estimation_summary(&mut self, summary: &EstimationSummary) {
        let result = self.writer.write_summary(&SummaryRow::from_summary(summary));
        self.store_err(result);
    }

    fn on_pass_end(&mut self, _pass: u32, _stats: &PassStats) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
