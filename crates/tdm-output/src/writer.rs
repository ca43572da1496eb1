//! The `OutputWriter` trait implemented by all backend writers.

use crate::{ObservationRow, OutputResult, PersonDayRow, SummaryRow, TermRow};

/// Trait implemented by the CSV and SQLite writers.
///
/// The observer never sees these errors directly; they are stored and
/// retrieved with [`SimOutputObserver::take_error`][crate::SimOutputObserver::take_error].
pub trait OutputWriter {
    /// One row per alternative of each accepted observation.
    fn write_observations(&mut self, rows: &[ObservationRow]) -> OutputResult<()>;

    /// One row per recorded utility term.
    fn write_terms(&mut self, rows: &[TermRow]) -> OutputResult<()>;

    fn write_person_days(&mut self, rows: &[PersonDayRow]) -> OutputResult<()>;

    /// One row per alternative tally of a model's estimation summary.
    fn write_summary(&mut self, rows: &[SummaryRow]) -> OutputResult<()>;

    /// Flush and close all underlying handles.
    ///
    /// Idempotent — safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
