//! CSV output backend.
//!
//! Creates four files in the configured output directory:
//! - `observations.csv`
//! - `observation_terms.csv`
//! - `person_days.csv`
//! - `estimation_summary.csv`

use std::fs::File;
use std::path::Path;

use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::{ObservationRow, OutputResult, PersonDayRow, SummaryRow, TermRow};
use crate::writer::OutputWriter;

pub const OBSERVATION_HEADERS: [&str; 9] =
    ["model", "key", "alternative", "available", "chosen", "domain_choice", "utility", "probability", "logsum"];
pub const TERM_HEADERS: [&str; 6] = ["model", "key", "alternative", "coefficient", "value", "is_size"];
pub const PERSON_DAY_HEADERS: [&str; 7] =
    ["household", "person", "tours", "stops", "choices", "invalid_code", "invalid_reason"];
pub const SUMMARY_HEADERS: [&str; 6] = ["model", "accepted", "rejected", "alternative", "chosen", "available"];

/// Writes run output to four CSV files.
pub struct CsvWriter {
    observations: Writer<File>,
    terms:        Writer<File>,
    person_days:  Writer<File>,
    summary:      Writer<File>,
    finished:     bool,
}

/// Header rows go out up front so empty tables still carry them.
fn open(dir: &Path, name: &str, headers: &[&str]) -> OutputResult<Writer<File>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(dir.join(name))?;
    writer.write_record(headers)?;
    Ok(writer)
}

fn write_rows<T: Serialize>(writer: &mut Writer<File>, rows: &[T]) -> OutputResult<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

impl CsvWriter {
    /// Open (or create) the four CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        Ok(Self {
            observations: open(dir, "observations.csv", &OBSERVATION_HEADERS)?,
            terms:        open(dir, "observation_terms.csv", &TERM_HEADERS)?,
            person_days:  open(dir, "person_days.csv", &PERSON_DAY_HEADERS)?,
            summary:      open(dir, "estimation_summary.csv", &SUMMARY_HEADERS)?,
            finished:     false,
        })
    }
}

impl OutputWriter for CsvWriter {
    fn write_observations(&mut self, rows: &[ObservationRow]) -> OutputResult<()> {
        write_rows(&mut self.observations, rows)
    }

    fn write_terms(&mut self, rows: &[TermRow]) -> OutputResult<()> {
        write_rows(&mut self.terms, rows)
    }

    fn write_person_days(&mut self, rows: &[PersonDayRow]) -> OutputResult<()> {
        write_rows(&mut self.person_days, rows)
    }

    fn write_summary(&mut self, rows: &[SummaryRow]) -> OutputResult<()> {
        write_rows(&mut self.summary, rows)
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.observations.flush()?;
        self.terms.flush()?;
        self.person_days.flush()?;
        self.summary.flush()?;
        Ok(())
    }
}
