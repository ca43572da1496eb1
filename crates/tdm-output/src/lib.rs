//! `tdm-output` — run output writers for the travel-demand choice kernel.
//!
//! Two backends are provided behind Cargo features:
//!
//! | Feature   | Backend | Files created                                                                      |
//! |-----------|---------|------------------------------------------------------------------------------------|
//! | *(none)*  | CSV     | `observations.csv`, `observation_terms.csv`, `person_days.csv`, `estimation_summary.csv` |
//! | `sqlite`  | SQLite  | `output.db`                                                                        |
//!
//! Both backends implement [`OutputWriter`] and are driven by
//! [`SimOutputObserver`], which implements `tdm_sim::RunObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tdm_output::{CsvWriter, SimOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = SimOutputObserver::new(writer);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     log::error!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SimOutputObserver;
pub use row::{domain_label, ObservationRow, PersonDayRow, SummaryRow, TermRow};
pub use writer::OutputWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;
