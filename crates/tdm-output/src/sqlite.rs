//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `output.db` file in the configured output directory with
//! four tables: `observations`, `observation_terms`, `person_days` and
//! `estimation_summary`.

use std::path::Path;

use rusqlite::Connection;

use crate::{ObservationRow, OutputResult, PersonDayRow, SummaryRow, TermRow};
use crate::writer::OutputWriter;

/// Writes run output to an SQLite database.
pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Open (or create) `output.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("output.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS observations (
                 model         TEXT    NOT NULL,
                 key           INTEGER NOT NULL,
                 alternative   INTEGER NOT NULL,
                 available     INTEGER NOT NULL,
                 chosen        INTEGER NOT NULL,
                 domain_choice TEXT    NOT NULL,
                 utility       REAL    NOT NULL,
                 probability   REAL    NOT NULL,
                 logsum        REAL    NOT NULL
             );
             CREATE TABLE IF NOT EXISTS observation_terms (
                 model       TEXT    NOT NULL,
                 key         INTEGER NOT NULL,
                 alternative INTEGER NOT NULL,
                 coefficient INTEGER NOT NULL,
                 value       REAL    NOT NULL,
                 is_size     INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS person_days (
                 household      INTEGER NOT NULL,
                 person         INTEGER NOT NULL,
                 tours          INTEGER NOT NULL,
                 stops          INTEGER NOT NULL,
                 choices        INTEGER NOT NULL,
                 invalid_code   INTEGER NOT NULL,
                 invalid_reason TEXT    NOT NULL
             );
             CREATE TABLE IF NOT EXISTS estimation_summary (
                 model       TEXT    NOT NULL,
                 accepted    INTEGER NOT NULL,
                 rejected    INTEGER NOT NULL,
                 alternative INTEGER NOT NULL,
                 chosen      INTEGER NOT NULL,
                 available   INTEGER NOT NULL
             );",
        )?;

        Ok(Self { conn, finished: false })
    }
}

impl OutputWriter for SqliteWriter {
    fn write_observations(&mut self, rows: &[ObservationRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO observations \
                 (model, key, alternative, available, chosen, domain_choice, utility, probability, logsum) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.model,
                    row.key as i64,
                    row.alternative as i64,
                    row.available,
                    row.chosen,
                    row.domain_choice,
                    row.utility,
                    row.probability,
                    row.logsum,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_terms(&mut self, rows: &[TermRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO observation_terms \
                 (model, key, alternative, coefficient, value, is_size) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.model,
                    row.key as i64,
                    row.alternative as i64,
                    row.coefficient,
                    row.value,
                    row.is_size,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_person_days(&mut self, rows: &[PersonDayRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO person_days \
                 (household, person, tours, stops, choices, invalid_code, invalid_reason) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.household,
                    row.person,
                    row.tours,
                    row.stops,
                    row.choices as i64,
                    row.invalid_code,
                    row.invalid_reason,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_summary(&mut self, rows: &[SummaryRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO estimation_summary \
                 (model, accepted, rejected, alternative, chosen, available) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.model,
                    row.accepted as i64,
                    row.rejected as i64,
                    row.alternative as i64,
                    row.chosen as i64,
                    row.available as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
