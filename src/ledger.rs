use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::grid::GridCell;
use crate::models::CellStatus;

/// Rates and angles are stored as text so the unique key does not depend on
/// floating point equality.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sweep_cell (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pointing TEXT NOT NULL,
    ccd TEXT NOT NULL,
    stack_rerun TEXT NOT NULL,
    rate TEXT NOT NULL,
    angle TEXT NOT NULL,
    status INTEGER NOT NULL,
    files INTEGER NOT NULL DEFAULT 0,
    finished_at INTEGER NOT NULL,
    UNIQUE (pointing, ccd, stack_rerun, rate, angle)
)";

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub pointing: String,
    pub ccd: String,
    pub stack_rerun: String,
    pub rate: String,
    pub angle: String,
    pub status: i32,
    pub files: i64,
    pub finished_at: i64,
}

/// Identifies every cell belonging to one pointing/chip sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepKey<'k> {
    pub pointing: &'k str,
    pub ccd: &'k str,
    pub stack_rerun: &'k str,
}

/// Record of finished grid cells, used to resume an aborted sweep.
pub struct Ledger<'a> {
    conn: &'a Connection,
}

impl<'a> Ledger<'a> {
    pub fn new(conn: &'a Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Ledger { conn })
    }

    pub fn record(
        &self,
        key: &SweepKey,
        cell: &GridCell,
        status: CellStatus,
        files: usize,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sweep_cell (pointing, ccd, stack_rerun, rate, angle, status, files, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (pointing, ccd, stack_rerun, rate, angle)
             DO UPDATE SET status = excluded.status,
                           files = excluded.files,
                           finished_at = excluded.finished_at",
            params![
                key.pointing,
                key.ccd,
                key.stack_rerun,
                cell.rate.to_string(),
                cell.angle.to_string(),
                status as i32,
                files as i64,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn is_uploaded(&self, key: &SweepKey, cell: &GridCell) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sweep_cell
             WHERE pointing = ?1 AND ccd = ?2 AND stack_rerun = ?3
               AND rate = ?4 AND angle = ?5 AND status = ?6",
            params![
                key.pointing,
                key.ccd,
                key.stack_rerun,
                cell.rate.to_string(),
                cell.angle.to_string(),
                CellStatus::Uploaded as i32,
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn entries(
        &self,
        pointing_filter: Option<&str>,
        ccd_filter: Option<&str>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut query = String::from(
            "SELECT pointing, ccd, stack_rerun, rate, angle, status, files, finished_at
             FROM sweep_cell
             WHERE 1=1",
        );
        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::new();

        if let Some(pointing) = &pointing_filter {
            query.push_str(" AND pointing = ?");
            values.push(pointing);
        }
        if let Some(ccd) = &ccd_filter {
            query.push_str(" AND ccd = ?");
            values.push(ccd);
        }
        query.push_str(" ORDER BY finished_at, id");

        let mut stmt = self.conn.prepare(&query)?;
        let entries = stmt
            .query_map(values.as_slice(), |row| {
                Ok(LedgerEntry {
                    pointing: row.get(0)?,
                    ccd: row.get(1)?,
                    stack_rerun: row.get(2)?,
                    rate: row.get(3)?,
                    angle: row.get(4)?,
                    status: row.get(5)?,
                    files: row.get(6)?,
                    finished_at: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: SweepKey<'static> = SweepKey {
        pointing: "03148",
        ccd: "007",
        stack_rerun: "sns",
    };

    fn cell(rate: f64, angle: f64) -> GridCell {
        GridCell {
            index: 0,
            rate,
            angle,
        }
    }

    #[test]
    fn test_record_and_resume_lookup() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(&conn).unwrap();

        ledger
            .record(&KEY, &cell(0.5, -10.0), CellStatus::Uploaded, 3)
            .unwrap();
        ledger
            .record(&KEY, &cell(0.5, -7.5), CellStatus::Failed, 0)
            .unwrap();

        assert!(ledger.is_uploaded(&KEY, &cell(0.5, -10.0)).unwrap());
        assert!(!ledger.is_uploaded(&KEY, &cell(0.5, -7.5)).unwrap());
        assert!(!ledger.is_uploaded(&KEY, &cell(1.0, -10.0)).unwrap());

        let other_chip = SweepKey { ccd: "008", ..KEY };
        assert!(!ledger.is_uploaded(&other_chip, &cell(0.5, -10.0)).unwrap());
    }

    #[test]
    fn test_record_overwrites_previous_status() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(&conn).unwrap();

        ledger
            .record(&KEY, &cell(2.0, 0.0), CellStatus::Failed, 0)
            .unwrap();
        ledger
            .record(&KEY, &cell(2.0, 0.0), CellStatus::Uploaded, 3)
            .unwrap();

        let entries = ledger.entries(None, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, CellStatus::Uploaded as i32);
        assert_eq!(entries[0].files, 3);
        assert_eq!(entries[0].rate, "2");
        assert_eq!(entries[0].angle, "0");
    }

    #[test]
    fn test_entries_filters() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(&conn).unwrap();
        let other = SweepKey {
            pointing: "03149",
            ..KEY
        };

        ledger
            .record(&KEY, &cell(0.5, 0.0), CellStatus::Uploaded, 1)
            .unwrap();
        ledger
            .record(&other, &cell(0.5, 0.0), CellStatus::Uploaded, 1)
            .unwrap();

        assert_eq!(ledger.entries(None, None).unwrap().len(), 2);
        assert_eq!(ledger.entries(Some("03149"), None).unwrap().len(), 1);
        assert_eq!(ledger.entries(Some("03149"), Some("007")).unwrap().len(), 1);
        assert!(ledger.entries(None, Some("099")).unwrap().is_empty());
    }

    #[test]
    fn test_schema_is_reentrant() {
        let conn = Connection::open_in_memory().unwrap();
        Ledger::new(&conn).unwrap();
        assert!(Ledger::new(&conn).is_ok());
    }
}
