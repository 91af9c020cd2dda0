//! Relational sink over SQLite.
//!
//! One table named `data` with the fixed 11 text columns of the record
//! layout, created if absent. Rows are appended one transaction per file
//! batch and never updated or deleted.

use crate::app::models::Record;
use crate::constants::{RECORD_COLUMNS, TABLE_SINK_TABLE_NAME};
use crate::{Error, Result};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

/// Append-only SQLite sink for filtered records
pub struct TableSink {
    conn: Connection,
}

impl TableSink {
    /// Open (or create) the database and ensure the `data` table exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open '{}'", path.display()), e))?;
        let sink = Self { conn };
        sink.ensure_schema()?;
        Ok(sink)
    }

    /// In-memory sink for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let sink = Self { conn };
        sink.ensure_schema()?;
        Ok(sink)
    }

    fn ensure_schema(&self) -> Result<()> {
        let columns = RECORD_COLUMNS
            .iter()
            .map(|name| format!("{} TEXT", name))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                TABLE_SINK_TABLE_NAME, columns
            ),
            [],
        )?;
        Ok(())
    }

    /// Append one file's filtered batch inside a single transaction
    pub fn append(&mut self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; RECORD_COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            TABLE_SINK_TABLE_NAME,
            RECORD_COLUMNS.join(", "),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                stmt.execute(params_from_iter(record.fields.iter()))?;
            }
        }
        tx.commit()?;

        debug!("Inserted {} records into '{}'", records.len(), TABLE_SINK_TABLE_NAME);
        Ok(records.len())
    }

    /// Total row count, for reporting and tests
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", TABLE_SINK_TABLE_NAME),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::record_filter::parse_record;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_count() {
        let mut sink = TableSink::open_in_memory().unwrap();
        let records = vec![
            parse_record("100.0 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3").unwrap(),
            parse_record("101.0 1.1 2.1 23 43 4 0 6 0.4 0.5 0.6").unwrap(),
        ];

        assert_eq!(sink.append(&records).unwrap(), 2);
        assert_eq!(sink.row_count().unwrap(), 2);

        // Appends accumulate, no uniqueness constraint
        assert_eq!(sink.append(&records).unwrap(), 2);
        assert_eq!(sink.row_count().unwrap(), 4);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut sink = TableSink::open_in_memory().unwrap();
        assert_eq!(sink.append(&[]).unwrap(), 0);
        assert_eq!(sink.row_count().unwrap(), 0);
    }

    #[test]
    fn test_schema_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("out.db");

        {
            let mut sink = TableSink::open(&db_path).unwrap();
            let records = vec![parse_record("100.0 1.0 2.0 21 40 3 0 5 0.1 0.2 0.3").unwrap()];
            sink.append(&records).unwrap();
        }

        let sink = TableSink::open(&db_path).unwrap();
        assert_eq!(sink.row_count().unwrap(), 1);
    }
}
