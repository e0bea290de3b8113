//! SQLite record list for a generation.
//!
//! Records are keyed by sequence number; reading them back in key order
//! reproduces the corpus exactly.

use crate::corpus::{Corpus, Record};
use crate::error::{Result, SpotterError};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        seq_num INTEGER PRIMARY KEY,
        source TEXT NOT NULL,
        label TEXT,
        text TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_records_source ON records(source);
"#;

/// SQLite-backed record list.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the record database at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        debug!("Opened record store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory record store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SpotterError::Storage(format!("Failed to acquire lock: {}", e)))
    }

    /// Write every record of a corpus, replacing any previous contents.
    #[instrument(skip(self, corpus), fields(records = corpus.len()))]
    pub fn write_corpus(&self, corpus: &Corpus) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM records", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (seq_num, source, label, text) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in corpus {
                stmt.execute(params![
                    record.seq_num as i64,
                    record.source,
                    record.label,
                    record.text,
                ])?;
            }
        }

        tx.commit()?;
        info!("Stored {} records", corpus.len());
        Ok(corpus.len())
    }

    /// Read the records back as a corpus.
    #[instrument(skip(self))]
    pub fn read_corpus(&self) -> Result<Corpus> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT seq_num, source, label, text FROM records ORDER BY seq_num")?;

        let rows = stmt.query_map([], |row| {
            let seq_num: i64 = row.get(0)?;
            Ok(Record {
                seq_num: seq_num as usize,
                source: row.get(1)?,
                label: row.get(2)?,
                text: row.get(3)?,
            })
        })?;

        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Loaded {} records", records.len());
        Corpus::from_records(records)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Record counts per source, in first-seen corpus order.
    pub fn source_counts(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT source, COUNT(*) AS n, MIN(seq_num) AS first
            FROM records
            GROUP BY source
            ORDER BY first
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, count as usize))
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
