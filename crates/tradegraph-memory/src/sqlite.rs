use chrono::Utc;
use rusqlite::Connection;

use crate::error::MemoryError;

/// Schema of the memory table. One row per situation; `seq` is the
/// insertion order within a namespace.
pub const MEMORY_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS memories (
    namespace       TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    situation       TEXT NOT NULL,
    embedding_json  TEXT NOT NULL,
    recommendation  TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (namespace, seq)
);";

/// A stored situation and the recommendation that followed it. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub situation: String,
    pub embedding: Vec<f32>,
    pub recommendation: String,
}

/// SQLite-backed, append-only memory table shared by all namespaces.
pub struct MemoryTable {
    conn: Connection,
}

impl MemoryTable {
    /// Open (or create) a file-backed memory database.
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database. Contents last as long as the table.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MEMORY_TABLE_DDL)?;
        Ok(Self { conn })
    }

    pub fn count(&self, namespace: &str) -> Result<usize, MemoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE namespace = ?1",
            rusqlite::params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Append records to a namespace in a single transaction.
    pub fn append(&self, namespace: &str, records: &[MemoryRecord]) -> Result<usize, MemoryError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM memories WHERE namespace = ?1",
            rusqlite::params![namespace],
            |row| row.get(0),
        )?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO memories \
                 (namespace, seq, situation, embedding_json, recommendation, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (offset, record) in records.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    namespace,
                    next_seq + offset as i64,
                    record.situation,
                    serde_json::to_string(&record.embedding)?,
                    record.recommendation,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// All records of a namespace in insertion order.
    pub fn load(&self, namespace: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT situation, embedding_json, recommendation \
             FROM memories WHERE namespace = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![namespace], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(situation, embedding_json, recommendation)| {
                Ok(MemoryRecord {
                    situation,
                    embedding: serde_json::from_str(&embedding_json)?,
                    recommendation,
                })
            })
            .collect()
    }
}
