//! Run and sample persistence
//!
//! SQLite-backed store for runs and their telemetry samples. The pipeline
//! treats this as a plain append store: no cross-run transactions, only
//! atomicity of a single run's sample batch. Samples are returned in
//! insertion order — the pipeline never re-sorts by `ts_ms`.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::emulator::Profile;
use crate::error::{StorageError, StorageResult};
use crate::parser::Sample;

/// Launch metadata recorded with each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub profile: Profile,
    pub duration_sec: u64,
    pub hz: u32,
    pub seed: u64,
}

/// One row of the run listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub created_at: String,
    pub meta: RunMeta,
}

/// SQLite store, one connection per operation
#[derive(Debug, Clone)]
pub struct Storage {
    db_path: PathBuf,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> StorageResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Create tables if they do not exist
    pub fn init_db(&self) -> StorageResult<()> {
        let con = self.connect()?;
        con.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                meta_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                ts_ms INTEGER NOT NULL,
                latency_ms REAL NOT NULL,
                ipc REAL NOT NULL,
                cache_miss REAL NOT NULL,
                power_w REAL NOT NULL,
                warnings INTEGER NOT NULL,
                errors INTEGER NOT NULL,
                raw_line TEXT NOT NULL,
                FOREIGN KEY(run_id) REFERENCES runs(run_id)
            );
            "#,
        )?;
        info!(db_path = %self.db_path.display(), "database initialized");
        Ok(())
    }

    pub fn insert_run(&self, run_id: &str, created_at: &str, meta: &RunMeta) -> StorageResult<()> {
        let meta_json = serde_json::to_string(meta).map_err(|e| StorageError::MetaEncoding {
            reason: e.to_string(),
        })?;

        let con = self.connect()?;
        con.execute(
            "INSERT INTO runs(run_id, created_at, meta_json) VALUES (?1, ?2, ?3)",
            params![run_id, created_at, meta_json],
        )?;
        Ok(())
    }

    /// Insert one run's sample batch atomically
    pub fn insert_samples(&self, run_id: &str, samples: &[Sample]) -> StorageResult<()> {
        let mut con = self.connect()?;
        let tx = con.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO samples(
                    run_id, ts_ms, latency_ms, ipc, cache_miss, power_w, warnings, errors, raw_line
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for s in samples {
                stmt.execute(params![
                    run_id,
                    s.ts_ms,
                    s.latency_ms,
                    s.ipc,
                    s.cache_miss,
                    s.power_w,
                    s.warnings,
                    s.errors,
                    s.raw_line,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List stored runs, newest first
    pub fn list_runs(&self) -> StorageResult<Vec<RunSummary>> {
        let con = self.connect()?;
        let mut stmt =
            con.prepare("SELECT run_id, created_at, meta_json FROM runs ORDER BY created_at DESC")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (run_id, created_at, meta_json) = row?;
            let meta =
                serde_json::from_str(&meta_json).map_err(|e| StorageError::MetaEncoding {
                    reason: e.to_string(),
                })?;
            out.push(RunSummary {
                run_id,
                created_at,
                meta,
            });
        }
        Ok(out)
    }

    /// Fetch one run's summary, or `None` if it was never stored
    pub fn get_run(&self, run_id: &str) -> StorageResult<Option<RunSummary>> {
        Ok(self
            .list_runs()?
            .into_iter()
            .find(|r| r.run_id == run_id))
    }

    /// Fetch one run's samples in insertion order
    pub fn get_samples(&self, run_id: &str) -> StorageResult<Vec<Sample>> {
        let con = self.connect()?;
        let mut stmt = con.prepare(
            r#"
            SELECT ts_ms, latency_ms, ipc, cache_miss, power_w, warnings, errors, raw_line
            FROM samples
            WHERE run_id = ?1
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok(Sample {
                ts_ms: row.get(0)?,
                latency_ms: row.get(1)?,
                ipc: row.get(2)?,
                cache_miss: row.get(3)?,
                power_w: row.get(4)?,
                warnings: row.get(5)?,
                errors: row.get(6)?,
                raw_line: row.get(7)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
