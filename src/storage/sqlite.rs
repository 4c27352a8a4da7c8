//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of both storage traits.

use crate::crawler::FetchResult;
use crate::model::{Module, Qualification};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, SnapshotStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::CatalogError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const UPSERT_QUALIFICATION_SQL: &str = "
    INSERT INTO qualifications (url, code, name, document, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(url) DO UPDATE SET
        code = excluded.code,
        name = excluded.name,
        document = excluded.document,
        updated_at = excluded.updated_at";

const UPSERT_MODULE_SQL: &str = "
    INSERT INTO modules (url, code, name, document, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(url) DO UPDATE SET
        code = excluded.code,
        name = excluded.name,
        document = excluded.document,
        updated_at = excluded.updated_at";

const SELECT_RUN_SQL: &str = "
    SELECT id, started_at, finished_at, config_hash, status, qualification_count, issue_count
    FROM runs";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CatalogError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn upsert_qualification_row(conn: &Connection, qualification: &Qualification) -> StorageResult<()> {
    let document = serde_json::to_string(&qualification.to_document())?;
    conn.execute(
        UPSERT_QUALIFICATION_SQL,
        params![
            qualification.url,
            qualification.code,
            qualification.name,
            document,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn upsert_module_row(conn: &Connection, module: &Module) -> StorageResult<()> {
    let document = serde_json::to_string(module)?;
    conn.execute(
        UPSERT_MODULE_SQL,
        params![
            module.url,
            module.code,
            module.name,
            document,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        qualification_count: row.get::<_, i64>(5)? as u64,
        issue_count: row.get::<_, i64>(6)? as u64,
    })
}

impl SnapshotStore for SqliteStorage {
    fn load_responses(&self) -> StorageResult<HashMap<String, FetchResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, status_code, body FROM response_cache")?;

        let responses = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    FetchResult::Response {
                        status_code: row.get(1)?,
                        body: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(responses)
    }

    fn save_responses(&mut self, entries: &[(String, FetchResult)]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO response_cache (url, status_code, body, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (url, result) in entries {
                if let FetchResult::Response { status_code, body } = result {
                    stmt.execute(params![url, status_code, body, now])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_modules(&self) -> StorageResult<HashMap<String, Module>> {
        let mut stmt = self.conn.prepare("SELECT url, module FROM module_cache")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut modules = HashMap::with_capacity(rows.len());
        for (url, json) in rows {
            modules.insert(url, serde_json::from_str(&json)?);
        }

        Ok(modules)
    }

    fn save_modules(&mut self, modules: &[Arc<Module>]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO module_cache (url, module) VALUES (?1, ?2)")?;
            for module in modules {
                stmt.execute(params![module.url, serde_json::to_string(module.as_ref())?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_snapshots(&mut self) -> StorageResult<()> {
        self.conn
            .execute_batch("DELETE FROM response_cache; DELETE FROM module_cache;")?;
        Ok(())
    }

    fn count_cached_responses(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl DocumentStore for SqliteStorage {
    // ===== Documents =====

    fn upsert_qualification(&mut self, qualification: &Qualification) -> StorageResult<()> {
        upsert_qualification_row(&self.conn, qualification)
    }

    fn upsert_module(&mut self, module: &Module) -> StorageResult<()> {
        upsert_module_row(&self.conn, module)
    }

    fn upsert_qualifications(&mut self, qualifications: &[Qualification]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        for qualification in qualifications {
            upsert_qualification_row(&tx, qualification)?;
        }
        tx.commit()?;
        Ok(qualifications.len())
    }

    fn upsert_modules(&mut self, modules: &[Arc<Module>]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        for module in modules {
            upsert_module_row(&tx, module)?;
        }
        tx.commit()?;
        Ok(modules.len())
    }

    fn get_qualification_document(&self, url: &str) -> StorageResult<Option<serde_json::Value>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM qualifications WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(document
            .map(|json| serde_json::from_str(&json))
            .transpose()?)
    }

    fn get_module(&self, url: &str) -> StorageResult<Option<Module>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM modules WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(document
            .map(|json| serde_json::from_str(&json))
            .transpose()?)
    }

    fn count_qualifications(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM qualifications", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_modules(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM modules", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_RUN_SQL),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("{} ORDER BY id DESC LIMIT 1", SELECT_RUN_SQL),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        qualification_count: usize,
        issue_count: usize,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, qualification_count = ?3,
             issue_count = ?4 WHERE id = ?5",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                qualification_count as i64,
                issue_count as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Failed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}
