// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EdgeDB: the relational accessor every engine shares.
//!
//! One open per process. Write-ahead-log journal with a 30 s busy timeout
//! tolerates concurrent readers (importer, UI) alongside the supervisor.

use crate::rows::{AppRow, BlockRow, ConnRow, NewApp, PropColumn, TagMapRow};
use crate::schema::SCHEMA_SQL;
use ne_core::AppCategory;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum EdgeDbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Shared handle to the configuration store.
#[derive(Clone)]
pub struct EdgeDB {
    conn: Arc<Mutex<Connection>>,
}

impl EdgeDB {
    /// Open (creating if missing) the store at `path` and apply the
    /// engine settings and schema.
    pub fn open(path: &Path) -> Result<Self, EdgeDbError> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, EdgeDbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, EdgeDbError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=30000;
             PRAGMA synchronous=NORMAL;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Raw SQL entry point for the out-of-band importer and test
    /// fixtures.
    pub fn execute_batch(&self, sql: &str) -> Result<(), EdgeDbError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    // Connections
    // ──────────────────────────────────────────────────────────────────

    pub fn select_conns(&self) -> Result<Vec<ConnRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM conns ORDER BY conn")?;
        let rows = stmt
            .query_map([], |row| ConnRow::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn select_conns_enabled(&self) -> Result<Vec<ConnRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM conns WHERE use = 1 ORDER BY conn")?;
        let rows = stmt
            .query_map([], |row| ConnRow::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn select_conn(&self, conn_id: &str) -> Result<Option<ConnRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM conns WHERE conn = ?1")?;
        let mut rows = stmt.query_map(params![conn_id], |row| ConnRow::from_row(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn select_conn_ids(&self) -> Result<Vec<String>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT conn FROM conns ORDER BY conn")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Max `updated_at` across connection rows, zero when empty. Poll
    /// this to detect importer writes without reading every row.
    pub fn select_max_conn_updated_at(&self) -> Result<i64, EdgeDbError> {
        let conn = self.conn.lock();
        let max = conn.query_row(
            "SELECT COALESCE(MAX(updated_at), 0) FROM conns",
            [],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    pub fn select_conns_updated_after(&self, ts: i64) -> Result<Vec<ConnRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM conns WHERE updated_at > ?1 ORDER BY conn")?;
        let rows = stmt
            .query_map(params![ts], |row| ConnRow::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // Blocks and tag mappings
    // ──────────────────────────────────────────────────────────────────

    pub fn select_blocks_by_conn(&self, conn_id: &str) -> Result<Vec<BlockRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM blocks WHERE conn = ?1 ORDER BY block")?;
        let rows = stmt
            .query_map(params![conn_id], |row| BlockRow::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn select_block_tags(&self, block_id: &str) -> Result<Vec<TagMapRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM blocks_tags WHERE block = ?1 ORDER BY tag")?;
        let rows = stmt
            .query_map(params![block_id], |row| TagMapRow::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // App registry
    // ──────────────────────────────────────────────────────────────────

    pub fn select_app_registry(
        &self,
        category: Option<AppCategory>,
    ) -> Result<Vec<AppRow>, EdgeDbError> {
        let conn = self.conn.lock();
        match category {
            Some(category) => {
                let mut stmt = conn
                    .prepare("SELECT * FROM app_registry WHERE category = ?1 ORDER BY app_id")?;
                let rows = stmt
                    .query_map(params![category.as_str()], |row| AppRow::from_row(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM app_registry ORDER BY app_id")?;
                let rows = stmt
                    .query_map([], |row| AppRow::from_row(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        }
    }

    pub fn select_app(&self, app_id: &str) -> Result<Option<AppRow>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM app_registry WHERE app_id = ?1")?;
        let mut rows = stmt.query_map(params![app_id], |row| AppRow::from_row(row))?;
        Ok(rows.next().transpose()?)
    }

    pub fn upsert_app(&self, app: &NewApp) -> Result<(), EdgeDbError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO app_registry
             (app_id, category, module, enabled, config, conn_id,
              license_token, license_expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(app_id) DO UPDATE SET
               category = excluded.category, module = excluded.module,
               enabled = excluded.enabled, config = excluded.config,
               conn_id = excluded.conn_id,
               license_token = excluded.license_token,
               license_expires_at = excluded.license_expires_at,
               updated_at = excluded.updated_at",
            params![
                app.app_id,
                app.category.as_str(),
                app.module,
                app.enabled as i64,
                app.config.to_string(),
                app.conn_id,
                app.license_token,
                app.license_expires_at,
                now_epoch(),
            ],
        )?;
        Ok(())
    }

    pub fn update_app_enabled(&self, app_id: &str, enabled: bool) -> Result<(), EdgeDbError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE app_registry SET enabled = ?1, updated_at = ?2 WHERE app_id = ?3",
            params![enabled as i64, now_epoch(), app_id],
        )?;
        Ok(())
    }

    /// Update only the entitlement columns (plus the enabled flag they
    /// gate).
    pub fn update_app_license(
        &self,
        app_id: &str,
        token: Option<&str>,
        expires_at: Option<i64>,
        enabled: bool,
    ) -> Result<(), EdgeDbError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE app_registry SET
               license_token = ?1, license_expires_at = ?2,
               enabled = ?3, updated_at = ?4
             WHERE app_id = ?5",
            params![token, expires_at, enabled as i64, now_epoch(), app_id],
        )?;
        Ok(())
    }

    pub fn delete_app(&self, app_id: &str) -> Result<(), EdgeDbError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM app_registry WHERE app_id = ?1", params![app_id])?;
        Ok(())
    }

    // Protocol property schema
    // ──────────────────────────────────────────────────────────────────

    /// Ordered (pos, key, type) columns the importer uses to decode
    /// positional CSV properties for one (protocol, layer).
    pub fn select_prot_props(
        &self,
        prot: &str,
        layer: &str,
    ) -> Result<Vec<PropColumn>, EdgeDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT pos, key, type FROM prot_prop
             WHERE prot = ?1 AND layer = ?2 ORDER BY pos",
        )?;
        let rows = stmt
            .query_map(params![prot, layer], |row| PropColumn::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
