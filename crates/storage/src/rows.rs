// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed rows for the store tables.

use ne_core::AppCategory;
use rusqlite::Row;
use serde::Serialize;
use serde_json::Value;

/// One `conns` row: a declarative external endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConnRow {
    pub conn: String,
    pub comment: String,
    pub use_flag: bool,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub timeout: f64,
    pub retry: u32,
    pub properties: String,
    pub updated_at: i64,
}

/// Connection-level parameters. Any change here requires a full worker
/// process restart; everything else hot-reloads.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParams {
    pub host: String,
    pub port: u16,
    pub timeout: f64,
    pub retry: u32,
}

impl ConnRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conn: row.get("conn")?,
            comment: row.get("comment")?,
            use_flag: row.get::<_, i64>("use")? != 0,
            protocol: row.get("protocol")?,
            port: row.get::<_, i64>("port")?.clamp(0, u16::MAX as i64) as u16,
            host: row.get("host")?,
            timeout: row.get("timeout")?,
            retry: row.get::<_, i64>("retry")?.max(0) as u32,
            properties: row.get("properties")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn link_params(&self) -> LinkParams {
        LinkParams {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            retry: self.retry,
        }
    }

    pub fn properties_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.properties)
    }
}

/// One `blocks` row: a schedule/trigger grouping under a connection.
#[derive(Debug, Clone, Serialize)]
pub struct BlockRow {
    pub block: String,
    pub comment: String,
    pub use_flag: bool,
    pub conn: String,
    pub direction: String,
    pub trigger: String,
    pub schedule: f64,
    pub standby: bool,
    pub properties: String,
    pub updated_at: i64,
}

impl BlockRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            block: row.get("block")?,
            comment: row.get("comment")?,
            use_flag: row.get::<_, i64>("use")? != 0,
            conn: row.get("conn")?,
            direction: row.get("direction")?,
            trigger: row.get("trigger")?,
            schedule: row.get("schedule")?,
            standby: row.get::<_, i64>("standby")? != 0,
            properties: row.get("properties")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn properties_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.properties)
    }
}

/// One `blocks_tags` row: a tag mapping beneath a block.
#[derive(Debug, Clone, Serialize)]
pub struct TagMapRow {
    pub block: String,
    pub use_flag: bool,
    pub tag: String,
    pub field: String,
    pub scale: f64,
    pub offset: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub deadband: f64,
    pub properties: String,
}

impl TagMapRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            block: row.get("block")?,
            use_flag: row.get::<_, i64>("use")? != 0,
            tag: row.get("tag")?,
            field: row.get("field")?,
            scale: row.get("scale")?,
            offset: row.get("offset_val")?,
            low: row.get("low")?,
            high: row.get("high")?,
            deadband: row.get("deadband")?,
            properties: row.get("properties")?,
        })
    }

    pub fn properties_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.properties)
    }
}

/// One `app_registry` row: the persisted view of a managed worker.
#[derive(Debug, Clone, Serialize)]
pub struct AppRow {
    pub app_id: String,
    pub category: AppCategory,
    pub module: String,
    pub enabled: bool,
    pub config: String,
    pub conn_id: Option<String>,
    pub license_token: Option<String>,
    pub license_expires_at: Option<i64>,
    pub updated_at: i64,
}

impl AppRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let category: String = row.get("category")?;
        let category = category.parse::<AppCategory>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                err.into(),
            )
        })?;
        Ok(Self {
            app_id: row.get("app_id")?,
            category,
            module: row.get("module")?,
            enabled: row.get::<_, i64>("enabled")? != 0,
            config: row.get("config")?,
            conn_id: row.get("conn_id")?,
            license_token: row.get("license_token")?,
            license_expires_at: row.get("license_expires_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Insert-or-update payload for the app registry.
#[derive(Debug, Clone)]
pub struct NewApp {
    pub app_id: String,
    pub category: AppCategory,
    pub module: String,
    pub enabled: bool,
    pub config: Value,
    pub conn_id: Option<String>,
    pub license_token: Option<String>,
    pub license_expires_at: Option<i64>,
}

impl NewApp {
    /// Registry row for an interface worker bound to a connection.
    pub fn interface(conn_id: &str, module: &str) -> Self {
        Self {
            app_id: conn_id.to_string(),
            category: AppCategory::Interface,
            module: module.to_string(),
            enabled: true,
            config: Value::Object(Default::default()),
            conn_id: Some(conn_id.to_string()),
            license_token: None,
            license_expires_at: None,
        }
    }

    /// Disabled registry row for a statically known addon.
    pub fn addon(app_id: &str, module: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            category: AppCategory::Addon,
            module: module.to_string(),
            enabled: false,
            config: Value::Object(Default::default()),
            conn_id: None,
            license_token: None,
            license_expires_at: None,
        }
    }
}

/// One `prot_prop` row: positional CSV column mapping for the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropColumn {
    pub pos: i64,
    pub key: String,
    pub ty: String,
}

impl PropColumn {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pos: row.get("pos")?,
            key: row.get("key")?,
            ty: row.get("type")?,
        })
    }
}
