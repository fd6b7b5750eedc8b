// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory runtime view of one managed worker.

use ne_adapters::{service_name, UnitSpec};
use ne_core::AppCategory;
use ne_storage::AppRow;
use std::time::Instant;

/// One entry in the supervisor's service map. `active`, the restart
/// counter and its timestamp live only in memory; the persisted half of
/// the record is the `app_registry` row.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub app_id: String,
    pub category: AppCategory,
    pub module: String,
    pub enabled: bool,
    pub conn_id: Option<String>,
    pub active: bool,
    pub restart_count: u32,
    pub last_restart: Option<Instant>,
}

impl ServiceRecord {
    /// Runtime view of a managed interface worker.
    pub fn interface(conn_id: &str, module: &str) -> Self {
        Self {
            app_id: conn_id.to_string(),
            category: AppCategory::Interface,
            module: module.to_string(),
            enabled: true,
            conn_id: Some(conn_id.to_string()),
            active: false,
            restart_count: 0,
            last_restart: None,
        }
    }

    /// Runtime view of an activated addon worker.
    pub fn addon(app_id: &str, module: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            category: AppCategory::Addon,
            module: module.to_string(),
            enabled: true,
            conn_id: None,
            active: false,
            restart_count: 0,
            last_restart: None,
        }
    }

    /// Rehydrate from a persisted registry row.
    pub fn from_registry(row: &AppRow) -> Self {
        Self {
            app_id: row.app_id.clone(),
            category: row.category,
            module: row.module.clone(),
            enabled: row.enabled,
            conn_id: row.conn_id.clone(),
            active: false,
            restart_count: 0,
            last_restart: None,
        }
    }

    /// Unit name on the service manager (`ne-<category>-<app-id>`).
    pub fn service_name(&self) -> String {
        service_name(self.category, &self.app_id)
    }

    pub fn unit_spec(&self) -> UnitSpec {
        UnitSpec {
            app_id: self.app_id.clone(),
            category: self.category,
            module: self.module.clone(),
            conn_id: self.conn_id.clone(),
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
