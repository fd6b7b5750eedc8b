// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection sync: the declarative `conns` table and the out-of-band
//! add/remove events become service units.

use crate::app::SvInner;
use crate::service::ServiceRecord;
use ne_adapters::{ServiceManager, TagValue};
use ne_core::{protocol_module, AppCategory, Clock};
use ne_engine::StageResult;
use ne_storage::NewApp;

/// Event payloads carry the connection id as a JSON string.
fn conn_id_from(value: &TagValue) -> Option<String> {
    let conn_id = match value {
        TagValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    if conn_id.is_empty() || conn_id == "null" {
        None
    } else {
        Some(conn_id)
    }
}

impl<M: ServiceManager, C: Clock> SvInner<M, C> {
    /// Materialize every enabled connection whose protocol maps to a
    /// known worker module. One daemon-reload after all units are
    /// written.
    pub(crate) async fn sync_conns_initial(&self) -> StageResult {
        let conns = self.db()?.select_conns_enabled()?;

        let mut need_reload = false;
        for row in conns {
            let Some(module) = protocol_module(&row.protocol) else {
                tracing::warn!(conn_id = %row.conn, protocol = %row.protocol, "unknown protocol");
                continue;
            };

            self.db()?.upsert_app(&NewApp::interface(&row.conn, module))?;
            let record = ServiceRecord::interface(&row.conn, module);
            let spec = record.unit_spec();
            self.services.lock().insert(row.conn.clone(), record);

            match self.units.create(&spec) {
                Ok(_) => need_reload = true,
                Err(err) => {
                    tracing::error!(conn_id = %row.conn, error = %err, "create unit failed");
                }
            }
        }

        if need_reload {
            self.manager.daemon_reload().await;
        }
        Ok(())
    }

    /// A connection row appeared: register, materialize, start.
    pub(crate) async fn on_conn_added(&self, value: TagValue) {
        let Some(conn_id) = conn_id_from(&value) else {
            return;
        };
        tracing::info!(conn_id = %conn_id, "conn_added event");

        let row = match self.db().map(|db| db.select_conn(&conn_id)) {
            Ok(Ok(Some(row))) => row,
            Ok(Ok(None)) => {
                tracing::warn!(conn_id = %conn_id, "conn_added but not found in store");
                return;
            }
            Ok(Err(err)) => {
                tracing::warn!(conn_id = %conn_id, error = %err, "conn_added lookup failed");
                return;
            }
            Err(err) => {
                tracing::warn!(conn_id = %conn_id, error = %err, "conn_added lookup failed");
                return;
            }
        };

        let Some(module) = protocol_module(&row.protocol) else {
            tracing::warn!(conn_id = %conn_id, protocol = %row.protocol, "unknown protocol");
            return;
        };

        if let Ok(db) = self.db() {
            if let Err(err) = db.upsert_app(&NewApp::interface(&conn_id, module)) {
                tracing::warn!(conn_id = %conn_id, error = %err, "registry upsert failed");
                return;
            }
        }

        let record = ServiceRecord::interface(&conn_id, module);
        let name = record.service_name();
        let spec = record.unit_spec();
        self.services.lock().insert(conn_id.clone(), record);

        if self.units.create(&spec).is_ok() {
            self.manager.daemon_reload().await;
        }
        if self.manager.start(&name).await {
            if let Some(rec) = self.services.lock().get_mut(&conn_id) {
                rec.active = true;
            }
        }
        tracing::info!(conn_id = %conn_id, protocol = %row.protocol, "started new interface");
    }

    /// A connection row disappeared: stop, remove the unit and the
    /// registry row, drop it from the map.
    pub(crate) async fn on_conn_removed(&self, value: TagValue) {
        let Some(conn_id) = conn_id_from(&value) else {
            return;
        };
        tracing::info!(conn_id = %conn_id, "conn_removed event");

        if !self.services.lock().contains_key(&conn_id) {
            tracing::warn!(conn_id = %conn_id, "conn_removed but service not found");
            return;
        }

        self.deactivate_service(&conn_id).await;
        if let Err(err) = self.units.remove(AppCategory::Interface, &conn_id) {
            tracing::warn!(conn_id = %conn_id, error = %err, "remove unit failed");
        }
        self.manager.daemon_reload().await;
        if let Ok(db) = self.db() {
            if let Err(err) = db.delete_app(&conn_id) {
                tracing::warn!(conn_id = %conn_id, error = %err, "registry delete failed");
            }
        }
        self.services.lock().remove(&conn_id);
        tracing::info!(conn_id = %conn_id, "removed interface");
    }
}
