// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Addon entitlement: activation, deactivation, expiry sweep.

use crate::app::SvInner;
use crate::service::ServiceRecord;
use ne_adapters::ServiceManager;
use ne_core::{addon_module, AppCategory, Clock, ADDON_MODULES};
use ne_engine::{AppCtx, StageResult};
use ne_license::LicenseManager;
use ne_storage::NewApp;
use serde_json::{json, Value};
use std::sync::Arc;

impl<M: ServiceManager, C: Clock> SvInner<M, C> {
    fn license(&self) -> Option<LicenseManager> {
        self.license.lock().clone()
    }

    /// Give every statically known addon a (disabled) registry row.
    /// Idempotent; runs on each CONFIGURE pass.
    pub(crate) fn ensure_addon_registry(&self) -> StageResult {
        let db = self.db()?;
        for (addon_id, module) in ADDON_MODULES {
            if db.select_app(addon_id)?.is_none() {
                db.upsert_app(&NewApp::addon(addon_id, module))?;
                tracing::info!(addon = %addon_id, "registered addon");
            }
        }
        Ok(())
    }

    /// Activate an addon under a signed token. Always returns the
    /// structured reply payload; nothing here raises.
    pub(crate) async fn activate_addon(
        &self,
        app_id: &str,
        token: &str,
        ctx: &Arc<AppCtx>,
    ) -> Value {
        let Some(license) = self.license() else {
            return json!({"ok": false, "error": "license manager unavailable"});
        };

        let claims = match license.verify(token) {
            Ok(claims) => claims,
            Err(_) => return json!({"ok": false, "error": "invalid or expired token"}),
        };
        if claims.app_id != app_id {
            return json!({
                "ok": false,
                "error": format!("token app mismatch: {}", claims.app_id),
            });
        }

        let Some(module) = addon_module(app_id) else {
            return json!({"ok": false, "error": format!("unknown addon: {app_id}")});
        };

        // Cache to disk for offline operation
        if let Err(err) = license.cache_token(app_id, token) {
            tracing::warn!(app_id = %app_id, error = %err, "token cache write failed");
        }

        let expires_at = claims.exp as i64;
        let updated = self.db().and_then(|db| {
            db.update_app_license(app_id, Some(token), Some(expires_at), true)
                .map_err(Into::into)
        });
        if let Err(err) = updated {
            return json!({"ok": false, "error": err.to_string()});
        }

        let record = ServiceRecord::addon(app_id, module);
        let name = record.service_name();
        let spec = record.unit_spec();
        self.services.lock().insert(app_id.to_string(), record);

        if self.units.create(&spec).is_ok() {
            self.manager.daemon_reload().await;
        }
        if self.manager.start(&name).await {
            if let Some(rec) = self.services.lock().get_mut(app_id) {
                rec.active = true;
            }
        }

        tracing::info!(app_id = %app_id, expires_at, "addon activated");
        self.publish_event(ctx, "addon_activated", json!(app_id)).await;
        json!({"ok": true, "app_id": app_id, "expires_at": expires_at})
    }

    /// Deactivate an addon: stop it, remove the unit, scrub the
    /// entitlement columns and the token cache.
    pub(crate) async fn deactivate_addon(&self, app_id: &str, ctx: &Arc<AppCtx>) -> Value {
        self.deactivate_service(app_id).await;
        if let Err(err) = self.units.remove(AppCategory::Addon, app_id) {
            tracing::warn!(app_id = %app_id, error = %err, "remove unit failed");
        }
        self.manager.daemon_reload().await;

        if let Ok(db) = self.db() {
            if let Err(err) = db.update_app_license(app_id, None, None, false) {
                tracing::warn!(app_id = %app_id, error = %err, "registry update failed");
            }
        }
        if let Some(license) = self.license() {
            if let Err(err) = license.remove_cached_token(app_id) {
                tracing::warn!(app_id = %app_id, error = %err, "token cache purge failed");
            }
        }

        if let Some(rec) = self.services.lock().get_mut(app_id) {
            rec.enabled = false;
            rec.active = false;
        }

        tracing::info!(app_id = %app_id, "addon deactivated");
        self.publish_event(ctx, "addon_deactivated", json!(app_id)).await;
        json!({"ok": true, "app_id": app_id})
    }

    /// Deactivate every enabled addon whose entitlement has lapsed.
    pub(crate) async fn check_entitlement_expiry(&self, ctx: &Arc<AppCtx>) {
        let rows = match self.db().and_then(|db| {
            db.select_app_registry(Some(AppCategory::Addon))
                .map_err(Into::into)
        }) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "entitlement sweep read failed");
                return;
            }
        };

        let now = self.clock.epoch() as i64;
        for row in rows {
            if !row.enabled {
                continue;
            }
            let Some(expires_at) = row.license_expires_at else {
                continue;
            };
            if expires_at <= now {
                tracing::warn!(app_id = %row.app_id, expires_at, "entitlement expired");
                self.deactivate_addon(&row.app_id, ctx).await;
            }
        }
    }
}
