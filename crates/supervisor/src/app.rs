// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle: stage hooks, the service map, healthcheck.

use crate::config::SupervisorConfig;
use crate::service::ServiceRecord;
use async_trait::async_trait;
use ne_adapters::bus::keys;
use ne_adapters::{callback, ServiceManager, UnitWriter};
use ne_core::{Clock, SystemClock};
use ne_engine::{AppCtx, AppHooks, StageError, StageResult};
use ne_license::LicenseManager;
use ne_storage::EdgeDB;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Healthcheck gives up after this many restarts inside one window.
pub(crate) const MAX_RESTART_COUNT: u32 = 5;

/// A quiet interval this long clears the restart counter.
pub(crate) const RESTART_COUNT_RESET: Duration = Duration::from_secs(300);

pub(crate) struct SvInner<M, C> {
    pub(crate) cfg: SupervisorConfig,
    pub(crate) manager: M,
    pub(crate) units: UnitWriter,
    pub(crate) clock: C,
    pub(crate) db: Mutex<Option<EdgeDB>>,
    pub(crate) license: Mutex<Option<LicenseManager>>,
    pub(crate) services: Mutex<HashMap<String, ServiceRecord>>,
    pub(crate) last_entitlement_check: Mutex<Option<Instant>>,
}

/// The supervisor's stage hooks, generic over the service manager and
/// the clock so healthcheck windows are testable.
pub struct SupervisorApp<M: ServiceManager, C: Clock = SystemClock> {
    pub(crate) inner: Arc<SvInner<M, C>>,
}

impl<M: ServiceManager, C: Clock> SupervisorApp<M, C> {
    pub fn new(cfg: SupervisorConfig, manager: M, clock: C) -> Self {
        let units = UnitWriter::new(&cfg.unit_dir, &cfg.interpreter);
        Self {
            inner: Arc::new(SvInner {
                cfg,
                manager,
                units,
                clock,
                db: Mutex::new(None),
                license: Mutex::new(None),
                services: Mutex::new(HashMap::new()),
                last_entitlement_check: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the service map, sorted by app id.
    pub fn service_snapshot(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<_> = self.inner.services.lock().values().cloned().collect();
        records.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        records
    }

    /// One healthcheck pass (normally driven by the manage plane).
    pub async fn healthcheck(&self) {
        self.inner.healthcheck().await;
    }

    /// Activate an addon under a signed entitlement token.
    pub async fn activate_addon(
        &self,
        app_id: &str,
        token: &str,
        ctx: &Arc<AppCtx>,
    ) -> serde_json::Value {
        self.inner.activate_addon(app_id, token, ctx).await
    }

    /// Deactivate an addon and scrub its entitlement state.
    pub async fn deactivate_addon(&self, app_id: &str, ctx: &Arc<AppCtx>) -> serde_json::Value {
        self.inner.deactivate_addon(app_id, ctx).await
    }

    /// Stop-then-start one managed service.
    pub async fn restart_service(&self, app_id: &str) {
        self.inner.restart_managed_service(app_id).await;
    }

    /// Run the entitlement sweep regardless of the interval gate.
    pub async fn entitlement_sweep(&self, ctx: &Arc<AppCtx>) {
        self.inner.check_entitlement_expiry(ctx).await;
    }
}

impl<M: ServiceManager, C: Clock> SvInner<M, C> {
    pub(crate) fn db(&self) -> Result<EdgeDB, StageError> {
        self.db
            .lock()
            .clone()
            .ok_or_else(|| StageError::recoverable("store not open"))
    }

    /// Replace the service map with the persisted registry.
    pub(crate) fn load_registry(&self) -> Result<(), StageError> {
        let rows = self.db()?.select_app_registry(None)?;
        let mut services = self.services.lock();
        services.clear();
        for row in &rows {
            services.insert(row.app_id.clone(), ServiceRecord::from_registry(row));
        }
        Ok(())
    }

    /// Write units for every enabled service, reload once, start them.
    pub(crate) async fn start_enabled_services(&self) {
        let specs: Vec<_> = {
            let services = self.services.lock();
            services
                .values()
                .filter(|rec| rec.enabled)
                .map(|rec| (rec.app_id.clone(), rec.service_name(), rec.unit_spec()))
                .collect()
        };

        let mut need_reload = false;
        for (app_id, _, spec) in &specs {
            // The initial conn sync already wrote most of these
            if self.units.unit_path(spec.category, &spec.app_id).exists() {
                continue;
            }
            match self.units.create(spec) {
                Ok(_) => need_reload = true,
                Err(err) => tracing::error!(app_id = %app_id, error = %err, "create unit failed"),
            }
        }
        if need_reload {
            self.manager.daemon_reload().await;
        }

        for (app_id, name, _) in specs {
            if self.manager.start(&name).await {
                tracing::info!(service = %name, "started");
                if let Some(rec) = self.services.lock().get_mut(&app_id) {
                    rec.active = true;
                }
            }
        }
    }

    /// Stop every active service (DISCONNECT teardown).
    pub(crate) async fn stop_all_services(&self) {
        let active: Vec<_> = {
            let services = self.services.lock();
            services
                .values()
                .filter(|rec| rec.active)
                .map(|rec| (rec.app_id.clone(), rec.service_name()))
                .collect()
        };

        for (app_id, name) in active {
            if self.manager.stop(&name).await {
                tracing::info!(service = %name, "stopped");
            }
            if let Some(rec) = self.services.lock().get_mut(&app_id) {
                rec.active = false;
            }
        }
        tracing::info!("stopped all managed services");
    }

    /// Stop one service if it is active.
    pub(crate) async fn deactivate_service(&self, app_id: &str) {
        let name = {
            let mut services = self.services.lock();
            let Some(rec) = services.get_mut(app_id) else {
                return;
            };
            if !rec.active {
                return;
            }
            rec.active = false;
            rec.service_name()
        };
        self.manager.stop(&name).await;
    }

    pub(crate) async fn restart_managed_service(&self, app_id: &str) {
        let name = {
            let services = self.services.lock();
            match services.get(app_id) {
                Some(rec) => rec.service_name(),
                None => return,
            }
        };
        self.manager.stop(&name).await;
        if self.manager.start(&name).await {
            if let Some(rec) = self.services.lock().get_mut(app_id) {
                rec.active = true;
            }
        }
        tracing::info!(app_id = %app_id, "restarted");
    }

    pub(crate) fn count_active(&self) -> usize {
        self.services.lock().values().filter(|r| r.active).count()
    }

    /// Probe every enabled+active service; restart the dead ones with
    /// counter throttling on top of whatever the service manager does.
    pub(crate) async fn healthcheck(&self) {
        enum Verdict {
            GiveUp,
            Restart(u32),
        }

        let candidates: Vec<_> = {
            let services = self.services.lock();
            services
                .values()
                .filter(|rec| rec.enabled && rec.active)
                .map(|rec| (rec.app_id.clone(), rec.service_name()))
                .collect()
        };

        for (app_id, name) in candidates {
            if self.manager.is_active(&name).await {
                continue;
            }

            let now = self.clock.now();
            let verdict = {
                let mut services = self.services.lock();
                let Some(rec) = services.get_mut(&app_id) else {
                    continue;
                };
                if !(rec.enabled && rec.active) {
                    continue;
                }
                // A long-enough quiet spell forgives earlier restarts
                if let Some(last) = rec.last_restart {
                    if now.duration_since(last) > RESTART_COUNT_RESET {
                        rec.restart_count = 0;
                    }
                }
                if rec.restart_count >= MAX_RESTART_COUNT {
                    rec.active = false;
                    Verdict::GiveUp
                } else {
                    Verdict::Restart(rec.restart_count)
                }
            };

            match verdict {
                Verdict::GiveUp => {
                    tracing::error!(app_id = %app_id, "service exceeded max restarts");
                }
                Verdict::Restart(count) => {
                    tracing::warn!(
                        app_id = %app_id,
                        attempt = count + 1,
                        limit = MAX_RESTART_COUNT,
                        "service died, restarting"
                    );
                    if self.manager.start(&name).await {
                        if let Some(rec) = self.services.lock().get_mut(&app_id) {
                            rec.restart_count += 1;
                            rec.last_restart = Some(now);
                        }
                    } else if let Some(rec) = self.services.lock().get_mut(&app_id) {
                        rec.active = false;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<M: ServiceManager, C: Clock> AppHooks for SupervisorApp<M, C> {
    async fn on_prepare(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        let db = EdgeDB::open(&self.inner.cfg.db_path).map_err(StageError::fatal)?;
        *self.inner.db.lock() = Some(db);

        match LicenseManager::new(&self.inner.cfg.pubkey_file, &self.inner.cfg.license_dir) {
            Ok(license) => *self.inner.license.lock() = Some(license),
            Err(err) => {
                tracing::warn!(error = %err, "license manager unavailable");
            }
        }
        Ok(())
    }

    async fn on_configure(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        self.inner.ensure_addon_registry()
    }

    async fn on_connect(&self, ctx: &Arc<AppCtx>) -> StageResult {
        let bus = ctx.bus().map_err(StageError::recoverable)?;

        // Command keys
        bus.sync(&[keys::cmd_pattern()]).await?;
        let inner = Arc::clone(&self.inner);
        let cmd_ctx = Arc::clone(ctx);
        bus.subscribe(
            &[keys::cmd_pattern()],
            callback(move |key, value| {
                let inner = Arc::clone(&inner);
                let ctx = Arc::clone(&cmd_ctx);
                async move {
                    inner.handle_command(&key, value, &ctx).await;
                }
            }),
        )
        .await?;

        // Connection lifecycle events
        bus.sync(&[
            keys::SYS_CONN_ADDED.to_string(),
            keys::SYS_CONN_REMOVED.to_string(),
        ])
        .await?;
        let inner = Arc::clone(&self.inner);
        bus.subscribe(
            &[keys::SYS_CONN_ADDED.to_string()],
            callback(move |_key, value| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.on_conn_added(value).await;
                }
            }),
        )
        .await?;
        let inner = Arc::clone(&self.inner);
        bus.subscribe(
            &[keys::SYS_CONN_REMOVED.to_string()],
            callback(move |_key, value| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.on_conn_removed(value).await;
                }
            }),
        )
        .await?;
        bus.commit().await?;

        // Registry into memory, declared connections into units, then
        // bring everything enabled up.
        self.inner.load_registry()?;
        self.inner.sync_conns_initial().await?;
        self.inner.start_enabled_services().await;
        tracing::info!(active = self.inner.count_active(), "started services");
        Ok(())
    }

    async fn on_execute(&self, ctx: &Arc<AppCtx>) -> StageResult {
        let now = self.inner.clock.now();
        let due = {
            let mut last = self.inner.last_entitlement_check.lock();
            match *last {
                Some(at) if now.duration_since(at) < self.inner.cfg.entitlement_check_interval => {
                    false
                }
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if due {
            self.inner.check_entitlement_expiry(ctx).await;
        }
        Ok(())
    }

    async fn on_manage(&self, ctx: &Arc<AppCtx>) -> StageResult {
        self.inner.healthcheck().await;
        self.inner.publish_status(ctx).await;
        Ok(())
    }

    async fn on_disconnect(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        self.inner.stop_all_services().await;
        *self.inner.db.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
