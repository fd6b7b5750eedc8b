// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Meta status and event publication.

use crate::app::SvInner;
use ne_adapters::bus::keys;
use ne_adapters::ServiceManager;
use ne_core::Clock;
use ne_engine::AppCtx;
use serde_json::{json, Map, Value};
use std::sync::Arc;

impl<M: ServiceManager, C: Clock> SvInner<M, C> {
    /// Snapshot of the service map as a JSON object keyed by app id.
    pub(crate) fn service_list(&self) -> Value {
        let services = self.services.lock();
        let mut map = Map::new();
        for (app_id, rec) in services.iter() {
            map.insert(
                app_id.clone(),
                json!({
                    "category": rec.category.as_str(),
                    "enabled": rec.enabled,
                    "active": rec.active,
                    "restart_count": rec.restart_count,
                }),
            );
        }
        Value::Object(map)
    }

    /// Publish the `supervisor/_meta/*` keys. Skipped quietly when the
    /// bus session is not up yet.
    pub(crate) async fn publish_status(&self, ctx: &Arc<AppCtx>) {
        let Ok(bus) = ctx.bus() else {
            return;
        };

        let list = self.service_list();
        let service_count = list.as_object().map(Map::len).unwrap_or(0);
        let active_count = self.count_active();
        let state = ctx
            .current_state()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "None".to_string());
        let exception_count = ctx.stats().exception_count;

        let pairs = [
            (keys::meta_key("state"), json!(state)),
            (keys::meta_key("service_count"), json!(service_count)),
            (keys::meta_key("active_count"), json!(active_count)),
            (keys::meta_key("services"), list),
            (keys::meta_key("exception_count"), json!(exception_count)),
        ];
        for (key, value) in pairs {
            if bus.publish(&key, value).await.is_err() {
                return;
            }
        }
        if let Err(err) = bus.commit().await {
            tracing::warn!(error = %err, "status publish failed");
        }
    }

    /// Publish one `supervisor/_event/<event>` key.
    pub(crate) async fn publish_event(&self, ctx: &Arc<AppCtx>, event: &str, value: Value) {
        let Ok(bus) = ctx.bus() else {
            return;
        };
        if bus.publish(&keys::event_key(event), value).await.is_ok() {
            if let Err(err) = bus.commit().await {
                tracing::warn!(event, error = %err, "event publish failed");
            }
        }
    }
}
