// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus command dispatch: `supervisor/_cmd/<verb>`.

use crate::app::SvInner;
use ne_adapters::bus::keys;
use ne_adapters::{ServiceManager, TagValue};
use ne_core::Clock;
use ne_engine::AppCtx;
use serde_json::Value;
use std::sync::Arc;

/// Payloads arrive either as a JSON object or as a string holding one.
fn parse_payload(value: &TagValue) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Default::default())),
        Value::Object(_) => value.clone(),
        _ => Value::Object(Default::default()),
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl<M: ServiceManager, C: Clock> SvInner<M, C> {
    pub(crate) async fn handle_command(&self, key: &str, value: TagValue, ctx: &Arc<AppCtx>) {
        let Some(verb) = keys::cmd_verb(key) else {
            return;
        };
        let payload = parse_payload(&value);

        match verb {
            "activate" => {
                let (Some(app_id), Some(token)) =
                    (str_field(&payload, "app_id"), str_field(&payload, "token"))
                else {
                    return;
                };
                let result = self.activate_addon(app_id, token, ctx).await;
                self.publish_event(ctx, "activate_result", result).await;
            }
            "deactivate" => {
                let Some(app_id) = str_field(&payload, "app_id") else {
                    return;
                };
                let result = self.deactivate_addon(app_id, ctx).await;
                self.publish_event(ctx, "deactivate_result", result).await;
            }
            "restart" => {
                let Some(app_id) = str_field(&payload, "app_id") else {
                    return;
                };
                self.restart_managed_service(app_id).await;
            }
            "list" => {
                let list = self.service_list();
                self.publish_event(ctx, "service_list", list).await;
            }
            other => {
                tracing::debug!(verb = %other, "unknown supervisor command");
            }
        }
    }
}
