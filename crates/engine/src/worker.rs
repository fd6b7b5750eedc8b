// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker base: a lifecycle engine bound to one connection row.
//!
//! Loads its own configuration from the store and listens for the
//! per-connection hot-reload signal. A change to the connection-level
//! parameters (host, port, timeout, retry) exits the process with status
//! 0 and lets the service manager restart it under `Restart=always`;
//! any other change diverts the next EXECUTE tick through CONFIGURE.

use crate::app::AppCtx;
use crate::args::AppArgs;
use crate::hooks::{AppHooks, StageError, StageResult};
use crate::EngineError;
use async_trait::async_trait;
use ne_adapters::bus::keys;
use ne_adapters::callback;
use ne_storage::{BlockRow, ConnRow, EdgeDB, LinkParams};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// View handed to protocol hooks: the engine context plus the worker's
/// current configuration.
pub struct IntfCtx {
    pub app: Arc<AppCtx>,
    pub conn: Option<ConnRow>,
    pub blocks: Vec<BlockRow>,
    pub db: Option<EdgeDB>,
}

/// Protocol-specific behavior, invoked after the base work of the
/// corresponding lifecycle stage.
#[async_trait]
pub trait ProtocolHooks: Send + Sync + 'static {
    async fn on_intf_prepare(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
    async fn on_intf_configure(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
    async fn on_intf_connect(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
    async fn on_intf_execute(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
    async fn on_intf_recover(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
    async fn on_intf_disconnect(&self, _cx: &IntfCtx) -> StageResult {
        Ok(())
    }
}

/// True when the connection-level tuple differs between two loads.
/// A worker that has never loaded is never "changed".
pub fn link_params_changed(prev: Option<&LinkParams>, curr: Option<&LinkParams>) -> bool {
    match (prev, curr) {
        (Some(prev), Some(curr)) => prev != curr,
        _ => false,
    }
}

struct IntfInner<P> {
    conn_id: String,
    protocol: String,
    db_path: PathBuf,
    proto: P,
    db: Mutex<Option<EdgeDB>>,
    conn: Mutex<Option<ConnRow>>,
    blocks: Mutex<Vec<BlockRow>>,
}

impl<P: ProtocolHooks> IntfInner<P> {
    fn load_config(&self) -> Result<(), StageError> {
        let db = self
            .db
            .lock()
            .clone()
            .ok_or_else(|| StageError::recoverable("store not open"))?;
        let row = db
            .select_conn(&self.conn_id)?
            .ok_or_else(|| StageError::recoverable(format!("connection not found: {}", self.conn_id)))?;
        let blocks = db.select_blocks_by_conn(&self.conn_id)?;

        tracing::info!(
            conn_id = %self.conn_id,
            blocks = blocks.len(),
            "loaded config"
        );
        *self.conn.lock() = Some(row);
        *self.blocks.lock() = blocks;
        Ok(())
    }

    fn intf_ctx(&self, ctx: &Arc<AppCtx>) -> IntfCtx {
        IntfCtx {
            app: Arc::clone(ctx),
            conn: self.conn.lock().clone(),
            blocks: self.blocks.lock().clone(),
            db: self.db.lock().clone(),
        }
    }

    fn handle_reload(&self, ctx: &Arc<AppCtx>) {
        tracing::info!(conn_id = %self.conn_id, "config reload signal received");

        let prev = self.conn.lock().as_ref().map(ConnRow::link_params);
        if let Err(err) = self.load_config() {
            tracing::warn!(conn_id = %self.conn_id, error = %err, "config reload failed");
            return;
        }
        let curr = self.conn.lock().as_ref().map(ConnRow::link_params);

        if link_params_changed(prev.as_ref(), curr.as_ref()) {
            tracing::warn!(
                conn_id = %self.conn_id,
                "connection parameters changed, exiting for service-manager restart"
            );
            ctx.request_exit(0);
        } else {
            ctx.request_reconfigure();
        }
    }
}

/// Lifecycle hooks of a protocol worker. Construct with the parsed CLI
/// flags; a missing `--conn-id` is exit-code-1 material before the
/// engine even starts.
pub struct InterfaceApp<P: ProtocolHooks> {
    inner: Arc<IntfInner<P>>,
}

impl<P: ProtocolHooks> InterfaceApp<P> {
    pub fn new(
        protocol: impl Into<String>,
        args: &AppArgs,
        db_path: impl Into<PathBuf>,
        proto: P,
    ) -> Result<Self, EngineError> {
        let conn_id = args.conn_id.clone().ok_or(EngineError::MissingConnId)?;
        Ok(Self {
            inner: Arc::new(IntfInner {
                conn_id,
                protocol: protocol.into(),
                db_path: db_path.into(),
                proto,
                db: Mutex::new(None),
                conn: Mutex::new(None),
                blocks: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn conn_id(&self) -> &str {
        &self.inner.conn_id
    }

    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    pub fn conn_config(&self) -> Option<ConnRow> {
        self.inner.conn.lock().clone()
    }

    pub fn block_configs(&self) -> Vec<BlockRow> {
        self.inner.blocks.lock().clone()
    }
}

#[async_trait]
impl<P: ProtocolHooks> AppHooks for InterfaceApp<P> {
    async fn on_prepare(&self, ctx: &Arc<AppCtx>) -> StageResult {
        let db = EdgeDB::open(&self.inner.db_path).map_err(StageError::fatal)?;
        *self.inner.db.lock() = Some(db);

        self.inner.load_config().map_err(StageError::fatal)?;
        self.inner
            .proto
            .on_intf_prepare(&self.inner.intf_ctx(ctx))
            .await
    }

    async fn on_configure(&self, ctx: &Arc<AppCtx>) -> StageResult {
        // Reload on the reconfigure path; the first pass already loaded
        // during PREPARE.
        if self.inner.conn.lock().is_some() {
            self.inner.load_config().map_err(StageError::fatal)?;
        }
        self.inner
            .proto
            .on_intf_configure(&self.inner.intf_ctx(ctx))
            .await
    }

    async fn on_connect(&self, ctx: &Arc<AppCtx>) -> StageResult {
        let bus = ctx.bus().map_err(StageError::recoverable)?;
        let key = keys::config_reload(&self.inner.conn_id);
        bus.sync(std::slice::from_ref(&key)).await?;

        let inner = Arc::clone(&self.inner);
        let reload_ctx = Arc::clone(ctx);
        bus.subscribe(
            &[key],
            callback(move |_key, _value| {
                let inner = Arc::clone(&inner);
                let ctx = Arc::clone(&reload_ctx);
                async move {
                    inner.handle_reload(&ctx);
                }
            }),
        )
        .await?;
        bus.commit().await?;

        self.inner
            .proto
            .on_intf_connect(&self.inner.intf_ctx(ctx))
            .await
    }

    async fn on_execute(&self, ctx: &Arc<AppCtx>) -> StageResult {
        self.inner
            .proto
            .on_intf_execute(&self.inner.intf_ctx(ctx))
            .await
    }

    async fn on_recover(&self, ctx: &Arc<AppCtx>) -> StageResult {
        self.inner
            .proto
            .on_intf_recover(&self.inner.intf_ctx(ctx))
            .await
    }

    async fn on_disconnect(&self, ctx: &Arc<AppCtx>) -> StageResult {
        self.inner
            .proto
            .on_intf_disconnect(&self.inner.intf_ctx(ctx))
            .await
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
