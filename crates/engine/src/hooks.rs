// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's customization surface: one capability trait with a hook
//! per lifecycle stage, each returning an explicit outcome instead of
//! throwing.

use crate::app::AppCtx;
use async_trait::async_trait;
use ne_adapters::BusError;
use ne_storage::EdgeDbError;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Stage hook failure. The engine maps the variant to a transition:
/// recoverable failures head for RECOVER, fatal ones stop the process
/// (and any failure in PREPARE/CONFIGURE is fatal regardless).
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Recoverable(String),
    #[error("{0}")]
    Fatal(String),
}

impl StageError {
    pub fn recoverable(err: impl Display) -> Self {
        Self::Recoverable(err.to_string())
    }

    pub fn fatal(err: impl Display) -> Self {
        Self::Fatal(err.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<BusError> for StageError {
    fn from(err: BusError) -> Self {
        Self::recoverable(err)
    }
}

impl From<EdgeDbError> for StageError {
    fn from(err: EdgeDbError) -> Self {
        Self::recoverable(err)
    }
}

pub type StageResult = Result<(), StageError>;

/// Per-stage behavior of one engine. All hooks default to no-ops; an app
/// implements the stages it cares about. Hooks take `&self`; shared
/// state lives behind the app's own locks, because `on_manage` runs
/// concurrently with the lifecycle stages.
#[async_trait]
pub trait AppHooks: Send + Sync + 'static {
    /// One-time resource creation. Any failure is fatal.
    async fn on_prepare(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// Parse/load declarative configuration. Runs on first entry and on
    /// every reconfigure pass. Any failure is fatal.
    async fn on_configure(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// Open sessions to external collaborators.
    async fn on_connect(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// One tick of the main loop.
    async fn on_execute(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// Quick resync after a failure. Returning Ok resumes EXECUTE;
    /// failing here forces the full DISCONNECT/CONNECT cycle.
    async fn on_recover(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// Teardown before a reconnect cycle or final shutdown. Failures are
    /// tolerated.
    async fn on_disconnect(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }

    /// Periodic management work on the manage plane. Failures count
    /// against the exception budget but never change lifecycle state.
    async fn on_manage(&self, _ctx: &Arc<AppCtx>) -> StageResult {
        Ok(())
    }
}
